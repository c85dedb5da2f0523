use thiserror::Error;

use crate::models::MetricKind;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("No location records to aggregate for {0}")]
    EmptyDataset(MetricKind),

    #[error("Series has {len} day(s) of history, need at least 2 for a day-over-day delta")]
    InsufficientHistory { len: usize },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl TrackerError {
    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        TrackerError::MalformedRow {
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
