//! Per-location records and the metric series they carry.
//!
//! A `LocationRecord` owns up to one `MetricSeries` per `MetricKind`.
//! Callers go through `get`/`set` instead of matching on the kind
//! themselves.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MetricKind;
use crate::error::{Result, TrackerError};

/// Identity of a reporting unit. Matching is exact, including an empty
/// state for country-level rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LocationKey {
    pub state: String,
    pub region: String,
}

impl LocationKey {
    pub fn new(state: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.state.is_empty() {
            write!(f, "{}", self.region)
        } else {
            write!(f, "{}, {}", self.state, self.region)
        }
    }
}

/// One metric's daily history for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MetricSeries {
    pub latest_count: u64,
    pub past_counts: Vec<u64>,
    pub updated_on: DateTime<Utc>,
}

impl MetricSeries {
    /// Build a series from a chronological history. The latest count is the
    /// last element, or 0 for an empty history.
    pub fn from_counts(past_counts: Vec<u64>, updated_on: DateTime<Utc>) -> Self {
        Self {
            latest_count: past_counts.last().copied().unwrap_or(0),
            past_counts,
            updated_on,
        }
    }

    /// A series reporting nothing so far: `len` days of zeros.
    pub fn zero_filled(len: usize, updated_on: DateTime<Utc>) -> Self {
        Self::from_counts(vec![0; len], updated_on)
    }

    pub fn days(&self) -> usize {
        self.past_counts.len()
    }

    /// Count reported on the day before the latest one.
    pub fn yesterday(&self) -> Result<u64> {
        let len = self.past_counts.len();
        if len < 2 {
            return Err(TrackerError::InsufficientHistory { len });
        }
        Ok(self.past_counts[len - 2])
    }

    /// Day-over-day increase, clamped at zero. Decreases come from upstream
    /// data revisions.
    pub fn difference_since_previous_day(&self) -> Result<u64> {
        Ok(self.latest_count.saturating_sub(self.yesterday()?))
    }
}

/// Everything known about one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LocationRecord {
    pub key: LocationKey,
    #[serde(default)]
    pub infected: Option<MetricSeries>,
    #[serde(default)]
    pub dead: Option<MetricSeries>,
    #[serde(default)]
    pub recovered: Option<MetricSeries>,
    pub updated_on: Option<DateTime<Utc>>,
}

impl LocationRecord {
    pub fn new(key: LocationKey) -> Self {
        Self {
            key,
            infected: None,
            dead: None,
            recovered: None,
            updated_on: None,
        }
    }

    pub fn get(&self, kind: MetricKind) -> Option<&MetricSeries> {
        self.slot(kind).as_ref()
    }

    pub fn get_mut(&mut self, kind: MetricKind) -> Option<&mut MetricSeries> {
        self.slot_mut(kind).as_mut()
    }

    pub fn set(&mut self, kind: MetricKind, series: MetricSeries) {
        *self.slot_mut(kind) = Some(series);
    }

    /// Latest count for a kind, 0 when the series is absent.
    pub fn latest(&self, kind: MetricKind) -> u64 {
        self.get(kind).map(|s| s.latest_count).unwrap_or(0)
    }

    /// Present series paired with their kind.
    pub fn series(&self) -> impl Iterator<Item = (MetricKind, &MetricSeries)> + '_ {
        MetricKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|s| (kind, s)))
    }

    fn slot(&self, kind: MetricKind) -> &Option<MetricSeries> {
        match kind {
            MetricKind::Infected => &self.infected,
            MetricKind::Dead => &self.dead,
            MetricKind::Recovered => &self.recovered,
        }
    }

    fn slot_mut(&mut self, kind: MetricKind) -> &mut Option<MetricSeries> {
        match kind {
            MetricKind::Infected => &mut self.infected,
            MetricKind::Dead => &mut self.dead,
            MetricKind::Recovered => &mut self.recovered,
        }
    }
}
