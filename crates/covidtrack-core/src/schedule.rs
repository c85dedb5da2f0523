//! Fixed daily refresh schedule.
//!
//! Refreshes run at the same minute past each configured hour, every day,
//! in UTC. The default is 02:30 and 14:30.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::service::Tracker;

/// Hours of the day (UTC) at which scheduled refreshes run.
pub const DEFAULT_REFRESH_HOURS: [u32; 2] = [2, 14];

/// Minute past the hour at which scheduled refreshes run.
pub const DEFAULT_REFRESH_MINUTE: u32 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Refresh schedule needs at least one hour")]
    NoHours,
    #[error("Hour {0} is out of range [0, 23]")]
    HourOutOfRange(u32),
    #[error("Minute {0} is out of range [0, 59]")]
    MinuteOutOfRange(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSchedule {
    hours: BTreeSet<u32>,
    minute: u32,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            hours: DEFAULT_REFRESH_HOURS.into_iter().collect(),
            minute: DEFAULT_REFRESH_MINUTE,
        }
    }
}

impl RefreshSchedule {
    pub fn new(hours: impl IntoIterator<Item = u32>, minute: u32) -> Result<Self, ScheduleError> {
        let hours: BTreeSet<u32> = hours.into_iter().collect();
        if hours.is_empty() {
            return Err(ScheduleError::NoHours);
        }
        if let Some(&hour) = hours.iter().find(|&&h| h > 23) {
            return Err(ScheduleError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(ScheduleError::MinuteOutOfRange(minute));
        }
        Ok(Self { hours, minute })
    }

    /// First slot strictly after `after`.
    pub fn next_run(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let today = after.date_naive();
        for day in [today, today + Duration::days(1)] {
            for &hour in &self.hours {
                let Some(time) = NaiveTime::from_hms_opt(hour, self.minute, 0) else {
                    continue;
                };
                let candidate = day.and_time(time).and_utc();
                if candidate > after {
                    return candidate;
                }
            }
        }
        // Unreachable for a validated schedule; fall back to a day later
        after + Duration::days(1)
    }
}

/// Run a reconciliation cycle at every scheduled slot until shutdown.
pub async fn run_scheduled(
    tracker: Arc<Tracker>,
    schedule: RefreshSchedule,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let now = Utc::now();
        let next = schedule.next_run(now);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_run = %next, "Waiting for next scheduled refresh");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                info!("Starting scheduled refresh");
                match tracker.run_cycle().await {
                    Ok(report) => info!(
                        reconciled = report.reconciled(),
                        degraded = report.degraded(),
                        "Scheduled refresh complete"
                    ),
                    Err(e) => error!(error = %e, "Scheduled refresh failed"),
                }
            }
            _ = shutdown.recv() => {
                info!("Scheduler shutting down");
                return;
            }
        }
    }
}
