use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::MetricKind;

/// Default staleness window in hours.
/// The feeds publish once a day; 12 hours keeps reads at most half a cycle behind.
pub const DEFAULT_STALE_AFTER_HOURS: i64 = 12;

/// Outcome of a staleness check, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Stored data is inside the window.
    Fresh,
    /// Stored data exists but is older than the window.
    Stale,
    /// Nothing stored yet.
    Missing,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Decides whether stored data is recent enough to skip a re-fetch.
#[derive(Debug, Clone, Copy)]
pub struct StalenessGate {
    window: Duration,
}

impl Default for StalenessGate {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_STALE_AFTER_HOURS))
    }
}

impl StalenessGate {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Fresh iff `max_updated_on >= now - window`.
    pub fn assess(&self, max_updated_on: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Freshness {
        match max_updated_on {
            None => Freshness::Missing,
            Some(updated_on) if updated_on >= now - self.window => Freshness::Fresh,
            Some(_) => Freshness::Stale,
        }
    }
}

/// Latest ingestion time for one metric kind (or all records when `kind`
/// is `None`).
#[derive(Debug, Clone, Serialize)]
pub struct FeedFreshness {
    pub kind: Option<MetricKind>,
    pub updated_on: Option<DateTime<Utc>>,
    pub freshness: Freshness,
}

impl FeedFreshness {
    pub fn age_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        self.updated_on.map(|t| (now - t).num_minutes())
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = match self.age_minutes(now) {
            Some(minutes) => minutes,
            None => return "never".to_string(),
        };

        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}
