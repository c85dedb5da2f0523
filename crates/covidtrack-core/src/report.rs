//! Dashboard aggregation over reconciled records.

use serde::Serialize;

use crate::error::{Result, TrackerError};
use crate::models::{LocationRecord, MetricKind};

/// Totals for one metric kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Summary {
    pub current_count: u64,
    pub new_count: u64,
}

/// Sum latest counts and day-over-day deltas across all records.
///
/// A record without a series of `kind` contributes nothing. A series with
/// less than two days of history fails the whole summary. Totals saturate at
/// `u64::MAX`.
pub fn summarize(records: &[LocationRecord], kind: MetricKind) -> Result<Summary> {
    if records.is_empty() {
        return Err(TrackerError::EmptyDataset(kind));
    }

    let mut summary = Summary::default();
    for series in records.iter().filter_map(|r| r.get(kind)) {
        summary.current_count = summary.current_count.saturating_add(series.latest_count);
        summary.new_count = summary
            .new_count
            .saturating_add(series.difference_since_previous_day()?);
    }
    Ok(summary)
}

/// Records ordered ascending by the latest count of `kind`.
pub fn sorted_by(records: &[LocationRecord], kind: MetricKind) -> Vec<LocationRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.get(kind).map(|s| s.latest_count));
    sorted
}

/// What a per-metric page shows: records sorted by that metric and its totals.
#[derive(Debug, Clone, Serialize)]
pub struct MetricView {
    pub kind: MetricKind,
    pub records: Vec<LocationRecord>,
    pub summary: Summary,
}

impl MetricView {
    pub fn build(records: &[LocationRecord], kind: MetricKind) -> Result<Self> {
        Ok(Self {
            kind,
            summary: summarize(records, kind)?,
            records: sorted_by(records, kind),
        })
    }
}

/// The home page: records in natural order plus totals for every kind.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub records: Vec<LocationRecord>,
    pub infected: Summary,
    pub dead: Summary,
    pub recovered: Summary,
}

impl Dashboard {
    pub fn build(records: Vec<LocationRecord>) -> Result<Self> {
        Ok(Self {
            infected: summarize(&records, MetricKind::Infected)?,
            dead: summarize(&records, MetricKind::Dead)?,
            recovered: summarize(&records, MetricKind::Recovered)?,
            records,
        })
    }

    pub fn summary(&self, kind: MetricKind) -> Summary {
        match kind {
            MetricKind::Infected => self.infected,
            MetricKind::Dead => self.dead,
            MetricKind::Recovered => self.recovered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationKey, MetricSeries};
    use chrono::Utc;

    fn record(region: &str, infected: &[u64]) -> LocationRecord {
        let mut record = LocationRecord::new(LocationKey::new("", region));
        record.set(
            MetricKind::Infected,
            MetricSeries::from_counts(infected.to_vec(), Utc::now()),
        );
        record
    }

    #[test]
    fn test_summarize_current_and_new() {
        let records = vec![record("Italy", &[8, 10]), record("Spain", &[5, 5])];
        let summary = summarize(&records, MetricKind::Infected).unwrap();
        assert_eq!(summary.current_count, 15);
        assert_eq!(summary.new_count, 2);
    }

    #[test]
    fn test_summarize_clamps_each_record() {
        // Spain was revised downward; it must not cancel Italy's growth
        let records = vec![record("Italy", &[8, 10]), record("Spain", &[9, 5])];
        assert_eq!(summarize(&records, MetricKind::Infected).unwrap().new_count, 2);
    }

    #[test]
    fn test_summarize_saturates_on_huge_counts() {
        let records = vec![
            record("Italy", &[0, u64::MAX]),
            record("Spain", &[0, u64::MAX - 1]),
        ];
        let summary = summarize(&records, MetricKind::Infected).unwrap();
        assert_eq!(summary.current_count, u64::MAX);
        assert_eq!(summary.new_count, u64::MAX);
    }

    #[test]
    fn test_summarize_empty_is_error() {
        assert!(matches!(
            summarize(&[], MetricKind::Dead),
            Err(TrackerError::EmptyDataset(MetricKind::Dead))
        ));
    }

    #[test]
    fn test_summarize_short_history_is_error() {
        let records = vec![record("Italy", &[3])];
        assert!(matches!(
            summarize(&records, MetricKind::Infected),
            Err(TrackerError::InsufficientHistory { len: 1 })
        ));
    }

    #[test]
    fn test_summarize_skips_missing_series() {
        let records = vec![record("Italy", &[1, 2])];
        assert_eq!(summarize(&records, MetricKind::Dead).unwrap(), Summary::default());
    }

    #[test]
    fn test_sorted_ascending_by_kind() {
        let records = vec![
            record("Italy", &[1, 30]),
            record("Spain", &[1, 2]),
            record("France", &[1, 10]),
        ];
        let view = MetricView::build(&records, MetricKind::Infected).unwrap();
        let regions: Vec<_> = view.records.iter().map(|r| r.key.region.as_str()).collect();
        assert_eq!(regions, vec!["Spain", "France", "Italy"]);
        assert_eq!(view.summary.current_count, 42);
    }

    #[test]
    fn test_dashboard_keeps_natural_order() {
        let records = vec![record("Italy", &[1, 30]), record("Spain", &[1, 2])];
        let dashboard = Dashboard::build(records).unwrap();
        assert_eq!(dashboard.records[0].key.region, "Italy");
        assert_eq!(dashboard.summary(MetricKind::Infected).new_count, 29);
        assert_eq!(dashboard.summary(MetricKind::Recovered), Summary::default());
    }
}
