//! Data models for the reconciled time series.
//!
//! - `MetricKind`: which feed a series comes from
//! - `LocationKey`, `LocationRecord`, `MetricSeries`: stored per-location state
//! - `FeedRow`: one parsed CSV row before reconciliation

pub mod location;
pub mod metric;

pub use location::{LocationKey, LocationRecord, MetricSeries};
pub use metric::MetricKind;

/// One parsed feed row: a location and its chronological daily counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRow {
    pub key: LocationKey,
    pub counts: Vec<u64>,
}
