//! covidtrack core library.
//!
//! Ingests the three daily time-series feeds (confirmed infections, deaths,
//! recoveries), reconciles them into one record per location, and serves
//! those records from a local store while they are fresh enough.
//!
//! - `api`: HTTP feed client
//! - `parser`: CSV row parsing
//! - `reconcile`: merging the feeds into `LocationRecord`s
//! - `cache`: stores and the staleness gate
//! - `report`: totals and sorted views for display
//! - `schedule`: fixed twice-daily refresh
//! - `service`: `Tracker`, which ties the above together

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod reconcile;
pub mod report;
pub mod schedule;
pub mod service;

pub use api::{FeedClient, FeedSource, FeedUrls, FetchError};
pub use cache::{
    FeedFreshness, Freshness, JsonFileStore, LocationStore, MemoryStore, StalenessGate,
    UpdateScope,
};
pub use config::Config;
pub use error::{Result, TrackerError};
pub use models::{FeedRow, LocationKey, LocationRecord, MetricKind, MetricSeries};
pub use parser::FeedParser;
pub use reconcile::{merge_record, Companion, CycleReport, FeedOutcome, Feeds, Reconciler};
pub use report::{summarize, sorted_by, Dashboard, MetricView, Summary};
pub use schedule::{run_scheduled, RefreshSchedule};
pub use service::{Served, Tracker};
