//! Feed client module for the upstream CSV time series.
//!
//! This module provides the `FeedSource` seam and its HTTP implementation,
//! `FeedClient`, which downloads one raw CSV document per metric kind.
//! Transport and status failures surface as `FetchError`; retries are not
//! attempted.

pub mod client;
pub mod error;

pub use client::{FeedClient, FeedSource, FeedUrls};
pub use error::FetchError;
