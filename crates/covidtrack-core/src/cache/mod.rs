//! Local persistence and freshness tracking for reconciled records.
//!
//! This module provides the `LocationStore` seam and two implementations:
//! `MemoryStore` for in-process use and `JsonFileStore`, which keeps a JSON
//! snapshot in the cache directory. `freshness` decides whether stored data
//! is recent enough to skip a re-fetch.

pub mod file;
pub mod freshness;
pub mod memory;
pub mod store;

pub use file::{CachedData, JsonFileStore};
pub use freshness::{FeedFreshness, Freshness, StalenessGate, DEFAULT_STALE_AFTER_HOURS};
pub use memory::MemoryStore;
pub use store::{LocationStore, UpdateScope};
