use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{LocationKey, LocationRecord, MetricKind};

/// What a "last updated" query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    /// Record-level timestamps across every location.
    Overall,
    /// Series-level timestamps of one metric kind.
    Metric(MetricKind),
}

/// Key-value persistence for location records, keyed by `LocationKey`.
///
/// Upserts replace the whole record. Callers must not assume that a write
/// made by a background refresh is visible to a read already in flight.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Insert or replace the record for `record.key`. Returns true when the
    /// key was not stored before.
    async fn upsert(&self, record: LocationRecord) -> Result<bool>;

    /// Upsert records in order. Returns how many keys were new.
    async fn upsert_many(&self, records: Vec<LocationRecord>) -> Result<usize> {
        let mut created = 0;
        for record in records {
            if self.upsert(record).await? {
                created += 1;
            }
        }
        Ok(created)
    }

    async fn find(&self, key: &LocationKey) -> Result<Option<LocationRecord>>;

    /// All records in first-insertion order.
    async fn find_all(&self) -> Result<Vec<LocationRecord>>;

    async fn max_updated_on(&self, scope: UpdateScope) -> Result<Option<DateTime<Utc>>>;
}

/// Ordered record table with a key index, shared by the store backends.
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordTable {
    records: Vec<LocationRecord>,
    index: HashMap<LocationKey, usize>,
}

impl RecordTable {
    pub(crate) fn from_records(records: Vec<LocationRecord>) -> Self {
        let mut table = Self::default();
        for record in records {
            table.upsert(record);
        }
        table
    }

    pub(crate) fn upsert(&mut self, record: LocationRecord) -> bool {
        match self.index.get(&record.key) {
            Some(&position) => {
                self.records[position] = record;
                false
            }
            None => {
                self.index.insert(record.key.clone(), self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    pub(crate) fn find(&self, key: &LocationKey) -> Option<&LocationRecord> {
        self.index.get(key).map(|&position| &self.records[position])
    }

    pub(crate) fn records(&self) -> &[LocationRecord] {
        &self.records
    }

    pub(crate) fn max_updated_on(&self, scope: UpdateScope) -> Option<DateTime<Utc>> {
        match scope {
            UpdateScope::Overall => self.records.iter().filter_map(|r| r.updated_on).max(),
            UpdateScope::Metric(kind) => self
                .records
                .iter()
                .filter_map(|r| r.get(kind).map(|s| s.updated_on))
                .max(),
        }
    }
}
