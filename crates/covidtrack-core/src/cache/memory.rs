use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::store::{LocationStore, RecordTable, UpdateScope};
use crate::models::{LocationKey, LocationRecord};

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<RecordTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<LocationRecord>) -> Self {
        Self {
            table: RwLock::new(RecordTable::from_records(records)),
        }
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn upsert(&self, record: LocationRecord) -> Result<bool> {
        Ok(self.table.write().await.upsert(record))
    }

    async fn find(&self, key: &LocationKey) -> Result<Option<LocationRecord>> {
        Ok(self.table.read().await.find(key).cloned())
    }

    async fn find_all(&self) -> Result<Vec<LocationRecord>> {
        Ok(self.table.read().await.records().to_vec())
    }

    async fn max_updated_on(&self, scope: UpdateScope) -> Result<Option<DateTime<Utc>>> {
        Ok(self.table.read().await.max_updated_on(scope))
    }
}
