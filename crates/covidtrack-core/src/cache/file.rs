//! JSON snapshot store.
//!
//! All records live in memory and the full table is rewritten to
//! `<cache_dir>/locations.json` after each upsert batch. The file carries the
//! time it was written so a status view can show its age without
//! inspecting every record.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::store::{LocationStore, RecordTable, UpdateScope};
use crate::models::{LocationKey, LocationRecord};

/// Snapshot file name in the cache directory
const LOCATIONS_FILE: &str = "locations.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }
}

pub struct JsonFileStore {
    path: PathBuf,
    table: RwLock<RecordTable>,
    /// Serializes writers so each batch builds on the previous snapshot.
    writer: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store in `cache_dir`, loading an existing snapshot if present.
    pub fn open(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref();
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;

        let path = cache_dir.join(LOCATIONS_FILE);
        let records = match Self::load(&path)? {
            Some(cached) => {
                debug!(
                    path = %path.display(),
                    count = cached.data.len(),
                    cached_at = %cached.cached_at,
                    "Loaded location snapshot"
                );
                cached.data
            }
            None => Vec::new(),
        };

        Ok(Self {
            path,
            table: RwLock::new(RecordTable::from_records(records)),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<Option<CachedData<Vec<LocationRecord>>>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache file: {}", path.display()))?;

        let cached = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;

        Ok(Some(cached))
    }

    /// Serialize `records` and write them off the async executor.
    async fn save(&self, records: &[LocationRecord]) -> Result<()> {
        let contents = serde_json::to_string_pretty(&CachedData::new(records))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, contents))
            .await
            .context("Snapshot write task failed")?
    }
}

/// Write then rename: the snapshot on disk is always complete.
fn write_snapshot(path: &Path, contents: String) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write cache file: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace cache file: {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl LocationStore for JsonFileStore {
    async fn upsert(&self, record: LocationRecord) -> Result<bool> {
        Ok(self.upsert_many(vec![record]).await? == 1)
    }

    /// Applies the whole batch to a copy, writes the snapshot once, then
    /// swaps the copy in. Readers only wait for the swap. On a failed write
    /// the in-memory table is left as it was.
    async fn upsert_many(&self, records: Vec<LocationRecord>) -> Result<usize> {
        let _writer = self.writer.lock().await;
        let mut next = self.table.read().await.clone();
        let mut created = 0;
        for record in records {
            if next.upsert(record) {
                created += 1;
            }
        }
        self.save(next.records()).await?;
        *self.table.write().await = next;
        debug!(path = %self.path.display(), created, "Saved location snapshot");
        Ok(created)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricKind, MetricSeries};

    fn italy() -> LocationRecord {
        let now = Utc::now();
        let mut record = LocationRecord::new(LocationKey::new("", "Italy"));
        record.set(MetricKind::Infected, MetricSeries::from_counts(vec![0, 1, 3], now));
        record.updated_on = Some(now);
        record
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let record = italy();

        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            assert!(store.upsert(record.clone()).await.unwrap());
            assert!(store.path().exists());
        }

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        let all = reopened.find_all().await.unwrap();
        assert_eq!(all, vec![record.clone()]);
        assert_eq!(
            reopened.max_updated_on(UpdateScope::Metric(MetricKind::Infected)).await.unwrap(),
            record.infected.map(|s| s.updated_on)
        );
    }

    #[tokio::test]
    async fn test_open_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("nested")).unwrap();
        assert!(store.find_all().await.unwrap().is_empty());
        assert_eq!(store.max_updated_on(UpdateScope::Overall).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_upsert_counts_new_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let mut spain = italy();
        spain.key = LocationKey::new("", "Spain");

        assert_eq!(store.upsert_many(vec![italy(), spain.clone()]).await.unwrap(), 2);
        assert_eq!(store.upsert_many(vec![spain, italy()]).await.unwrap(), 0);

        let regions: Vec<_> = JsonFileStore::open(dir.path())
            .unwrap()
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key.region)
            .collect();
        assert_eq!(regions, vec!["Italy", "Spain"]);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_table() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let store = JsonFileStore::open(&cache_dir).unwrap();
        std::fs::remove_dir_all(&cache_dir).unwrap();

        assert!(store.upsert(italy()).await.is_err());
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_batches_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonFileStore::open(dir.path()).unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut record = italy();
                record.key = LocationKey::new("", format!("Region {}", i));
                store.upsert_many(vec![record]).await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 1);
        }

        assert_eq!(store.find_all().await.unwrap().len(), 8);
        let reopened = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.find_all().await.unwrap().len(), 8);
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCATIONS_FILE), "not json").unwrap();
        assert!(JsonFileStore::open(dir.path()).is_err());
    }
}
