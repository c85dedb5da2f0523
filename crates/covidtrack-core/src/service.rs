//! Staleness-aware read service and refresh coordination.
//!
//! `Tracker` is the entry point used by every trigger: scheduled refreshes,
//! on-demand refreshes after a stale read, and one-shot commands. All of
//! them go through the same reconciliation cycle, and at most one cycle is
//! in flight per process.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::api::FeedSource;
use crate::cache::{
    FeedFreshness, Freshness, JsonFileStore, LocationStore, StalenessGate, UpdateScope,
};
use crate::config::Config;
use crate::error::Result;
use crate::models::{LocationRecord, MetricKind};
use crate::parser::FeedParser;
use crate::reconcile::{CycleReport, Reconciler};
use crate::report::{Dashboard, MetricView};

/// Records handed to a reader, with how current they were when read.
#[derive(Debug, Clone, Serialize)]
pub struct Served {
    pub records: Vec<LocationRecord>,
    pub freshness: Freshness,
    /// A background refresh was started or already running.
    pub refreshing: bool,
}

pub struct Tracker {
    store: Arc<dyn LocationStore>,
    source: Arc<dyn FeedSource>,
    reconciler: Arc<Reconciler>,
    gate: StalenessGate,
    /// Held for the duration of every reconciliation cycle.
    cycle_lock: Arc<Mutex<()>>,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl Tracker {
    pub fn new(
        store: Arc<dyn LocationStore>,
        source: Arc<dyn FeedSource>,
        parser: FeedParser,
        gate: StalenessGate,
    ) -> Self {
        Self {
            reconciler: Arc::new(Reconciler::new(Arc::clone(&store), parser)),
            store,
            source,
            gate,
            cycle_lock: Arc::new(Mutex::new(())),
            background: Mutex::new(None),
        }
    }

    /// Build a tracker backed by the HTTP feed client and the JSON file store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let cache_dir = config.cache_dir()?;
        let store = JsonFileStore::open(&cache_dir)
            .with_context(|| format!("Failed to open store in {}", cache_dir.display()))?;
        let client = config.feed_client()?;
        Ok(Self::new(
            Arc::new(store),
            Arc::new(client),
            config.parser(),
            config.staleness_gate()?,
        ))
    }

    pub fn store(&self) -> &Arc<dyn LocationStore> {
        &self.store
    }

    pub fn gate(&self) -> StalenessGate {
        self.gate
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Run one reconciliation cycle, waiting for any cycle already running.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _guard = self.cycle_lock.lock().await;
        self.reconciler.run(self.source.as_ref()).await
    }

    /// Spawn a reconciliation cycle unless one is already in flight.
    /// Returns false when the refresh was skipped.
    pub async fn trigger_background_refresh(&self) -> bool {
        let guard = match Arc::clone(&self.cycle_lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Refresh already in progress, not starting another");
                return false;
            }
        };

        let reconciler = Arc::clone(&self.reconciler);
        let source = Arc::clone(&self.source);

        info!("Starting background refresh");
        let handle = tokio::spawn(async move {
            let _guard = guard;
            match reconciler.run(source.as_ref()).await {
                Ok(report) => info!(
                    reconciled = report.reconciled(),
                    degraded = report.degraded(),
                    "Background refresh complete"
                ),
                Err(e) => error!(error = %e, "Background refresh failed"),
            }
        });

        *self.background.lock().await = Some(handle);
        true
    }

    /// Wait for the most recently spawned background refresh, if any.
    pub async fn wait_for_background(&self) {
        let handle = self.background.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Background refresh task did not finish");
            }
        }
    }

    // =========================================================================
    // Staleness-aware reads
    // =========================================================================

    pub async fn freshness_of(&self, scope: UpdateScope) -> Result<FeedFreshness> {
        let updated_on = self.store.max_updated_on(scope).await?;
        let kind = match scope {
            UpdateScope::Overall => None,
            UpdateScope::Metric(kind) => Some(kind),
        };
        Ok(FeedFreshness {
            kind,
            updated_on,
            freshness: self.gate.assess(updated_on, Utc::now()),
        })
    }

    /// Freshness of all records followed by each metric kind.
    pub async fn freshness(&self) -> Result<Vec<FeedFreshness>> {
        let mut all = vec![self.freshness_of(UpdateScope::Overall).await?];
        for kind in MetricKind::ALL {
            all.push(self.freshness_of(UpdateScope::Metric(kind)).await?);
        }
        Ok(all)
    }

    /// Serve stored records for the given kinds.
    ///
    /// Fresh data is returned as is. Stale data is returned immediately while
    /// a background refresh updates the store for the next read. When nothing
    /// is stored at all, a cycle runs in the foreground first.
    pub async fn serve(&self, kinds: &[MetricKind]) -> Result<Served> {
        let now = Utc::now();
        let mut freshness = Freshness::Fresh;
        for &kind in kinds {
            let updated_on = self.store.max_updated_on(UpdateScope::Metric(kind)).await?;
            let assessed = self.gate.assess(updated_on, now);
            debug!(feed = %kind, ?assessed, "Staleness check");
            freshness = freshness.max(assessed);
        }

        if freshness == Freshness::Missing
            && self.store.max_updated_on(UpdateScope::Overall).await?.is_none()
        {
            self.fill_empty_store().await?;
            return Ok(Served {
                records: self.store.find_all().await?,
                freshness,
                refreshing: false,
            });
        }

        // Snapshot before any refresh is spawned so a stale read never sees
        // the records that refresh writes
        let records = self.store.find_all().await?;
        let refreshing = match freshness {
            Freshness::Fresh => false,
            Freshness::Stale | Freshness::Missing => {
                self.trigger_background_refresh().await;
                true
            }
        };

        Ok(Served {
            records,
            freshness,
            refreshing,
        })
    }

    /// Foreground cycle for a store with nothing in it. Readers that queued
    /// behind another reader's cycle find the store filled and skip theirs.
    async fn fill_empty_store(&self) -> Result<()> {
        let _guard = self.cycle_lock.lock().await;
        if self.store.max_updated_on(UpdateScope::Overall).await?.is_some() {
            debug!("Store was filled while waiting for the cycle lock");
            return Ok(());
        }
        info!("No stored data, fetching in the foreground");
        self.reconciler.run(self.source.as_ref()).await?;
        Ok(())
    }

    pub async fn records_for(&self, kind: MetricKind) -> Result<Served> {
        self.serve(&[kind]).await
    }

    /// Records sorted by `kind` with its totals.
    pub async fn view(&self, kind: MetricKind) -> Result<MetricView> {
        let served = self.records_for(kind).await?;
        MetricView::build(&served.records, kind)
    }

    /// Records in natural order with totals for every kind.
    pub async fn dashboard(&self) -> Result<Dashboard> {
        let served = self.serve(&MetricKind::ALL).await?;
        Dashboard::build(served.records)
    }
}
