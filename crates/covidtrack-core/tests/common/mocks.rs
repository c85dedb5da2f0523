use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use covidtrack_core::{FeedSource, FetchError, MetricKind};
use tokio::sync::Semaphore;

/// Feed source serving fixed documents, counting every fetch.
pub struct StaticFeeds {
    documents: Mutex<HashMap<MetricKind, Option<String>>>,
    fetches: AtomicUsize,
    gate: Option<Semaphore>,
}

#[allow(dead_code)]
impl StaticFeeds {
    pub fn new(infected: String, dead: String, recovered: String) -> Self {
        let documents = HashMap::from([
            (MetricKind::Infected, Some(infected)),
            (MetricKind::Dead, Some(dead)),
            (MetricKind::Recovered, Some(recovered)),
        ]);
        Self {
            documents: Mutex::new(documents),
            fetches: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Every fetch waits for a permit released through `release`.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    /// Make fetches of `kind` fail with a server error.
    pub fn fail(&self, kind: MetricKind) {
        self.documents.lock().unwrap().insert(kind, None);
    }

    pub fn replace(&self, kind: MetricKind, document: String) {
        self.documents.lock().unwrap().insert(kind, Some(document));
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticFeeds {
    async fn fetch(&self, kind: MetricKind) -> Result<String, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.documents
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .flatten()
            .ok_or_else(|| FetchError::ServerError(format!("{} feed unavailable", kind)))
    }
}
