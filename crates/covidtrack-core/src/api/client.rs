//! HTTP client for the upstream CSV feeds.
//!
//! Each metric kind has its own URL. A fetch returns the raw document text;
//! parsing happens in `crate::parser`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FetchError;
use crate::models::MetricKind;

// ============================================================================
// Constants
// ============================================================================

/// Base URL of the CSSE daily time series.
const FEED_BASE_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series";

/// Default HTTP request timeout in seconds.
/// The feeds are a few hundred KB; 30s tolerates a slow mirror.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Source of raw CSV documents, one per metric kind.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, kind: MetricKind) -> Result<String, FetchError>;
}

/// Per-kind feed locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedUrls {
    pub infected: String,
    pub dead: String,
    pub recovered: String,
}

impl Default for FeedUrls {
    fn default() -> Self {
        Self {
            infected: format!("{}/time_series_covid19_confirmed_global.csv", FEED_BASE_URL),
            dead: format!("{}/time_series_covid19_deaths_global.csv", FEED_BASE_URL),
            recovered: format!("{}/time_series_covid19_recovered_global.csv", FEED_BASE_URL),
        }
    }
}

impl FeedUrls {
    pub fn get(&self, kind: MetricKind) -> &str {
        match kind {
            MetricKind::Infected => &self.infected,
            MetricKind::Dead => &self.dead,
            MetricKind::Recovered => &self.recovered,
        }
    }
}

/// Feed client over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct FeedClient {
    client: Client,
    urls: FeedUrls,
}

impl FeedClient {
    /// Create a new feed client
    pub fn new(urls: FeedUrls, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, urls })
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, kind: MetricKind) -> Result<String, FetchError> {
        let url = self.urls.get(kind);
        if url.is_empty() {
            return Err(FetchError::Unconfigured(kind));
        }

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/csv, text/plain")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        debug!(feed = %kind, bytes = body.len(), "Fetched feed");
        Ok(body)
    }
}
