//! Application configuration management.
//!
//! Configuration is stored at `~/.config/covidtrack/config.json`. A missing
//! file means defaults everywhere; missing fields in an existing file fall
//! back to their defaults too.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::api::{FeedClient, FeedUrls};
use crate::cache::{StalenessGate, DEFAULT_STALE_AFTER_HOURS};
use crate::parser::{FeedParser, DEFAULT_FIRST_DATA_COLUMN};
use crate::schedule::{RefreshSchedule, DEFAULT_REFRESH_HOURS, DEFAULT_REFRESH_MINUTE};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "covidtrack";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed_urls: FeedUrls,
    pub stale_after_hours: i64,
    pub first_data_column: usize,
    pub request_timeout_secs: u64,
    pub refresh_hours: Vec<u32>,
    pub refresh_minute: u32,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_urls: FeedUrls::default(),
            stale_after_hours: DEFAULT_STALE_AFTER_HOURS,
            first_data_column: DEFAULT_FIRST_DATA_COLUMN,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_hours: DEFAULT_REFRESH_HOURS.to_vec(),
            refresh_minute: DEFAULT_REFRESH_MINUTE,
            cache_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn staleness_gate(&self) -> Result<StalenessGate> {
        if self.stale_after_hours <= 0 {
            anyhow::bail!("stale_after_hours must be positive, got {}", self.stale_after_hours);
        }
        Ok(StalenessGate::new(chrono::Duration::hours(self.stale_after_hours)))
    }

    pub fn parser(&self) -> FeedParser {
        FeedParser::new(self.first_data_column)
    }

    pub fn schedule(&self) -> Result<RefreshSchedule> {
        Ok(RefreshSchedule::new(
            self.refresh_hours.iter().copied(),
            self.refresh_minute,
        )?)
    }

    pub fn feed_client(&self) -> Result<FeedClient> {
        let timeout = Duration::from_secs(self.request_timeout_secs);
        FeedClient::new(self.feed_urls.clone(), timeout).context("Failed to build feed client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.stale_after_hours, 12);
        assert_eq!(config.first_data_column, 5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "stale_after_hours": 24, "refresh_hours": [6] }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.stale_after_hours, 24);
        assert_eq!(config.refresh_hours, vec![6]);
        assert_eq!(config.refresh_minute, DEFAULT_REFRESH_MINUTE);
        assert_eq!(config.feed_urls, FeedUrls::default());
        assert_eq!(config.staleness_gate().unwrap().window(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            cache_dir: Some(dir.path().join("cache")),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(reloaded.cache_dir().unwrap(), dir.path().join("cache"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = Config {
            stale_after_hours: 0,
            refresh_minute: 75,
            ..Config::default()
        };
        assert!(config.staleness_gate().is_err());
        assert!(config.schedule().is_err());
    }
}
