use crate::error::{Result, SyncError};
use crate::models::AccessCredentials;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The remote read endpoint rejects pages larger than this.
pub const MAX_PAGE_SIZE: usize = 300;

/// Operator-supplied API keys for the two remote services.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceKeys {
    pub echonest_api_key: String,
    pub rdio_consumer_key: String,
    pub rdio_consumer_secret: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub service_keys: ServiceKeys,
    pub playlist_name: String,

    #[serde(default = "default_catalog_name")]
    pub catalog_name: String,
    #[serde(default = "default_chart_url")]
    pub chart_url: String,
    /// Region half of the track id bucket requested on extended reads.
    #[serde(default = "default_region")]
    pub region: String,

    // Resolved on first run and written back to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessCredentials>,

    // Pacing/retry
    #[serde(default = "default_page_size")]
    pub catalog_page_size: usize,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_poll_interval")]
    pub ticket_poll_interval_ms: u64,
    #[serde(default = "default_poll_attempts")]
    pub ticket_poll_max_attempts: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries_on_error: u32,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_catalog_name() -> String { "chart-playlist-sync".into() }
fn default_chart_url() -> String { "https://www.apple.com/de/itunes/charts/songs/".into() }
fn default_region() -> String { "DE".into() }
fn default_page_size() -> usize { MAX_PAGE_SIZE }
fn default_rate_limit() -> u32 { 20 }
fn default_poll_interval() -> u64 { 1000 }
fn default_poll_attempts() -> u32 { 120 }
fn default_max_retries() -> u32 { 3 }
fn default_log_dir() -> PathBuf { "log".into() }

impl Config {
    /// Effective read page size, clamped to what the remote accepts.
    pub fn page_size(&self) -> usize {
        self.catalog_page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// Loads and rewrites the JSON config file. Setup steps return updated
/// `Config` values; callers persist only when the value actually changed.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| SyncError::Config(format!("reading {}: {}", self.path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| SyncError::Config(format!("parsing {}: {}", self.path.display(), e)))
    }

    pub fn save(&self, cfg: &Config) -> Result<()> {
        let raw = serde_json::to_string_pretty(cfg)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}
