//! Configuration loading and persistence.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! `config.json` in the telepath config directory, and `TELEPATH_*`
//! environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::constants::{
    DEFAULT_POLL_INTERVAL, DEFAULT_POLL_RETRIES, DEFAULT_QUEUING_URL, HTTP_REQUEST_TIMEOUT,
};
use crate::poller::PollerConfig;

const CONFIG_FILE: &str = "config.json";

/// Configuration for the telepath CLI.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the relay queuing service.
    pub queuing_url: String,
    /// JSON-RPC endpoint of the blockchain node used by the signing proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_url: Option<String>,
    /// Receive attempts per poll cycle.
    pub poll_retries: u32,
    /// Delay in milliseconds between receive attempts.
    pub poll_interval_ms: u64,
    /// Timeout in seconds for each HTTP request.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queuing_url: DEFAULT_QUEUING_URL.to_string(),
            node_url: None,
            poll_retries: DEFAULT_POLL_RETRIES,
            poll_interval_ms: u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(100),
            request_timeout_secs: HTTP_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `TELEPATH_CONFIG_DIR` overrides the platform config directory
    /// (e.g. `~/.config/telepath` on Linux).
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("TELEPATH_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("telepath")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_dir()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reads `config.json` from `dir`, falling back to defaults when absent.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid {}", path.display()))
    }

    /// Apply `TELEPATH_*` overrides looked up through `var`.
    ///
    /// Numeric values that do not parse are ignored.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("TELEPATH_QUEUING_URL") {
            self.queuing_url = url;
        }

        if let Some(url) = var("TELEPATH_NODE_URL") {
            self.node_url = Some(url);
        }

        if let Some(retries) = var("TELEPATH_POLL_RETRIES").and_then(|v| v.parse().ok()) {
            self.poll_retries = retries;
        }

        if let Some(interval) = var("TELEPATH_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = interval;
        }

        if let Some(timeout) = var("TELEPATH_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = timeout;
        }
    }

    /// Persists the current configuration to the config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_dir()?)
    }

    /// Writes `config.json` into `dir`.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Poller settings for response polling.
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            retries: self.poll_retries,
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
