//! Configuration types for the AutoML client

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides the configured backend URL
pub const API_URL_ENV: &str = "AUTOML_API_URL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub wake: WakeConfig,
}

/// Where the AutoML backend lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Timings for the backend wake-up monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeConfig {
    /// Minimum time after a healthy check before another cycle may start
    #[serde(default = "default_freshness_seconds")]
    pub freshness_seconds: u64,
    /// Delay before the "waking up" notification is shown
    #[serde(default = "default_threshold_ms")]
    pub threshold_ms: u64,
    /// How long the visible notification waits before the cycle gives up
    #[serde(default = "default_give_up_ms")]
    pub give_up_ms: u64,
    /// Fixed delay between a failed health check and the next one
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            freshness_seconds: default_freshness_seconds(),
            threshold_ms: default_threshold_ms(),
            give_up_ms: default_give_up_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl WakeConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_seconds)
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }

    pub fn give_up(&self) -> Duration {
        Duration::from_millis(self.give_up_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Reject timings that would make the cycle spin or never surface anything
    pub fn validate(&self) -> crate::Result<()> {
        if self.threshold_ms == 0 {
            return Err(crate::ClientError::Config(
                "wake.threshold_ms must be greater than zero".to_string(),
            ));
        }
        if self.give_up_ms == 0 {
            return Err(crate::ClientError::Config(
                "wake.give_up_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry_delay_ms == 0 {
            return Err(crate::ClientError::Config(
                "wake.retry_delay_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Apply the backend URL from the environment, if set
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::debug!("Using backend URL from {}: {}", API_URL_ENV, url);
                self.backend.base_url = url;
            }
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(crate::ClientError::Config(
                "backend.base_url must not be empty".to_string(),
            ));
        }
        self.wake.validate()
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_freshness_seconds() -> u64 {
    30 * 60
}

fn default_threshold_ms() -> u64 {
    500
}

fn default_give_up_ms() -> u64 {
    15_000
}

fn default_retry_delay_ms() -> u64 {
    750
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::ClientError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
