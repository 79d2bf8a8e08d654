//! Board configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default number of segments appended mid-stroke before an intermediate save.
pub const DEFAULT_SAVE_EVERY: usize = 10;
/// Default timeout for remote point reads and the connection handshake.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Tunables for a board session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// WebSocket URL of the document store server. `None` runs offline.
    pub server_url: Option<String>,
    /// Save every N appended segments during a long stroke. `None` saves
    /// only when a stroke ends.
    pub save_every: Option<usize>,
    /// Directory for the file cache; defaults to the platform data dir.
    pub cache_dir: Option<PathBuf>,
    /// Timeout for remote reads, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            save_every: Some(DEFAULT_SAVE_EVERY),
            cache_dir: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl BoardConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from `INKBOARD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("INKBOARD_SERVER_URL").filter(|v| !v.trim().is_empty()) {
            config.server_url = Some(url.trim().to_string());
        }
        if let Some(value) = lookup("INKBOARD_SAVE_EVERY") {
            config.save_every = match value.trim() {
                "" | "0" | "off" => None,
                n => Some(n.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "INKBOARD_SAVE_EVERY",
                    value: value.clone(),
                })?),
            };
        }
        if let Some(dir) = lookup("INKBOARD_CACHE_DIR").filter(|v| !v.trim().is_empty()) {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup("INKBOARD_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms =
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "INKBOARD_REQUEST_TIMEOUT_MS",
                    value: value.clone(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.save_every == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "save_every",
                value: "0".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
