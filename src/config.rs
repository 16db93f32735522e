//! Scan planning configuration
//!
//! Loaded from JSON. Every field has a default, so an empty object is a
//! valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Scan planning configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Longest run of adjacent column groups fetched in one read (default: 10)
    #[serde(default = "default_column_read_batch_size")]
    pub column_read_batch_size: usize,

    /// Worker threads of the per-query teardown pool (default: 1)
    #[serde(default = "default_teardown_workers")]
    pub teardown_workers: usize,

    /// How long `finish` waits for the teardown pool (default: one hour)
    #[serde(default = "default_teardown_timeout_ms")]
    pub teardown_timeout_ms: u64,
}

fn default_column_read_batch_size() -> usize {
    10
}

fn default_teardown_workers() -> usize {
    1
}

fn default_teardown_timeout_ms() -> u64 {
    60 * 60 * 1000
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            column_read_batch_size: default_column_read_batch_size(),
            teardown_workers: default_teardown_workers(),
            teardown_timeout_ms: default_teardown_timeout_ms(),
        }
    }
}

impl ScanConfig {
    /// Default config with a different column read batch size
    pub fn with_batch_size(column_read_batch_size: usize) -> Self {
        Self {
            column_read_batch_size,
            ..Default::default()
        }
    }

    /// Parses and validates a JSON config
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.column_read_batch_size == 0 {
            return Err(ConfigError::Invalid("column_read_batch_size must be > 0".into()));
        }
        if self.teardown_workers == 0 {
            return Err(ConfigError::Invalid("teardown_workers must be > 0".into()));
        }
        if self.teardown_timeout_ms == 0 {
            return Err(ConfigError::Invalid("teardown_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }
}
