//! Operator-tunable configuration for the memo pipeline orchestrator.
//!
//! A plain `#[serde(default)]` struct loaded with `toml::from_str`, not a
//! layered `figment`-style loader: every field has a default matching
//! `memo-primitives::constants`, so an empty TOML file is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use memo_primitives::{
    IDLE_LOG_INTERVAL, LEDGER_TIMEOUT, MAX_CHUNK_SIZE, MAX_RETRY_COUNT, RETRY_DELAY,
    STALE_GROUP_TIMEOUT,
};

/// Errors loading or parsing a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Ledger accounts to subscribe to and backfill.
    pub accounts: Vec<String>,
    /// Ledger client endpoints, tried in order and rotated through after
    /// repeated reconnect failures.
    pub ledger_endpoints: Vec<String>,
    /// Group assembly and response-retry tuning.
    pub assembler: AssemblerConfig,
    /// Response router/processor retry tuning.
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            ledger_endpoints: Vec::new(),
            assembler: AssemblerConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }
}

/// Group assembly tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Maximum per-memo byte envelope, passed to the chunker.
    pub max_chunk_size: usize,
    /// How long a group may go without a new fragment before it is
    /// dropped as stale (outside sync mode).
    #[serde(with = "humantime_serde")]
    pub stale_group_timeout: Duration,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self { max_chunk_size: MAX_CHUNK_SIZE, stale_group_timeout: STALE_GROUP_TIMEOUT }
    }
}

/// Response re-review and ledger-watchdog retry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Initial delay before the first re-review retry.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Number of re-review retries before a pending record is dropped.
    pub max_retry_count: u32,
    /// Minimum spacing between consecutive idle-queue log lines.
    #[serde(with = "humantime_serde")]
    pub idle_log_interval: Duration,
    /// Maximum time between `ledgerClosed` events before reconnecting.
    #[serde(with = "humantime_serde")]
    pub ledger_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_delay: RETRY_DELAY,
            max_retry_count: MAX_RETRY_COUNT,
            idle_log_interval: IDLE_LOG_INTERVAL,
            ledger_timeout: LEDGER_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_overrides_merge_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            accounts = ["rAccount1"]

            [retry]
            max_retry_count = 3
            "#
        )
        .unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.accounts, vec!["rAccount1".to_string()]);
        assert_eq!(config.retry.max_retry_count, 3);
        assert_eq!(config.retry.retry_delay, RETRY_DELAY);
        assert_eq!(config.assembler.max_chunk_size, MAX_CHUNK_SIZE);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load("/nonexistent/path/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
