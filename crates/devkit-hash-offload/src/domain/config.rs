//! Offload configuration with validation.
//!
//! Defaults are usable as-is; `from_env` layers `DEVKIT_HASH_*` overrides.

use crate::domain::hashing::{MAX_COST, MIN_COST};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Environment variable for the worker count.
pub const ENV_WORKERS: &str = "DEVKIT_HASH_WORKERS";
/// Environment variable for the pending request limit.
pub const ENV_MAX_PENDING: &str = "DEVKIT_HASH_MAX_PENDING";
/// Environment variable for the default deadline in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "DEVKIT_HASH_TIMEOUT_MS";
/// Environment variable for the default cost factor.
pub const ENV_ROUNDS: &str = "DEVKIT_HASH_ROUNDS";

/// Hash offload configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    /// Number of isolated worker threads (default: 1)
    pub workers: usize,
    /// Maximum submissions waiting on workers before new ones are refused
    pub max_pending: usize,
    /// Deadline applied when a submission does not carry its own
    pub default_timeout_ms: Option<u64>,
    /// Cost factor used by callers that do not pick one (default: 10)
    pub default_rounds: u32,
    /// Worker thread name prefix; threads are named `<prefix>-<n>`
    pub thread_name_prefix: String,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_pending: 1024,
            default_timeout_ms: None,
            default_rounds: 10,
            thread_name_prefix: "hash-worker".to_string(),
        }
    }
}

impl OffloadConfig {
    /// Defaults overridden by `DEVKIT_HASH_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(workers) = parse_var(&lookup, ENV_WORKERS) {
            self.workers = workers;
        }
        if let Some(max_pending) = parse_var(&lookup, ENV_MAX_PENDING) {
            self.max_pending = max_pending;
        }
        if let Some(timeout_ms) = parse_var(&lookup, ENV_TIMEOUT_MS) {
            self.default_timeout_ms = Some(timeout_ms);
        }
        if let Some(rounds) = parse_var(&lookup, ENV_ROUNDS) {
            self.default_rounds = rounds;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.max_pending == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_pending cannot be 0".into(),
            ));
        }
        if self.default_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidTimeout(
                "default timeout cannot be 0".into(),
            ));
        }
        if !(MIN_COST..=MAX_COST).contains(&self.default_rounds) {
            return Err(ConfigError::InvalidRounds(self.default_rounds));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(ConfigError::InvalidThreadName);
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key = key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("default rounds {0} outside the accepted cost range 4..=31")]
    InvalidRounds(u32),
    #[error("thread name prefix cannot be empty")]
    InvalidThreadName,
}
