//! Engine configuration.
//!
//! Every setting has a default; the environment only overrides. Malformed
//! values are rejected rather than silently ignored.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_LOCK_TIMEOUT_MS: &str = "PAYREV_LOCK_TIMEOUT_MS";
pub const ENV_MAX_REASON_LEN: &str = "PAYREV_MAX_REASON_LEN";
pub const ENV_MAX_ALLOCATION_AGE_DAYS: &str = "PAYREV_MAX_ALLOCATION_AGE_DAYS";
pub const ENV_LOG_FILTER: &str = "RUST_LOG";

/// Hard ceiling on reversal reasons, in characters. Configuration may only
/// tighten it.
pub const MAX_REASON_LEN: usize = 500;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is not a valid {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounded wait for per-row locks during a reversal.
    pub lock_timeout_ms: u64,
    /// Longest accepted reversal reason, in characters.
    pub max_reason_len: usize,
    /// Allocations older than this are refused by pre-validation.
    pub max_allocation_age_days: i64,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            max_reason_len: MAX_REASON_LEN,
            max_allocation_age_days: 365,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Effective reason limit; deserialized documents are not range-checked.
    pub fn reason_limit(&self) -> usize {
        self.max_reason_len.min(MAX_REASON_LEN)
    }

    /// Load from process environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
            .context("failed to load reversal engine configuration from environment")
    }

    /// Load from an arbitrary key lookup (tests, embedded callers).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            config.lock_timeout_ms = parse(ENV_LOCK_TIMEOUT_MS, &raw, "duration in milliseconds")?;
        }
        if let Some(raw) = lookup(ENV_MAX_REASON_LEN) {
            config.max_reason_len = parse(ENV_MAX_REASON_LEN, &raw, "character count")?;
            if config.max_reason_len == 0 || config.max_reason_len > MAX_REASON_LEN {
                return Err(ConfigError::Invalid {
                    key: ENV_MAX_REASON_LEN,
                    value: raw,
                    expected: "character count between 1 and 500",
                });
            }
        }
        if let Some(raw) = lookup(ENV_MAX_ALLOCATION_AGE_DAYS) {
            config.max_allocation_age_days =
                parse(ENV_MAX_ALLOCATION_AGE_DAYS, &raw, "number of days")?;
        }
        if let Some(raw) = lookup(ENV_LOG_FILTER) {
            if !raw.trim().is_empty() {
                config.log_filter = raw;
            }
        }

        Ok(config)
    }
}

fn parse<T: core::str::FromStr>(
    key: &'static str,
    raw: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        expected,
    })
}
