//! Configuration Module
//!
//! Handles loading and validating cache engine configuration from
//! environment variables or a JSON document.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{EvictionPolicyKind, DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};

/// Cache engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Eviction policy used once the cache is full
    pub eviction_policy: EvictionPolicyKind,
    /// Maximum key length in bytes
    pub max_key_size: usize,
    /// Maximum value length in bytes
    pub max_value_size: usize,
    /// Number of independently locked entry table shards
    pub shard_count: usize,
    /// Background sweep interval in milliseconds
    pub sweep_interval_ms: u64,
    /// Maximum number of expired entries removed per sweep
    pub sweep_batch_size: usize,
    /// Upper bound for LFU access counters
    pub lfu_max_frequency: u32,
    /// Halve every LFU counter after this many recorded accesses.
    ///
    /// Each decay walks every tracked key while the policy lock is held, so
    /// it costs O(n) once per period. Pick a period well above the capacity
    /// to keep the amortized cost per access constant.
    pub lfu_decay_after: Option<u64>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMBASE_CAPACITY` - Maximum cache entries (default: 1000)
    /// - `MEMBASE_EVICTION_POLICY` - `lru`, `lfu` or `fifo` (default: lru)
    /// - `MEMBASE_MAX_KEY_SIZE` - Key limit in bytes (default: 256)
    /// - `MEMBASE_MAX_VALUE_SIZE` - Value limit in bytes (default: 1 MiB)
    /// - `MEMBASE_SHARDS` - Entry table shard count (default: 16)
    /// - `MEMBASE_SWEEP_INTERVAL_MS` - Sweep frequency (default: 1000)
    /// - `MEMBASE_SWEEP_BATCH` - Removals per sweep (default: 1024)
    /// - `MEMBASE_LFU_MAX_FREQUENCY` - LFU counter cap (default: 255)
    /// - `MEMBASE_LFU_DECAY_AFTER` - LFU aging period in accesses (default: unset)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            capacity: parse_or(lookup("MEMBASE_CAPACITY"), defaults.capacity),
            eviction_policy: parse_or(
                lookup("MEMBASE_EVICTION_POLICY"),
                defaults.eviction_policy,
            ),
            max_key_size: parse_or(lookup("MEMBASE_MAX_KEY_SIZE"), defaults.max_key_size),
            max_value_size: parse_or(lookup("MEMBASE_MAX_VALUE_SIZE"), defaults.max_value_size),
            shard_count: parse_or(lookup("MEMBASE_SHARDS"), defaults.shard_count),
            sweep_interval_ms: parse_or(
                lookup("MEMBASE_SWEEP_INTERVAL_MS"),
                defaults.sweep_interval_ms,
            ),
            sweep_batch_size: parse_or(lookup("MEMBASE_SWEEP_BATCH"), defaults.sweep_batch_size),
            lfu_max_frequency: parse_or(
                lookup("MEMBASE_LFU_MAX_FREQUENCY"),
                defaults.lfu_max_frequency,
            ),
            lfu_decay_after: lookup("MEMBASE_LFU_DECAY_AFTER").and_then(|v| v.parse().ok()),
        }
    }

    /// Interval between background sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Parses a Config from JSON. Missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CacheError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be positive".to_string(),
            ));
        }
        if self.shard_count == 0 {
            return Err(CacheError::InvalidConfig(
                "shard_count must be positive".to_string(),
            ));
        }
        if self.max_key_size == 0 || self.max_value_size == 0 {
            return Err(CacheError::InvalidConfig(
                "size limits must be positive".to_string(),
            ));
        }
        if self.lfu_max_frequency == 0 {
            return Err(CacheError::InvalidConfig(
                "lfu_max_frequency must be positive".to_string(),
            ));
        }
        if self.lfu_decay_after == Some(0) {
            return Err(CacheError::InvalidConfig(
                "lfu_decay_after must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 1000,
            eviction_policy: EvictionPolicyKind::Lru,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            shard_count: 16,
            sweep_interval_ms: 1000,
            sweep_batch_size: 1024,
            lfu_max_frequency: 255,
            lfu_decay_after: None,
        }
    }
}
