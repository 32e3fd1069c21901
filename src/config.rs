use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the cache facade and the remote store behind it.
///
/// # Default Values
/// - `host`: "localhost", `port`: 6379, `database_index`: 0
/// - `key_prefix`: "cache:"
/// - `default_ttl`: 1 hour
/// - `max_memory`: "256mb", `eviction_policy`: allkeys-lru
/// - `predictive_capacity`: 1000 entries
/// - `warmup_interval`: 60 seconds, `warmup_batch_size`: 10
/// - `max_tracked_keys`: 10 000, `fallback_capacity`: 10 000
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub database_index: u32,

    /// Namespace prepended to every remote key
    pub key_prefix: String,

    /// TTL used when a write does not specify one
    pub default_ttl: Duration,

    /// Passed through to the remote store's `maxmemory`
    pub max_memory: String,

    /// Passed through to the remote store's `maxmemory-policy`
    pub eviction_policy: EvictionPolicy,

    /// Soft cap on predictive store entries
    pub predictive_capacity: usize,

    /// Time between warmup cycles
    pub warmup_interval: Duration,

    /// Maximum candidates considered per warmup cycle
    pub warmup_batch_size: usize,

    /// Start the warmup scheduler on initialize
    pub enable_warmup: bool,

    /// Maximum access patterns retained before the least recent is dropped
    pub max_tracked_keys: usize,

    /// Maximum fallback entries retained during an outage
    pub fallback_capacity: usize,

    /// Reconnect policy for the remote store
    pub retry: RetryConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            database_index: 0,
            key_prefix: "cache:".to_string(),
            default_ttl: Duration::from_secs(3600),
            max_memory: "256mb".to_string(),
            eviction_policy: EvictionPolicy::AllKeysLru,
            predictive_capacity: 1000,
            warmup_interval: Duration::from_secs(60),
            warmup_batch_size: 10,
            enable_warmup: true,
            max_tracked_keys: 10_000,
            fallback_capacity: 10_000,
            retry: RetryConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, CacheError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CacheError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.host.is_empty() {
            return Err(CacheError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be greater than zero".to_string(),
            ));
        }
        if self.predictive_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "predictive_capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_tracked_keys == 0 || self.fallback_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "max_tracked_keys and fallback_capacity must be greater than zero".to_string(),
            ));
        }
        if self.enable_warmup && self.warmup_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "warmup_interval must be greater than zero".to_string(),
            ));
        }
        if parse_memory_size(&self.max_memory).is_none() {
            return Err(CacheError::InvalidConfig(format!(
                "unrecognized max_memory value: {}",
                self.max_memory
            )));
        }
        Ok(())
    }

    /// `redis://[:password@]host:port/db`
    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database_index
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.database_index),
        }
    }
}

/// Eviction policy forwarded to the remote store. Not enforced locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvictionPolicy {
    #[serde(rename = "allkeys-lru")]
    AllKeysLru,
    #[serde(rename = "volatile-lru")]
    VolatileLru,
    #[serde(rename = "allkeys-random")]
    AllKeysRandom,
    #[serde(rename = "volatile-random")]
    VolatileRandom,
    #[serde(rename = "volatile-ttl")]
    VolatileTtl,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::AllKeysLru => "allkeys-lru",
            EvictionPolicy::VolatileLru => "volatile-lru",
            EvictionPolicy::AllKeysRandom => "allkeys-random",
            EvictionPolicy::VolatileRandom => "volatile-random",
            EvictionPolicy::VolatileTtl => "volatile-ttl",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allkeys-lru" => Ok(EvictionPolicy::AllKeysLru),
            "volatile-lru" => Ok(EvictionPolicy::VolatileLru),
            "allkeys-random" => Ok(EvictionPolicy::AllKeysRandom),
            "volatile-random" => Ok(EvictionPolicy::VolatileRandom),
            "volatile-ttl" => Ok(EvictionPolicy::VolatileTtl),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown eviction policy: {}",
                other
            ))),
        }
    }
}

/// Reconnect policy for the remote store.
///
/// # Default Values
/// - `step`: 100ms per attempt
/// - `max_delay`: 3 seconds
/// - `max_attempts`: 10
/// - `max_elapsed`: 1 hour of cumulative retry delay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub step: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub max_elapsed: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(100),
            max_delay: Duration::from_millis(3000),
            max_attempts: 10,
            max_elapsed: Duration::from_secs(3600),
        }
    }
}

impl RetryConfig {
    /// Delay before retrying after `attempt` failed attempts: `min(attempt * step, max_delay)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max_delay)
    }
}

/// Parse a memory size such as `"256mb"`, `"1gb"`, `"512k"` or `"1048576"` into bytes.
pub fn parse_memory_size(value: &str) -> Option<u64> {
    let value = value.trim().to_ascii_lowercase();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits.parse().ok()?;

    let multiplier = match unit {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };

    amount.checked_mul(multiplier)
}
