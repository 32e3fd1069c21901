use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters shared by the facade and the warmup scheduler
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    predictive_hits: AtomicU64,
    warmup_hits: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        ::metrics::increment_counter!("predictive_cache_hits_total");
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        ::metrics::increment_counter!("predictive_cache_misses_total");
    }

    pub fn record_predictive_hit(&self) {
        self.predictive_hits.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        ::metrics::increment_counter!("predictive_cache_predictive_hits_total");
    }

    pub fn record_warmup_hit(&self) {
        self.warmup_hits.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        ::metrics::increment_counter!("predictive_cache_warmup_promotions_total");
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn predictive_hits(&self) -> u64 {
        self.predictive_hits.load(Ordering::Relaxed)
    }

    pub fn warmup_hits(&self) -> u64 {
        self.warmup_hits.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the cache, merged with remote figures when connected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub predictive_hits: u64,
    pub warmup_hits: u64,
    pub hit_ratio: f64,
    pub miss_ratio: f64,
    pub predictive_hit_ratio: f64,
    /// Remote keys in the namespace when connected, fallback entries otherwise
    pub total_keys: u64,
    pub predictive_entries: usize,
    pub fallback_entries: usize,
    pub tracked_patterns: usize,
    pub connected: bool,
    pub remote: Option<RemoteStats>,
}

impl CacheStats {
    /// Fill the derived ratios from the raw counters.
    pub(crate) fn with_ratios(mut self) -> Self {
        let lookups = self.hits + self.misses + self.predictive_hits;
        if lookups > 0 {
            let total = lookups as f64;
            self.hit_ratio = (self.hits + self.predictive_hits) as f64 / total;
            self.miss_ratio = self.misses as f64 / total;
            self.predictive_hit_ratio = self.predictive_hits as f64 / total;
        }
        self
    }
}

/// Figures reported by the remote store's `INFO`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStats {
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    pub used_memory: u64,
    pub max_memory: u64,
    pub connected_clients: u64,
    /// `(1 - used/max) * 100`; `None` when the server reports no memory limit
    pub memory_efficiency: Option<f64>,
}

impl RemoteStats {
    pub fn from_info(info: &HashMap<String, String>) -> Self {
        let field = |name: &str| -> u64 {
            info.get(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0)
        };

        let used_memory = field("used_memory");
        let max_memory = field("maxmemory");
        let memory_efficiency = if max_memory > 0 {
            Some((1.0 - used_memory as f64 / max_memory as f64) * 100.0)
        } else {
            None
        };

        Self {
            keyspace_hits: field("keyspace_hits"),
            keyspace_misses: field("keyspace_misses"),
            used_memory,
            max_memory,
            connected_clients: field("connected_clients"),
            memory_efficiency,
        }
    }
}

/// Parse `INFO` output: `key:value` lines, `#` section headers ignored.
pub fn parse_info(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}
