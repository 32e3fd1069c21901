use crate::clock::{add_duration, millis_between, Clock};
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// Keys touched more often than this may be promoted on write
pub const HIGH_PRIORITY_MIN_ACCESSES: u64 = 5;
/// ...provided their frequency also exceeds this
pub const HIGH_PRIORITY_MIN_FREQUENCY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Running access statistics for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPattern {
    pub key: String,
    pub access_count: u64,
    pub last_access_time: DateTime<Utc>,
    /// Accesses per second, measured against the gap since the previous touch
    pub frequency: f64,
    /// Advisory estimate; nothing in the cache decides on it
    pub predicted_next_access_time: DateTime<Utc>,
}

impl AccessPattern {
    fn new(key: &str, now: DateTime<Utc>, default_ttl: Duration) -> Self {
        Self {
            key: key.to_string(),
            access_count: 0,
            last_access_time: now,
            frequency: 0.0,
            predicted_next_access_time: add_duration(now, default_ttl),
        }
    }

    fn record(&mut self, now: DateTime<Utc>) {
        // Measure the gap before last_access_time is overwritten.
        let elapsed_ms = millis_between(self.last_access_time, now).max(0);
        let elapsed_secs = elapsed_ms as f64 / 1000.0;

        self.access_count += 1;
        self.last_access_time = now;

        self.frequency = if elapsed_secs > 0.0 {
            self.access_count as f64 / elapsed_secs
        } else {
            self.access_count as f64
        };

        if self.access_count > 1 {
            let average_interval_ms = elapsed_ms as u64 / self.access_count;
            self.predicted_next_access_time =
                add_duration(now, Duration::from_millis(average_interval_ms));
        }
    }

    pub fn is_high_priority(&self) -> bool {
        self.access_count > HIGH_PRIORITY_MIN_ACCESSES
            && self.frequency > HIGH_PRIORITY_MIN_FREQUENCY
    }
}

/// Per-key access tracking, bounded by least-recent touch
pub struct AccessTracker {
    patterns: LruCache<String, AccessPattern>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl AccessTracker {
    pub fn new(max_keys: usize, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(max_keys).unwrap_or(NonZeroUsize::MIN);
        Self {
            patterns: LruCache::new(capacity),
            default_ttl,
            clock,
        }
    }

    /// Record an access to `key` and return the updated pattern.
    pub fn touch(&mut self, key: &str, kind: AccessKind) -> AccessPattern {
        let now = self.clock.now();

        if let Some(pattern) = self.patterns.get_mut(key) {
            pattern.record(now);
            tracing::trace!("Touched key {} ({:?}), count {}", key, kind, pattern.access_count);
            return pattern.clone();
        }

        let mut pattern = AccessPattern::new(key, now, self.default_ttl);
        pattern.record(now);
        if let Some((evicted, _)) = self.patterns.push(key.to_string(), pattern.clone()) {
            if evicted != key {
                tracing::debug!("Dropped access pattern for least recent key: {}", evicted);
            }
        }
        pattern
    }

    pub fn is_high_priority(&self, key: &str) -> bool {
        self.patterns
            .peek(key)
            .map(AccessPattern::is_high_priority)
            .unwrap_or(false)
    }

    /// Snapshot of one pattern; does not count as a touch.
    pub fn get(&self, key: &str) -> Option<AccessPattern> {
        self.patterns.peek(key).cloned()
    }

    pub fn patterns(&self) -> Vec<AccessPattern> {
        self.patterns.iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }
}
