use crate::clock::{duration_millis, millis_between, Clock};
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// Local store used while the remote tier is unavailable.
///
/// Entries expire lazily: an expired entry is only removed when its key is
/// next looked up. The map is bounded, dropping the least recently used entry
/// once `capacity` is reached.
pub struct FallbackStore {
    inner: LruCache<String, FallbackEntry>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
struct FallbackEntry {
    value: Value,
    written_at: DateTime<Utc>,
    ttl: Duration,
}

impl FallbackEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        millis_between(self.written_at, now) >= duration_millis(self.ttl)
    }
}

impl FallbackStore {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
            clock,
        }
    }

    pub fn set(&mut self, key: &str, value: Value, ttl: Duration) {
        let entry = FallbackEntry {
            value,
            written_at: self.clock.now(),
            ttl,
        };

        if let Some((evicted, _)) = self.inner.push(key.to_string(), entry) {
            if evicted != key {
                tracing::debug!("Fallback store full, dropped key: {}", evicted);
            }
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        let now = self.clock.now();

        let expired = match self.inner.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.inner.pop(key);
            tracing::debug!("Fallback entry expired: {}", key);
        }
        None
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.inner.pop(key).is_some()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Number of stored entries, including expired ones not yet looked up.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
