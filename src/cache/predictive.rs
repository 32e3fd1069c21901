use crate::clock::{duration_millis, millis_between, Clock};
use crate::scoring::priority_score;
use crate::tracker::{AccessPattern, AccessTracker};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Share of entries dropped in one pass when the store outgrows its cap
const EVICTION_FRACTION: f64 = 0.2;

/// A speculatively cached value for a key judged likely to be read again
#[derive(Debug, Clone)]
pub struct PredictiveEntry {
    pub key: String,
    pub value: Value,
    pub ttl: Duration,
    pub priority: f64,
    /// Access pattern as it stood when the entry was promoted
    pub pattern: AccessPattern,
    pub last_access_time: DateTime<Utc>,
    pub access_count: u64,
}

impl PredictiveEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        millis_between(self.last_access_time, now) > duration_millis(self.ttl)
    }
}

/// Secondary in-process cache fed from high-priority keys.
///
/// Size is held at or under `soft_cap` after every promotion by evicting the
/// lowest-priority fifth of the entries.
pub struct PredictiveStore {
    entries: HashMap<String, PredictiveEntry>,
    soft_cap: usize,
    clock: Arc<dyn Clock>,
}

impl PredictiveStore {
    pub fn new(soft_cap: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            soft_cap,
            clock,
        }
    }

    /// Promote `key` if the tracker has seen it. Returns whether an entry was stored.
    pub fn promote(
        &mut self,
        tracker: &AccessTracker,
        key: &str,
        value: Value,
        ttl: Duration,
    ) -> bool {
        let Some(pattern) = tracker.get(key) else {
            tracing::debug!("Skipping promotion of untracked key: {}", key);
            return false;
        };

        let now = self.clock.now();
        let priority = priority_score(&pattern, now);

        self.entries.insert(
            key.to_string(),
            PredictiveEntry {
                key: key.to_string(),
                value,
                ttl,
                priority,
                pattern,
                last_access_time: now,
                access_count: 0,
            },
        );
        tracing::debug!("Promoted key {} with priority {:.3}", key, priority);

        self.enforce_capacity();
        true
    }

    pub fn lookup(&mut self, key: &str) -> Option<Value> {
        let now = self.clock.now();

        let entry = self.entries.get_mut(key)?;
        if entry.is_expired(now) {
            self.entries.remove(key);
            tracing::debug!("Predictive entry expired: {}", key);
            return None;
        }

        entry.access_count += 1;
        entry.last_access_time = now;
        Some(entry.value.clone())
    }

    /// Evict the lowest-priority entries if over the soft cap. Returns the number evicted.
    pub fn enforce_capacity(&mut self) -> usize {
        let size = self.entries.len();
        if size <= self.soft_cap {
            return 0;
        }

        let evict_count = (size as f64 * EVICTION_FRACTION).floor() as usize;

        let mut ranked: Vec<(&String, f64, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key, entry.priority, entry.last_access_time))
            .collect();
        // Ties go to the entry touched longest ago.
        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });

        let victims: Vec<String> = ranked
            .into_iter()
            .take(evict_count)
            .map(|(key, _, _)| key.clone())
            .collect();

        for key in &victims {
            self.entries.remove(key);
        }

        tracing::debug!(
            "Predictive store over capacity ({} > {}), evicted {} entries",
            size,
            self.soft_cap,
            victims.len()
        );
        victims.len()
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entry(&self, key: &str) -> Option<PredictiveEntry> {
        self.entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
