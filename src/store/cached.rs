use crate::cache::fallback::FallbackStore;
use crate::cache::predictive::{PredictiveEntry, PredictiveStore};
use crate::cache::Tier;
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::config::CacheConfig;
use crate::error::{CacheError, RemoteError};
use crate::metrics::{parse_info, CacheCounters, CacheStats, RemoteStats};
use crate::store::adapter::PrimaryStoreAdapter;
use crate::store::remote::RemoteStore;
use crate::tracker::{AccessKind, AccessPattern, AccessTracker};
use crate::warming::{WarmupConfig, WarmupHandle, WarmupReport, WarmupScheduler};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Caching facade over a remote store.
///
/// Reads and writes go to the remote store while it is reachable. A remote
/// miss is answered from the predictive store; a remote failure (or no
/// connection at all) is answered from the local fallback store. None of
/// these paths surface an error to the caller.
///
/// Lock order is tracker before predictive store, matching the warmup task.
pub struct CachedStore<R: RemoteStore> {
    adapter: Arc<PrimaryStoreAdapter<R>>,
    tracker: Arc<RwLock<AccessTracker>>,
    predictive: Arc<RwLock<PredictiveStore>>,
    fallback: Arc<RwLock<FallbackStore>>,
    counters: Arc<CacheCounters>,
    warmer: Arc<WarmupScheduler<R>>,
    warmup_handle: Mutex<Option<WarmupHandle>>,
    config: CacheConfig,
}

impl<R: RemoteStore> CachedStore<R> {
    pub fn new(remote: R, config: CacheConfig) -> Self {
        Self::with_clock(remote, config, Arc::new(SystemClock))
    }

    pub fn with_clock(remote: R, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let adapter = Arc::new(PrimaryStoreAdapter::new(remote, &config));
        let tracker = Arc::new(RwLock::new(AccessTracker::new(
            config.max_tracked_keys,
            config.default_ttl,
            clock.clone(),
        )));
        let predictive = Arc::new(RwLock::new(PredictiveStore::new(
            config.predictive_capacity,
            clock.clone(),
        )));
        let fallback = Arc::new(RwLock::new(FallbackStore::new(
            config.fallback_capacity,
            clock.clone(),
        )));
        let counters = Arc::new(CacheCounters::new());

        let warmer = Arc::new(WarmupScheduler::new(
            adapter.clone(),
            tracker.clone(),
            predictive.clone(),
            counters.clone(),
            clock,
            WarmupConfig {
                interval: config.warmup_interval,
                batch_size: config.warmup_batch_size,
                ttl: config.default_ttl,
            },
        ));

        Self {
            adapter,
            tracker,
            predictive,
            fallback,
            counters,
            warmer,
            warmup_handle: Mutex::new(None),
            config,
        }
    }

    /// Connect to the remote store and start the warmup scheduler.
    ///
    /// A connection failure is returned for the caller's information only:
    /// the cache keeps serving from the fallback store either way.
    pub async fn initialize(&self) -> Result<(), CacheError> {
        let connected = self.adapter.connect().await;
        if let Err(e) = &connected {
            tracing::warn!("Remote store unavailable, serving from fallback: {}", e);
        }

        if self.config.enable_warmup {
            let mut handle = self.warmup_handle.lock().await;
            if handle.is_none() {
                *handle = Some(self.warmer.clone().spawn());
            }
        }

        connected.map_err(CacheError::from)
    }

    pub fn is_connected(&self) -> bool {
        self.adapter.is_connected()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The remote client this cache fronts
    pub fn remote(&self) -> &Arc<R> {
        self.adapter.client()
    }

    /// Write `value`, using `default_ttl` when `ttl` is `None` or zero. Returns
    /// the tier that took it.
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Tier {
        let ttl = self.effective_ttl(ttl);

        if self.adapter.is_connected() {
            let text = codec::encode(&value);
            match self.adapter.set(key, &text, ttl).await {
                Ok(()) => {
                    self.record_write(key, value, ttl).await;
                    return Tier::Remote;
                }
                Err(e) => {
                    tracing::warn!("Remote set failed for key {}, using fallback: {}", key, e)
                }
            }
        } else {
            tracing::debug!("Remote store not connected, writing {} to fallback", key);
        }

        self.fallback.write().await.set(key, value, ttl);
        Tier::Fallback
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        if self.adapter.is_connected() {
            match self.adapter.get(key).await {
                Ok(Some(text)) => {
                    self.tracker.write().await.touch(key, AccessKind::Read);
                    self.counters.record_hit();
                    tracing::debug!("Cache HIT for key: {}", key);
                    return Some(codec::decode(&text));
                }
                Ok(None) => return self.lookup_predictive(key).await,
                Err(e) => {
                    tracing::warn!("Remote get failed for key {}, using fallback: {}", key, e)
                }
            }
        }

        self.lookup_fallback(key).await
    }

    pub async fn mset(&self, entries: Vec<(String, Value)>, ttl: Option<Duration>) -> Tier {
        let ttl = self.effective_ttl(ttl);

        if self.adapter.is_connected() {
            if entries.is_empty() {
                return Tier::Remote;
            }

            let pairs: Vec<(String, String)> = entries
                .iter()
                .map(|(key, value)| (key.clone(), codec::encode(value)))
                .collect();

            match self.adapter.mset(&pairs, ttl).await {
                Ok(()) => {
                    for (key, value) in entries {
                        self.record_write(&key, value, ttl).await;
                    }
                    return Tier::Remote;
                }
                Err(e) => tracing::warn!(
                    "Remote mset of {} keys failed, using fallback: {}",
                    pairs.len(),
                    e
                ),
            }
        }

        let mut fallback = self.fallback.write().await;
        for (key, value) in entries {
            fallback.set(&key, value, ttl);
        }
        Tier::Fallback
    }

    /// Values for `keys`, in order.
    pub async fn mget(&self, keys: &[String]) -> Vec<Option<Value>> {
        if keys.is_empty() {
            return Vec::new();
        }

        if self.adapter.is_connected() {
            match self.adapter.mget(keys).await {
                Ok(texts) => {
                    let mut values = Vec::with_capacity(keys.len());
                    for (key, text) in keys.iter().zip(texts) {
                        let value = match text {
                            Some(text) => {
                                self.tracker.write().await.touch(key, AccessKind::Read);
                                self.counters.record_hit();
                                Some(codec::decode(&text))
                            }
                            None => self.lookup_predictive(key).await,
                        };
                        values.push(value);
                    }
                    return values;
                }
                Err(e) => tracing::warn!(
                    "Remote mget of {} keys failed, using fallback: {}",
                    keys.len(),
                    e
                ),
            }
        }

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.lookup_fallback(key).await);
        }
        values
    }

    /// Remove `key`. Returns whether the tier that answered held it.
    pub async fn delete(&self, key: &str) -> bool {
        self.predictive.write().await.remove(key);

        if self.adapter.is_connected() {
            match self.adapter.delete(&[key.to_string()]).await {
                Ok(removed) => {
                    self.fallback.write().await.delete(key);
                    return removed > 0;
                }
                Err(e) => {
                    tracing::warn!("Remote delete failed for key {}, using fallback: {}", key, e)
                }
            }
        }

        self.fallback.write().await.delete(key)
    }

    /// Remove every key in the namespace from the remote store, then empty
    /// the local tiers. Returns the number of remote keys removed.
    pub async fn clear(&self) -> usize {
        let mut removed = 0;

        if self.adapter.is_connected() {
            match self.adapter.keys("*").await {
                Ok(keys) => match self.adapter.delete(&keys).await {
                    Ok(count) => removed = count as usize,
                    Err(e) => tracing::warn!("Failed to delete {} remote keys: {}", keys.len(), e),
                },
                Err(e) => tracing::warn!("Failed to list remote keys for clear: {}", e),
            }
        }

        self.fallback.write().await.clear();
        self.predictive.write().await.clear();
        tracing::info!("Cache cleared ({} remote keys removed)", removed);
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        // One lock at a time, so no ordering against writers is needed.
        let fallback_entries = self.fallback.read().await.len();
        let tracked_patterns = self.tracker.read().await.len();
        let predictive_entries = self.predictive.read().await.len();
        let connected = self.adapter.is_connected();

        let mut stats = CacheStats {
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            predictive_hits: self.counters.predictive_hits(),
            warmup_hits: self.counters.warmup_hits(),
            total_keys: fallback_entries as u64,
            predictive_entries,
            fallback_entries,
            tracked_patterns,
            connected,
            ..Default::default()
        };

        if connected {
            match self.remote_stats().await {
                Ok((remote, total_keys)) => {
                    stats.total_keys = total_keys;
                    stats.remote = Some(remote);
                }
                Err(e) => tracing::warn!("Failed to read remote stats: {}", e),
            }
        }

        stats.with_ratios()
    }

    async fn remote_stats(&self) -> Result<(RemoteStats, u64), RemoteError> {
        let mut info = HashMap::new();
        for section in ["stats", "memory", "clients"] {
            info.extend(parse_info(&self.adapter.info(section).await?));
        }
        let total_keys = self.adapter.keys("*").await?.len() as u64;
        Ok((RemoteStats::from_info(&info), total_keys))
    }

    /// Connected and answering pings
    pub async fn health_check(&self) -> bool {
        if !self.adapter.is_connected() {
            return false;
        }
        match self.adapter.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Remote health check failed: {}", e);
                false
            }
        }
    }

    /// Stop the warmup scheduler (letting a running cycle finish) and disconnect.
    pub async fn close(&self) {
        if let Some(handle) = self.warmup_handle.lock().await.take() {
            handle.shutdown().await;
        }
        self.adapter.disconnect();
    }

    /// Serialize `value` and write it.
    pub async fn set_as<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<Tier, CacheError> {
        let value = codec::to_value(value)?;
        Ok(self.set(key, value, ttl).await)
    }

    /// Read and deserialize a value.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await {
            Some(value) => codec::from_value(value).map(Some),
            None => Ok(None),
        }
    }

    /// Run one warmup cycle now, independent of the schedule.
    pub async fn warm_now(&self) -> WarmupReport {
        self.warmer.warm_once().await
    }

    pub async fn access_pattern(&self, key: &str) -> Option<AccessPattern> {
        self.tracker.read().await.get(key)
    }

    pub async fn predictive_entry(&self, key: &str) -> Option<PredictiveEntry> {
        self.predictive.read().await.entry(key)
    }

    /// Forget every access pattern.
    pub async fn clear_access_patterns(&self) {
        self.tracker.write().await.clear();
    }

    /// A missing or zero TTL means `default_ttl`.
    fn effective_ttl(&self, ttl: Option<Duration>) -> Duration {
        ttl.filter(|ttl| !ttl.is_zero())
            .unwrap_or(self.config.default_ttl)
    }

    async fn record_write(&self, key: &str, value: Value, ttl: Duration) {
        let mut tracker = self.tracker.write().await;
        let pattern = tracker.touch(key, AccessKind::Write);
        if pattern.is_high_priority() {
            self.predictive
                .write()
                .await
                .promote(&tracker, key, value, ttl);
        }
    }

    async fn lookup_predictive(&self, key: &str) -> Option<Value> {
        match self.predictive.write().await.lookup(key) {
            Some(value) => {
                self.counters.record_predictive_hit();
                tracing::debug!("Predictive HIT for key: {}", key);
                Some(value)
            }
            None => {
                self.counters.record_miss();
                tracing::debug!("Cache MISS for key: {}", key);
                None
            }
        }
    }

    async fn lookup_fallback(&self, key: &str) -> Option<Value> {
        match self.fallback.write().await.get(key) {
            Some(value) => {
                self.counters.record_hit();
                tracing::debug!("Fallback HIT for key: {}", key);
                Some(value)
            }
            None => {
                self.counters.record_miss();
                tracing::debug!("Fallback MISS for key: {}", key);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::memory::MemoryRemoteStore;
    use serde_json::json;

    fn config() -> CacheConfig {
        CacheConfig {
            enable_warmup: false,
            ..Default::default()
        }
    }

    async fn connected_cache() -> (MemoryRemoteStore, CachedStore<MemoryRemoteStore>) {
        let remote = MemoryRemoteStore::new();
        let cache = CachedStore::new(remote.clone(), config());
        cache.initialize().await.unwrap();
        (remote, cache)
    }

    #[tokio::test]
    async fn test_remote_round_trip_counts_hit() {
        let (remote, cache) = connected_cache().await;

        let tier = cache.set("u1", json!({"a": 1}), Some(Duration::from_secs(60))).await;
        assert_eq!(tier, Tier::Remote);
        assert_eq!(
            remote.get("cache:u1").await.unwrap(),
            Some("{\"a\":1}".to_string())
        );

        assert_eq!(cache.get("u1").await, Some(json!({"a": 1})));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_remote_miss_consults_predictive_store() {
        let (remote, cache) = connected_cache().await;

        for i in 0..6 {
            cache.set("hot", json!(i), Some(Duration::from_secs(60))).await;
        }
        assert!(cache.predictive_entry("hot").await.is_some());

        // Lose the key remotely; the predictive copy answers.
        remote.del(&["cache:hot".to_string()]).await.unwrap();
        assert_eq!(cache.get("hot").await, Some(json!(5)));
        assert_eq!(cache.get("cold").await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.predictive_hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_remote_error_falls_back_per_call() {
        let (remote, cache) = connected_cache().await;
        remote.fail_key("cache:flaky").await;

        assert_eq!(cache.set("flaky", json!("x"), None).await, Tier::Fallback);
        assert_eq!(cache.get("flaky").await, Some(json!("x")));
        assert!(cache.is_connected());

        // Other keys still go to the remote store.
        assert_eq!(cache.set("steady", json!(1), None).await, Tier::Remote);
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        #[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
        struct Session {
            user: String,
            ttl: u32,
        }

        let (_remote, cache) = connected_cache().await;
        let session = Session {
            user: "ada".to_string(),
            ttl: 30,
        };
        cache.set_as("s", &session, None).await.unwrap();
        assert_eq!(cache.get_as::<Session>("s").await.unwrap(), Some(session));
        assert_eq!(cache.get_as::<Session>("none").await.unwrap(), None);

        cache.set("wrong", json!([1, 2]), None).await;
        assert!(cache.get_as::<Session>("wrong").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_clears_every_tier() {
        let clock = ManualClock::default();
        let remote = MemoryRemoteStore::with_clock(Arc::new(clock.clone()));
        let cache = CachedStore::with_clock(remote.clone(), config(), Arc::new(clock));
        cache.initialize().await.unwrap();

        for _ in 0..6 {
            cache.set("k", json!(1), None).await;
        }
        assert!(cache.predictive_entry("k").await.is_some());

        assert!(cache.delete("k").await);
        assert!(!cache.delete("k").await);
        assert!(cache.predictive_entry("k").await.is_none());
        assert_eq!(cache.get("k").await, None);
    }
}
