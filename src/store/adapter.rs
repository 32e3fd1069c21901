use crate::config::{CacheConfig, RetryConfig};
use crate::error::RemoteError;
use crate::store::remote::RemoteStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Owns the connection to the remote store.
///
/// Keys passed in are un-namespaced; the adapter prepends `key_prefix` on the
/// way out and strips it from `keys` results. While disconnected every call
/// fails fast with [`RemoteError::Disconnected`].
pub struct PrimaryStoreAdapter<R: RemoteStore> {
    client: Arc<R>,
    connected: AtomicBool,
    key_prefix: String,
    retry: RetryConfig,
    max_memory: String,
    eviction_policy: String,
}

impl<R: RemoteStore> PrimaryStoreAdapter<R> {
    pub fn new(client: R, config: &CacheConfig) -> Self {
        Self {
            client: Arc::new(client),
            connected: AtomicBool::new(false),
            key_prefix: config.key_prefix.clone(),
            retry: config.retry.clone(),
            max_memory: config.max_memory.clone(),
            eviction_policy: config.eviction_policy.as_str().to_string(),
        }
    }

    pub fn client(&self) -> &Arc<R> {
        &self.client
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connect with capped linear backoff, giving up after the configured
    /// attempt count or cumulative delay.
    pub async fn connect(&self) -> Result<(), RemoteError> {
        let mut attempt: u32 = 0;
        let mut waited = Duration::ZERO;

        loop {
            attempt += 1;
            match self.client.connect().await {
                Ok(()) => {
                    self.connected.store(true, Ordering::SeqCst);
                    if attempt > 1 {
                        tracing::info!("Connected to remote store after {} attempts", attempt);
                    } else {
                        tracing::info!("Connected to remote store");
                    }
                    self.apply_server_config().await;
                    return Ok(());
                }
                Err(e) => {
                    let delay = self.retry.backoff_delay(attempt);
                    if attempt >= self.retry.max_attempts
                        || waited + delay > self.retry.max_elapsed
                    {
                        self.connected.store(false, Ordering::SeqCst);
                        tracing::warn!(
                            "Giving up on remote store after {} attempts: {}",
                            attempt,
                            e
                        );
                        return Err(RemoteError::RetriesExhausted { attempts: attempt });
                    }

                    tracing::warn!(
                        "Remote connect attempt {} failed: {}, retrying in {:?}",
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    waited += delay;
                }
            }
        }
    }

    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::info!("Disconnected from remote store");
        }
    }

    async fn apply_server_config(&self) {
        if let Err(e) = self.client.config_set("maxmemory", &self.max_memory).await {
            tracing::warn!("Failed to set remote maxmemory: {}", e);
        }
        if let Err(e) = self
            .client
            .config_set("maxmemory-policy", &self.eviction_policy)
            .await
        {
            tracing::warn!("Failed to set remote eviction policy: {}", e);
        }
    }

    fn ensure_connected(&self) -> Result<(), RemoteError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RemoteError::Disconnected)
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        self.ensure_connected()?;
        self.client.get(&self.namespaced(key)).await
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RemoteError> {
        self.ensure_connected()?;
        self.client
            .set_with_ttl(&self.namespaced(key), value, ttl)
            .await
    }

    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, RemoteError> {
        self.ensure_connected()?;
        let namespaced: Vec<String> = keys.iter().map(|k| self.namespaced(k)).collect();
        let values = self.client.mget(&namespaced).await?;
        if values.len() != keys.len() {
            return Err(RemoteError::Command(format!(
                "mget returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    pub async fn mset(&self, pairs: &[(String, String)], ttl: Duration) -> Result<(), RemoteError> {
        self.ensure_connected()?;
        let namespaced: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (self.namespaced(k), v.clone()))
            .collect();
        self.client.mset_with_ttl(&namespaced, ttl).await
    }

    pub async fn delete(&self, keys: &[String]) -> Result<u64, RemoteError> {
        self.ensure_connected()?;
        if keys.is_empty() {
            return Ok(0);
        }
        let namespaced: Vec<String> = keys.iter().map(|k| self.namespaced(k)).collect();
        self.client.del(&namespaced).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, RemoteError> {
        self.ensure_connected()?;
        self.client.exists(&self.namespaced(key)).await
    }

    /// Keys in this namespace matching `pattern`, returned without the prefix
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, RemoteError> {
        self.ensure_connected()?;
        let glob = format!("{}{}", escape_glob(&self.key_prefix), pattern);
        let keys = self.client.keys(&glob).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.key_prefix).map(str::to_string))
            .collect())
    }

    pub async fn ping(&self) -> Result<(), RemoteError> {
        self.ensure_connected()?;
        self.client.ping().await
    }

    pub async fn info(&self, section: &str) -> Result<String, RemoteError> {
        self.ensure_connected()?;
        self.client.info(section).await
    }
}

/// Backslash-escape glob metacharacters so `text` matches only itself.
fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvictionPolicy;
    use crate::store::memory::MemoryRemoteStore;

    fn config() -> CacheConfig {
        CacheConfig {
            key_prefix: "app:".to_string(),
            max_memory: "64mb".to_string(),
            eviction_policy: EvictionPolicy::VolatileTtl,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_calls_fail_fast_before_connect() {
        let adapter = PrimaryStoreAdapter::new(MemoryRemoteStore::new(), &config());
        assert!(!adapter.is_connected());
        assert_eq!(adapter.get("k").await, Err(RemoteError::Disconnected));
        assert_eq!(adapter.ping().await, Err(RemoteError::Disconnected));
    }

    #[tokio::test]
    async fn test_connect_forwards_server_config() {
        let remote = MemoryRemoteStore::new();
        let adapter = PrimaryStoreAdapter::new(remote.clone(), &config());

        adapter.connect().await.unwrap();
        assert!(adapter.is_connected());
        assert_eq!(remote.config_value("maxmemory").await.as_deref(), Some("64mb"));
        assert_eq!(
            remote.config_value("maxmemory-policy").await.as_deref(),
            Some("volatile-ttl")
        );

        adapter.disconnect();
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn test_keys_are_namespaced() {
        let remote = MemoryRemoteStore::new();
        let adapter = PrimaryStoreAdapter::new(remote.clone(), &config());
        adapter.connect().await.unwrap();

        adapter.set("user:1", "\"a\"", Duration::from_secs(60)).await.unwrap();
        remote
            .set_with_ttl("other:user:2", "\"b\"", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            remote.get("app:user:1").await.unwrap(),
            Some("\"a\"".to_string())
        );
        assert_eq!(adapter.keys("*").await.unwrap(), vec!["user:1".to_string()]);
        assert!(adapter.exists("user:1").await.unwrap());
        assert_eq!(adapter.delete(&["user:1".to_string()]).await.unwrap(), 1);
        assert_eq!(adapter.delete(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_glob_characters_in_prefix_match_literally() {
        let remote = MemoryRemoteStore::new();
        let adapter = PrimaryStoreAdapter::new(
            remote.clone(),
            &CacheConfig {
                key_prefix: "a*?:".to_string(),
                ..Default::default()
            },
        );
        adapter.connect().await.unwrap();

        adapter.set("mine", "1", Duration::from_secs(60)).await.unwrap();
        remote
            .set_with_ttl("abc:theirs", "2", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(adapter.keys("*").await.unwrap(), vec!["mine".to_string()]);
        assert_eq!(escape_glob("a*?[x]\\"), "a\\*\\?\\[x\\]\\\\");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_gives_up_after_max_attempts() {
        let remote = MemoryRemoteStore::new();
        remote.set_reachable(false);
        let adapter = PrimaryStoreAdapter::new(remote, &config());

        let started = tokio::time::Instant::now();
        let result = adapter.connect().await;

        assert_eq!(result, Err(RemoteError::RetriesExhausted { attempts: 10 }));
        assert!(!adapter.is_connected());
        // Sleeps after attempts 1..=9: 100ms + 200ms + ... + 900ms
        assert_eq!(started.elapsed(), Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_gives_up_when_retry_budget_spent() {
        let remote = MemoryRemoteStore::new();
        remote.set_reachable(false);
        let mut config = config();
        config.retry.max_attempts = 100;
        config.retry.max_elapsed = Duration::from_millis(250);
        let adapter = PrimaryStoreAdapter::new(remote, &config);

        // 100ms + 200ms would exceed 250ms, so the second failure is final.
        let result = adapter.connect().await;
        assert_eq!(result, Err(RemoteError::RetriesExhausted { attempts: 2 }));
    }
}
