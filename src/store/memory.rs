use crate::clock::{add_duration, Clock, SystemClock};
use crate::config::parse_memory_size;
use crate::error::RemoteError;
use crate::store::remote::RemoteStore;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-process stand-in for the remote store.
///
/// Behaves like a single-node key-value server: TTLs follow the injected
/// clock, `INFO` reports keyspace and memory figures, and `CONFIG SET` is
/// recorded. Reachability can be switched off and individual keys can be made
/// to fail, so outage handling can be exercised without a network. Clones
/// share state.
#[derive(Clone)]
pub struct MemoryRemoteStore {
    inner: Arc<Inner>,
}

struct Inner {
    entries: RwLock<HashMap<String, StoredValue>>,
    server_config: RwLock<HashMap<String, String>>,
    failing_keys: RwLock<HashSet<String>>,
    reachable: AtomicBool,
    keyspace_hits: AtomicU64,
    keyspace_misses: AtomicU64,
    connections: AtomicU64,
    clock: Arc<dyn Clock>,
}

struct StoredValue {
    data: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now < at).unwrap_or(true)
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                server_config: RwLock::new(HashMap::new()),
                failing_keys: RwLock::new(HashSet::new()),
                reachable: AtomicBool::new(true),
                keyspace_hits: AtomicU64::new(0),
                keyspace_misses: AtomicU64::new(0),
                connections: AtomicU64::new(0),
                clock,
            }),
        }
    }

    /// Simulate the server going away or coming back
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.inner.reachable.load(Ordering::SeqCst)
    }

    /// Make every command naming `key` fail until cleared
    pub async fn fail_key(&self, key: &str) {
        self.inner.failing_keys.write().await.insert(key.to_string());
    }

    pub async fn clear_failures(&self) {
        self.inner.failing_keys.write().await.clear();
    }

    /// Value of a server configuration parameter recorded by `config_set`
    pub async fn config_value(&self, parameter: &str) -> Option<String> {
        self.inner.server_config.read().await.get(parameter).cloned()
    }

    /// Number of live keys, regardless of namespace
    pub async fn len(&self) -> usize {
        let now = self.inner.clock.now();
        self.inner
            .entries
            .read()
            .await
            .values()
            .filter(|v| v.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn check(&self, keys: &[&str]) -> Result<(), RemoteError> {
        if !self.is_reachable() {
            return Err(RemoteError::Connection("connection refused".to_string()));
        }
        let failing = self.inner.failing_keys.read().await;
        if let Some(key) = keys.iter().find(|k| failing.contains(**k)) {
            return Err(RemoteError::Command(format!("injected failure for {}", key)));
        }
        Ok(())
    }

    fn expiry(&self, ttl: Duration) -> Option<DateTime<Utc>> {
        if ttl.is_zero() {
            None
        } else {
            Some(add_duration(self.inner.clock.now(), ttl))
        }
    }

    async fn read_live(&self, key: &str) -> Option<String> {
        let now = self.inner.clock.now();
        let mut entries = self.inner.entries.write().await;

        match entries.get(key) {
            Some(value) if value.is_live(now) => Some(value.data.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            self.inner.keyspace_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.keyspace_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn used_memory(&self) -> u64 {
        self.inner
            .entries
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.len() + v.data.len()) as u64)
            .sum()
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn connect(&self) -> Result<(), RemoteError> {
        self.check(&[]).await?;
        self.inner.connections.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        self.check(&[key]).await?;
        let value = self.read_live(key).await;
        self.record_lookup(value.is_some());
        Ok(value)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RemoteError> {
        self.check(&[key]).await?;
        let stored = StoredValue {
            data: value.to_string(),
            expires_at: self.expiry(ttl),
        };
        self.inner
            .entries
            .write()
            .await
            .insert(key.to_string(), stored);
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, RemoteError> {
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.check(&refs).await?;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.read_live(key).await;
            self.record_lookup(value.is_some());
            values.push(value);
        }
        Ok(values)
    }

    async fn mset_with_ttl(
        &self,
        pairs: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), RemoteError> {
        let refs: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        self.check(&refs).await?;

        let expires_at = self.expiry(ttl);
        let mut entries = self.inner.entries.write().await;
        for (key, value) in pairs {
            entries.insert(
                key.clone(),
                StoredValue {
                    data: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, RemoteError> {
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.check(&refs).await?;

        let now = self.inner.clock.now();
        let mut entries = self.inner.entries.write().await;
        let mut removed = 0;
        for key in keys {
            if let Some(value) = entries.remove(key) {
                if value.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, RemoteError> {
        self.check(&[key]).await?;
        Ok(self.read_live(key).await.is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, RemoteError> {
        self.check(&[]).await?;
        let now = self.inner.clock.now();
        let entries = self.inner.entries.read().await;
        let mut matched: Vec<String> = entries
            .iter()
            .filter(|(key, value)| value.is_live(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        matched.sort();
        Ok(matched)
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        self.check(&[]).await
    }

    async fn info(&self, section: &str) -> Result<String, RemoteError> {
        self.check(&[]).await?;

        let mut lines = Vec::new();
        let all = section.is_empty() || section == "all" || section == "everything";

        if all || section == "stats" {
            lines.push("# Stats".to_string());
            lines.push(format!(
                "keyspace_hits:{}",
                self.inner.keyspace_hits.load(Ordering::Relaxed)
            ));
            lines.push(format!(
                "keyspace_misses:{}",
                self.inner.keyspace_misses.load(Ordering::Relaxed)
            ));
        }

        if all || section == "memory" {
            let max_memory = self
                .config_value("maxmemory")
                .await
                .and_then(|v| parse_memory_size(&v))
                .unwrap_or(0);
            let policy = self
                .config_value("maxmemory-policy")
                .await
                .unwrap_or_else(|| "noeviction".to_string());
            lines.push("# Memory".to_string());
            lines.push(format!("used_memory:{}", self.used_memory().await));
            lines.push(format!("maxmemory:{}", max_memory));
            lines.push(format!("maxmemory_policy:{}", policy));
        }

        if all || section == "clients" {
            lines.push("# Clients".to_string());
            lines.push(format!(
                "connected_clients:{}",
                self.inner.connections.load(Ordering::Relaxed).max(1)
            ));
        }

        Ok(lines.join("\r\n"))
    }

    async fn config_set(&self, parameter: &str, value: &str) -> Result<(), RemoteError> {
        self.check(&[]).await?;
        self.inner
            .server_config
            .write()
            .await
            .insert(parameter.to_string(), value.to_string());
        Ok(())
    }
}

/// Glob match supporting `*` (any run), `?` (any single character) and
/// backslash escapes.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_text = 0;

    while t < text.len() {
        let escaped = p + 1 < pattern.len() && pattern[p] == '\\';
        if escaped && pattern[p + 1] == text[t] {
            p += 2;
            t += 1;
        } else if !escaped && p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if !escaped && p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_text = t;
            p += 1;
        } else if let Some(star_pos) = star {
            p = star_pos + 1;
            star_text += 1;
            t = star_text;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("cache:*", "cache:user:1"));
        assert!(!glob_match("cache:*", "other:user:1"));
        assert!(glob_match("user:?", "user:1"));
        assert!(!glob_match("user:?", "user:10"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("a*b*c", "aXXbYY"));
        assert!(glob_match("", ""));
        assert!(glob_match("a\\*:*", "a*:1"));
        assert!(!glob_match("a\\*:*", "abc:1"));
        assert!(!glob_match("a\\?", "ab"));
    }

    #[tokio::test]
    async fn test_ttl_follows_clock() {
        let clock = ManualClock::default();
        let store = MemoryRemoteStore::with_clock(Arc::new(clock.clone()));

        store
            .set_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        clock.advance(Duration::from_secs(10));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_and_injected_failures() {
        let store = MemoryRemoteStore::new();
        store.set_reachable(false);
        assert!(matches!(store.ping().await, Err(RemoteError::Connection(_))));
        assert!(store.connect().await.is_err());

        store.set_reachable(true);
        store.fail_key("bad").await;
        assert!(matches!(store.get("bad").await, Err(RemoteError::Command(_))));
        assert!(store.get("good").await.is_ok());

        store.clear_failures().await;
        assert!(store.get("bad").await.is_ok());
    }

    #[tokio::test]
    async fn test_info_reports_stats_and_memory() {
        let store = MemoryRemoteStore::new();
        store.connect().await.unwrap();
        store.config_set("maxmemory", "1kb").await.unwrap();
        store
            .set_with_ttl("k", "value", Duration::from_secs(60))
            .await
            .unwrap();
        store.get("k").await.unwrap();
        store.get("missing").await.unwrap();

        let info = store.info("").await.unwrap();
        assert!(info.contains("keyspace_hits:1"));
        assert!(info.contains("keyspace_misses:1"));
        assert!(info.contains("used_memory:6"));
        assert!(info.contains("maxmemory:1024"));
        assert!(info.contains("connected_clients:1"));
    }

    #[tokio::test]
    async fn test_del_counts_existing_keys() {
        let store = MemoryRemoteStore::new();
        store
            .mset_with_ttl(
                &[
                    ("a".to_string(), "1".to_string()),
                    ("b".to_string(), "2".to_string()),
                ],
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let removed = store
            .del(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store.is_empty().await);
    }
}
