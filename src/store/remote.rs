use crate::error::RemoteError;
use std::time::Duration;

/// Contract of the networked key-value store the cache fronts.
///
/// Keys reaching this trait are already namespaced. Every call may fail.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Establish (or re-establish) the connection
    async fn connect(&self) -> Result<(), RemoteError>;

    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), RemoteError>;

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, RemoteError>;

    async fn mset_with_ttl(
        &self,
        pairs: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), RemoteError>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> Result<u64, RemoteError>;

    async fn exists(&self, key: &str) -> Result<bool, RemoteError>;

    /// Keys matching a glob pattern (`*` and `?`)
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, RemoteError>;

    async fn ping(&self) -> Result<(), RemoteError>;

    /// Server information as newline-separated `key:value` lines
    async fn info(&self, section: &str) -> Result<String, RemoteError>;

    /// Set a server configuration parameter
    async fn config_set(&self, parameter: &str, value: &str) -> Result<(), RemoteError>;
}
