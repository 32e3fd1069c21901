//! # predictive-cache
//!
//! **A caching facade that learns which keys matter.**
//!
//! `predictive-cache` sits in front of a remote key-value store. Every read
//! and write feeds a per-key access pattern; keys that are read often and
//! recently are promoted into an in-process predictive store, so a remote
//! miss can still be answered. A background warmup task pulls the
//! highest-priority keys forward on a schedule, and when the remote store is
//! unreachable the cache keeps working from a bounded local fallback store.
//!
//! ## Tiers
//!
//! | Tier | Consulted when | Fed by |
//! |------|----------------|--------|
//! | **Remote** | connected | `set` / `mset` |
//! | **Predictive** | remote miss | high-priority writes, warmup |
//! | **Fallback** | remote error or disconnected | writes during an outage |
//!
//! ## Quick Start
//!
//! ```rust
//! use predictive_cache::{CacheConfig, CachedStore, MemoryRemoteStore};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig {
//!     key_prefix: "app:".to_string(),
//!     ..Default::default()
//! };
//! let cache = CachedStore::new(MemoryRemoteStore::new(), config);
//! cache.initialize().await?;
//!
//! cache.set("user:1", json!({"name": "ada"}), Some(Duration::from_secs(60))).await;
//! assert_eq!(cache.get("user:1").await, Some(json!({"name": "ada"})));
//!
//! let stats = cache.stats().await;
//! println!("Hit ratio: {:.1}%", stats.hit_ratio * 100.0);
//!
//! cache.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Priority
//!
//! Each key scores in `[0, 1]`:
//! `0.4 * frequency + 0.3 * recency + 0.3 * count`, with frequency saturating
//! at 10 accesses/s, recency decaying over 24 hours and count saturating at
//! 100 accesses. Keys with more than 5 accesses and a frequency above 0.1/s
//! are promoted on write. When the predictive store passes its soft cap, the
//! lowest-scoring fifth is evicted in one pass.
//!
//! ## Plugging in a store
//!
//! Implement [`RemoteStore`] for your client. [`MemoryRemoteStore`] is an
//! in-process implementation with outage and failure injection for tests.

pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod scoring;
pub mod store;
pub mod tracker;
pub mod warming;

// Re-export commonly used types
pub use cache::fallback::FallbackStore;
pub use cache::predictive::{PredictiveEntry, PredictiveStore};
pub use cache::Tier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, EvictionPolicy, RetryConfig};
pub use error::{CacheError, RemoteError};
pub use metrics::{CacheCounters, CacheStats, RemoteStats};
pub use scoring::priority_score;
pub use store::adapter::PrimaryStoreAdapter;
pub use store::cached::CachedStore;
pub use store::memory::MemoryRemoteStore;
pub use store::remote::RemoteStore;
pub use tracker::{AccessKind, AccessPattern, AccessTracker};
pub use warming::{WarmupConfig, WarmupHandle, WarmupReport, WarmupScheduler};
