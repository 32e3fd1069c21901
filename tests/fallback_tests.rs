use predictive_cache::{CacheConfig, CachedStore, ManualClock, MemoryRemoteStore, RetryConfig, Tier};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config() -> CacheConfig {
    CacheConfig {
        key_prefix: "fb:".to_string(),
        enable_warmup: false,
        retry: RetryConfig {
            max_attempts: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn build(config: CacheConfig) -> Fixture {
    let clock = ManualClock::default();
    let remote = MemoryRemoteStore::with_clock(Arc::new(clock.clone()));
    let cache = CachedStore::with_clock(remote.clone(), config, Arc::new(clock.clone()));
    (clock, remote, cache)
}

type Fixture = (ManualClock, MemoryRemoteStore, CachedStore<MemoryRemoteStore>);

async fn disconnected(config: CacheConfig) -> Fixture {
    let (clock, remote, cache) = build(config);
    remote.set_reachable(false);
    assert!(cache.initialize().await.is_err());
    (clock, remote, cache)
}

#[tokio::test(start_paused = true)]
async fn test_initialize_gives_up_after_backoff() {
    let (_clock, remote, cache) = build(CacheConfig {
        retry: RetryConfig::default(),
        ..config()
    });
    remote.set_reachable(false);

    let started = tokio::time::Instant::now();
    assert!(cache.initialize().await.is_err());
    // 100ms + 200ms + ... + 900ms between ten attempts
    assert_eq!(started.elapsed(), Duration::from_millis(4500));

    // Still usable.
    assert_eq!(cache.set("k", json!(1), None).await, Tier::Fallback);
    assert_eq!(cache.get("k").await, Some(json!(1)));
}

#[tokio::test]
async fn test_outage_mid_session_keeps_serving() {
    let (_clock, remote, cache) = build(config());
    cache.initialize().await.unwrap();

    assert_eq!(cache.set("before", json!("remote"), None).await, Tier::Remote);

    remote.set_reachable(false);
    assert_eq!(cache.set("during", json!("local"), None).await, Tier::Fallback);
    assert_eq!(cache.get("during").await, Some(json!("local")));
    // Written before the outage, so only the remote store had it.
    assert_eq!(cache.get("before").await, None);
    assert!(cache.is_connected());
    assert!(!cache.health_check().await);

    remote.set_reachable(true);
    assert_eq!(cache.get("before").await, Some(json!("remote")));
}

#[tokio::test]
async fn test_fallback_batch_operations() {
    let (_clock, _remote, cache) = disconnected(config()).await;

    let tier = cache
        .mset(
            vec![("a".to_string(), json!(1)), ("b".to_string(), json!(2))],
            Some(Duration::from_secs(30)),
        )
        .await;
    assert_eq!(tier, Tier::Fallback);

    let values = cache
        .mget(&["b".to_string(), "c".to_string(), "a".to_string()])
        .await;
    assert_eq!(values, vec![Some(json!(2)), None, Some(json!(1))]);

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    // Fallback traffic is not tracked.
    assert_eq!(stats.tracked_patterns, 0);
}

#[tokio::test]
async fn test_fallback_delete_and_clear() {
    let (_clock, _remote, cache) = disconnected(config()).await;

    cache.set("a", json!(1), None).await;
    cache.set("b", json!(2), None).await;

    assert!(cache.delete("a").await);
    assert!(!cache.delete("a").await);
    assert_eq!(cache.get("a").await, None);

    assert_eq!(cache.clear().await, 0);
    assert_eq!(cache.get("b").await, None);
}

#[tokio::test]
async fn test_stats_while_disconnected() {
    let (_clock, _remote, cache) = disconnected(config()).await;

    cache.set("a", json!(1), None).await;
    cache.set("b", json!(2), None).await;
    cache.get("a").await;

    let stats = cache.stats().await;
    assert!(!stats.connected);
    assert!(stats.remote.is_none());
    assert_eq!(stats.total_keys, 2);
    assert_eq!(stats.fallback_entries, 2);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn test_fallback_capacity_evicts_least_recent() {
    let (_clock, _remote, cache) = disconnected(CacheConfig {
        fallback_capacity: 2,
        ..config()
    })
    .await;

    cache.set("a", json!(1), None).await;
    cache.set("b", json!(2), None).await;
    cache.get("a").await;
    cache.set("c", json!(3), None).await;

    assert_eq!(cache.get("a").await, Some(json!(1)));
    assert_eq!(cache.get("b").await, None);
    assert_eq!(cache.get("c").await, Some(json!(3)));
}

#[tokio::test]
async fn test_fallback_entry_expires_at_ttl() {
    let (clock, _remote, cache) = disconnected(config()).await;

    cache.set("k", json!("v"), Some(Duration::from_secs(10))).await;
    clock.advance(Duration::from_secs(9));
    assert!(cache.get("k").await.is_some());
    clock.advance(Duration::from_secs(1));
    assert!(cache.get("k").await.is_none());
}

#[tokio::test]
async fn test_extreme_ttls_during_outage() {
    let (clock, _remote, cache) = disconnected(config()).await;

    cache.set("forever", json!("v"), Some(Duration::MAX)).await;
    cache.set("zero", json!("v"), Some(Duration::ZERO)).await;
    assert_eq!(cache.get("forever").await, Some(json!("v")));
    assert_eq!(cache.get("zero").await, Some(json!("v")));

    // A zero TTL falls back to the one-hour default.
    clock.advance(Duration::from_secs(3600));
    assert_eq!(cache.get("zero").await, None);
    assert_eq!(cache.get("forever").await, Some(json!("v")));
}
