use predictive_cache::metrics::parse_info;
use predictive_cache::{
    CacheConfig, CacheStats, CachedStore, MemoryRemoteStore, RemoteStats, RemoteStore,
};
use serde_json::json;

async fn cache() -> (MemoryRemoteStore, CachedStore<MemoryRemoteStore>) {
    let remote = MemoryRemoteStore::new();
    let cache = CachedStore::new(
        remote.clone(),
        CacheConfig {
            enable_warmup: false,
            ..Default::default()
        },
    );
    cache.initialize().await.unwrap();
    (remote, cache)
}

#[tokio::test]
async fn test_empty_stats_have_zero_ratios() {
    let (_remote, cache) = cache().await;
    let stats = cache.stats().await;

    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.hit_ratio, 0.0);
    assert_eq!(stats.miss_ratio, 0.0);
    assert_eq!(stats.total_keys, 0);
    assert!(stats.connected);
}

#[tokio::test]
async fn test_ratios_cover_every_lookup_outcome() {
    let (remote, cache) = cache().await;

    for _ in 0..6 {
        cache.set("hot", json!(1), None).await;
    }
    cache.set("plain", json!(2), None).await;

    // remote hit
    cache.get("plain").await;
    // predictive hit after the remote copy disappears
    remote.del(&["cache:hot".to_string()]).await.unwrap();
    cache.get("hot").await;
    // miss
    cache.get("nothing").await;
    cache.get("nothing").await;

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.predictive_hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hit_ratio, 0.5);
    assert_eq!(stats.miss_ratio, 0.5);
    assert_eq!(stats.predictive_hit_ratio, 0.25);
    assert!((stats.hit_ratio + stats.miss_ratio - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_remote_stats_from_info_text() {
    let info = parse_info(
        "# Stats\r\nkeyspace_hits:42\r\nkeyspace_misses:8\r\n\r\n# Memory\r\nused_memory:1024\r\nmaxmemory:4096\r\n# Clients\r\nconnected_clients:3\r\n",
    );
    let stats = RemoteStats::from_info(&info);

    assert_eq!(stats.keyspace_hits, 42);
    assert_eq!(stats.keyspace_misses, 8);
    assert_eq!(stats.connected_clients, 3);
    assert_eq!(stats.memory_efficiency, Some(75.0));
}

#[test]
fn test_unlimited_memory_has_no_efficiency() {
    let info = parse_info("used_memory:1024\nmaxmemory:0\n");
    let stats = RemoteStats::from_info(&info);
    assert_eq!(stats.max_memory, 0);
    assert_eq!(stats.memory_efficiency, None);
}

#[tokio::test]
async fn test_stats_serialize_for_reporting() {
    let (_remote, cache) = cache().await;
    cache.set("a", json!(1), None).await;
    cache.get("a").await;

    let stats = cache.stats().await;
    let encoded = serde_json::to_value(&stats).unwrap();
    assert_eq!(encoded["hits"], json!(1));
    assert!(encoded["remote"]["max_memory"].as_u64().unwrap() > 0);

    let decoded: CacheStats = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded.hits, stats.hits);
    assert_eq!(decoded.total_keys, 1);
}
