use predictive_cache::{CacheConfig, CachedStore, MemoryRemoteStore, RetryConfig, Tier};
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let remote = MemoryRemoteStore::new();
    let config = CacheConfig {
        key_prefix: "outage:".to_string(),
        retry: RetryConfig {
            max_attempts: 3,
            ..Default::default()
        },
        ..Default::default()
    };
    let cache = CachedStore::new(remote.clone(), config);
    cache.initialize().await?;

    cache.set("before", json!("stored remotely"), None).await;

    println!("Remote store goes away...");
    remote.set_reachable(false);

    let tier = cache
        .set("during", json!({"queued": true}), Some(Duration::from_secs(30)))
        .await;
    assert_eq!(tier, Tier::Fallback);
    println!("write during outage landed in {:?}", tier);
    println!("during = {:?}", cache.get("during").await);
    println!("before = {:?}", cache.get("before").await);
    println!("healthy: {}", cache.health_check().await);

    println!("\nRemote store is back");
    remote.set_reachable(true);
    println!("before = {:?}", cache.get("before").await);
    println!("healthy: {}", cache.health_check().await);

    // A cache that never connects still serves from the fallback store
    let offline_remote = MemoryRemoteStore::new();
    offline_remote.set_reachable(false);
    let offline = CachedStore::new(
        offline_remote,
        CacheConfig {
            retry: RetryConfig {
                max_attempts: 2,
                ..Default::default()
            },
            ..Default::default()
        },
    );
    if let Err(e) = offline.initialize().await {
        println!("\nOffline cache failed to connect: {}", e);
    }
    offline.set("local", json!(42), None).await;
    println!("local = {:?}", offline.get("local").await);

    let stats = offline.stats().await;
    println!(
        "offline stats: connected={}, keys={}, hits={}",
        stats.connected, stats.total_keys, stats.hits
    );

    cache.close().await;
    offline.close().await;
    Ok(())
}
