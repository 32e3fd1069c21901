use predictive_cache::{CacheConfig, CachedStore, MemoryRemoteStore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct Profile {
    name: String,
    visits: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = CacheConfig {
        key_prefix: "demo:".to_string(),
        ..Default::default()
    };
    let cache = CachedStore::new(MemoryRemoteStore::new(), config);
    cache.initialize().await?;

    // Plain JSON values
    cache
        .set("greeting", json!("Hello, cached world!"), Some(Duration::from_secs(60)))
        .await;
    println!("greeting = {:?}", cache.get("greeting").await);

    // Typed values
    let profile = Profile {
        name: "ada".to_string(),
        visits: 3,
    };
    cache.set_as("profile:ada", &profile, None).await?;
    let loaded: Option<Profile> = cache.get_as("profile:ada").await?;
    println!("profile = {:?}", loaded);

    // A key written often enough is promoted to the predictive store
    for visits in 0..6 {
        cache.set("counter", json!(visits), None).await;
    }
    if let Some(entry) = cache.predictive_entry("counter").await {
        println!(
            "counter promoted with priority {:.3} after {} accesses",
            entry.priority, entry.pattern.access_count
        );
    }

    let report = cache.warm_now().await;
    println!(
        "warmup: {} candidates, {} promoted, {} already cached",
        report.candidates, report.promoted, report.already_cached
    );

    let stats = cache.stats().await;
    println!("\nCache statistics:");
    println!("  Hits: {}", stats.hits);
    println!("  Misses: {}", stats.misses);
    println!("  Predictive hits: {}", stats.predictive_hits);
    println!("  Hit ratio: {:.1}%", stats.hit_ratio * 100.0);
    println!("  Remote keys: {}", stats.total_keys);
    println!("  Predictive entries: {}", stats.predictive_entries);
    if let Some(remote) = &stats.remote {
        println!(
            "  Remote memory: {} / {} bytes",
            remote.used_memory, remote.max_memory
        );
    }

    cache.close().await;
    Ok(())
}
