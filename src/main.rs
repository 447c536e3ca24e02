//! Tagcache demo binary
//!
//! Opens a file-backed cache, runs a short workload and reports statistics.
//! Running it twice in a row shows entries surviving the restart.

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tagcache::{CacheConfig, ExpiringTagCache, FileStorage, SetOptions};

/// Directory used when `TAGCACHE_DATA_DIR` is unset
const DEFAULT_DATA_DIR: &str = ".tagcache";

fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: default_ttl_ms={}, max_storage_bytes={}, debug={}, storage_key={}",
        config.default_ttl_ms, config.max_storage_bytes, config.debug, config.storage_key
    );

    let data_dir = env::var("TAGCACHE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
    let storage = FileStorage::new(&data_dir)
        .with_context(|| format!("Failed to open storage at {}", data_dir.display()))?;

    let mut cache: ExpiringTagCache<Value, FileStorage> =
        ExpiringTagCache::with_storage(config, storage);
    let root = cache
        .storage()
        .map(|storage| storage.root().display().to_string())
        .unwrap_or_default();
    info!(entries = cache.size(), %root, "Cache opened");

    let profile = cache.get_or_insert_with(SetOptions::new("user_42").tag("users"), || {
        json!({ "name": "Alice" })
    });
    info!(%profile, "Fetched user_42");

    cache.set(
        SetOptions::new("user_43").tag(["users", "vip"]),
        json!({ "name": "Bob" }),
    );
    cache.set(
        SetOptions::new("report_daily").ttl_ms(60_000).tag("reports"),
        json!({ "rows": 128 }),
    );

    let removed = cache.invalidate_by_tag("vip");
    info!(removed, "Invalidated vip entries");

    let stats = cache.stats();
    info!(
        "Cache stats: entries={}, bytes~{}, hits={}, misses={}, hit_rate={:.2}, persisted={}, skipped={}, failed={}",
        stats.total_entries,
        cache.size_in_bytes(),
        stats.hits,
        stats.misses,
        stats.hit_rate(),
        stats.persist_writes,
        stats.persist_skips,
        stats.persist_failures
    );

    Ok(())
}
