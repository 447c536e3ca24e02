//! Cache Store Module
//!
//! Main cache engine: HashMap storage with lazy TTL expiry, tag invalidation
//! and best-effort write-through persistence.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::persist;
use crate::cache::{CacheEntry, CacheStats, Clock, SetOptions, SystemClock, TagIndex};
use crate::config::CacheConfig;
use crate::error::PersistError;
use crate::storage::{MemoryStorage, Storage};

// == Expiring Tag Cache ==
/// Key/value store with per-entry TTL, tag invalidation and optional
/// write-through persistence to a [`Storage`] medium.
///
/// No operation fails observably. Storage problems are logged and only cost
/// durability; the in-memory map stays the source of truth.
#[derive(Debug)]
pub struct ExpiringTagCache<T, S = MemoryStorage> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<T>>,
    /// Tag -> keys index
    tags: TagIndex,
    /// Durable medium, `None` keeps the cache purely in memory
    storage: Option<S>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    stats: CacheStats,
}

impl<T> ExpiringTagCache<T, MemoryStorage>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Creates a cache without persistence.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(config, None, Arc::new(SystemClock))
    }
}

impl<T, S> ExpiringTagCache<T, S>
where
    T: Clone + Serialize + DeserializeOwned,
    S: Storage,
{
    // == Constructor ==
    /// Creates a cache and rehydrates it from `storage` when one is given.
    ///
    /// Entries already expired at load time are dropped; if any were, the
    /// cleaned set is written back once.
    pub fn new(config: CacheConfig, storage: Option<S>, clock: Arc<dyn Clock>) -> Self {
        let mut cache = Self {
            entries: HashMap::new(),
            tags: TagIndex::new(),
            storage,
            clock,
            config,
            stats: CacheStats::new(),
        };
        cache.load();
        cache
    }

    /// Creates a persistent cache on the system clock.
    pub fn with_storage(config: CacheConfig, storage: S) -> Self {
        Self::new(config, Some(storage), Arc::new(SystemClock))
    }

    // == Get ==
    /// Returns a copy of the live value under `key`.
    ///
    /// An expired entry is evicted (and the eviction persisted) and counts
    /// as a miss.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let data = self.live_entry(key).map(|entry| entry.data.clone());
        match data {
            Some(data) => {
                self.stats.record_hit();
                if self.config.debug {
                    debug!(key, "cache hit");
                }
                Some(data)
            }
            None => {
                self.stats.record_miss();
                if self.config.debug {
                    debug!(key, "cache miss");
                }
                None
            }
        }
    }

    // == Set ==
    /// Stores `data`, replacing any entry under the same key.
    ///
    /// The TTL falls back to the configured default. An empty key is ignored.
    pub fn set(&mut self, options: impl Into<SetOptions>, data: T) {
        let SetOptions { key, ttl_ms, tags } = options.into();
        if key.is_empty() {
            if self.config.debug {
                debug!("ignoring set with empty key");
            }
            return;
        }

        let ttl_ms = ttl_ms.unwrap_or(self.config.default_ttl_ms);
        let entry = CacheEntry::new(key, data, self.clock.now_ms(), ttl_ms, tags.into_vec());
        if self.config.debug {
            debug!(key = %entry.key, ttl_ms, tags = ?entry.tags, "cache set");
        }
        self.insert_entry(entry);
        self.stats.set_total_entries(self.entries.len());
        self.write_through();
    }

    // == Has ==
    /// Checks for a live entry, evicting it if it turns out expired.
    pub fn has(&mut self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    // == Remove ==
    /// Removes `key`. Returns whether an entry was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        if self.remove_entry(key).is_none() {
            return false;
        }
        if self.config.debug {
            debug!(key, "cache remove");
        }
        self.stats.set_total_entries(self.entries.len());
        self.write_through();
        true
    }

    // == Invalidate By Tag ==
    /// Removes every entry carrying `tag`, with a single write-through.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_by_tag(&mut self, tag: &str) -> usize {
        let mut removed = 0;
        for key in self.tags.keys_for(tag) {
            if self.remove_entry(&key).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            if self.config.debug {
                debug!(tag, removed, "cache invalidate by tag");
            }
            self.stats.record_invalidated(removed);
            self.stats.set_total_entries(self.entries.len());
            self.write_through();
        }
        removed
    }

    // == Clear ==
    /// Removes everything and persists the empty snapshot.
    pub fn clear(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        self.tags.clear();
        self.stats.set_total_entries(0);
        if self.config.debug {
            debug!(count, "cache clear");
        }
        self.write_through();
    }

    // == Get Or Insert ==
    /// Returns the live value under `options.key`, or computes, stores and
    /// returns it.
    pub fn get_or_insert_with<F>(&mut self, options: impl Into<SetOptions>, produce: F) -> T
    where
        F: FnOnce() -> T,
    {
        let options = options.into();
        if let Some(data) = self.get(&options.key) {
            return data;
        }
        let data = produce();
        self.set(options, data.clone());
        data
    }

    /// Fallible variant of [`get_or_insert_with`](Self::get_or_insert_with).
    /// A producer error is returned as-is and nothing is stored.
    pub fn try_get_or_insert_with<F, E>(
        &mut self,
        options: impl Into<SetOptions>,
        produce: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let options = options.into();
        if let Some(data) = self.get(&options.key) {
            return Ok(data);
        }
        let data = produce()?;
        self.set(options, data.clone());
        Ok(data)
    }

    // == Introspection ==
    /// Remaining TTL in milliseconds of a live entry.
    pub fn ttl_remaining(&mut self, key: &str) -> Option<u64> {
        let now = self.clock.now_ms();
        self.live_entry(key).map(|entry| entry.ttl_remaining_ms(now))
    }

    /// Tags of a live entry.
    pub fn tags_of(&mut self, key: &str) -> Option<Vec<String>> {
        self.live_entry(key).map(|entry| entry.tags.clone())
    }

    /// Snapshot of all in-memory keys, including expired ones not yet swept.
    pub fn get_keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of in-memory entries, including expired ones not yet swept.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate serialized size of every in-memory entry.
    pub fn size_in_bytes(&self) -> usize {
        self.entries.values().map(persist::entry_size).sum()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats.set_total_tags(self.tags.len());
        stats
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn storage(&self) -> Option<&S> {
        self.storage.as_ref()
    }

    // == Purge Expired ==
    /// Removes all expired entries now, with one write-through if any went.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired_keys: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();

        let count = expired_keys.len();
        if count == 0 {
            return 0;
        }

        for key in &expired_keys {
            self.remove_entry(key);
        }
        if self.config.debug {
            debug!(count, "purged expired entries");
        }
        self.stats.record_expired(count);
        self.stats.set_total_entries(self.entries.len());
        self.write_through();
        count
    }

    // == Internals ==

    /// Looks up a live entry, lazily evicting it if expired.
    fn live_entry(&mut self, key: &str) -> Option<&CacheEntry<T>> {
        if key.is_empty() {
            return None;
        }
        let now = self.clock.now_ms();
        if self.entries.get(key)?.is_expired_at(now) {
            self.remove_entry(key);
            if self.config.debug {
                debug!(key, "evicted expired entry");
            }
            self.stats.record_expired(1);
            self.stats.set_total_entries(self.entries.len());
            self.write_through();
            return None;
        }
        self.entries.get(key)
    }

    fn insert_entry(&mut self, entry: CacheEntry<T>) {
        self.remove_entry(&entry.key);
        self.tags.insert(&entry.key, &entry.tags);
        self.entries.insert(entry.key.clone(), entry);
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.tags.remove(key, &entry.tags);
        Some(entry)
    }

    /// Reads the persisted snapshot once at construction.
    fn load(&mut self) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };

        let loaded = storage
            .get_item(&self.config.storage_key)
            .map_err(PersistError::from)
            .and_then(|blob| blob.map(|blob| persist::decode::<T>(&blob)).transpose());

        let decoded = match loaded {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, key = %self.config.storage_key, "ignoring persisted cache");
                self.stats.record_persist_failure();
                return;
            }
        };

        let now = self.clock.now_ms();
        let total = decoded.entries.len() + decoded.rejected;
        let mut expired = 0;
        let mut invalid = decoded.rejected;
        for entry in decoded.entries {
            if entry.key.is_empty() {
                invalid += 1;
            } else if entry.is_expired_at(now) {
                expired += 1;
            } else {
                self.insert_entry(entry);
            }
        }
        self.stats.record_expired(expired);
        self.stats.set_total_entries(self.entries.len());
        info!(
            loaded = self.entries.len(),
            expired, invalid, "rehydrated cache from storage"
        );

        // Duplicate keys also shrink the set, so compare against the total
        if self.entries.len() < total {
            self.write_through();
        }
    }

    /// Writes the live entry set to storage, best-effort.
    fn write_through(&mut self) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };

        let now = self.clock.now_ms();
        let limit = self.config.max_storage_bytes;
        let result = persist::encode(
            self.entries
                .values()
                .filter(|entry| !entry.is_expired_at(now)),
        )
        .and_then(|blob| persist::check_budget(&blob, limit).map(|_| blob))
        .and_then(|blob| {
            storage
                .set_item(&self.config.storage_key, &blob)
                .map_err(PersistError::from)
        });

        match result {
            Ok(()) => self.stats.record_persist_write(),
            Err(err @ PersistError::BudgetExceeded { .. }) => {
                warn!(error = %err, "skipping cache persistence");
                self.stats.record_persist_skip();
            }
            Err(err) => {
                warn!(error = %err, "cache persistence failed");
                self.stats.record_persist_failure();
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::cache::persist::SNAPSHOT_VERSION;

    const START: i64 = 1_700_000_000_000;

    fn config() -> CacheConfig {
        CacheConfig::default().with_debug(true)
    }

    fn memory_cache(clock: &ManualClock) -> ExpiringTagCache<String> {
        ExpiringTagCache::new(config(), None, Arc::new(clock.clone()))
    }

    fn persistent_cache(
        clock: &ManualClock,
        storage: &MemoryStorage,
    ) -> ExpiringTagCache<String, MemoryStorage> {
        ExpiringTagCache::new(config(), Some(storage.clone()), Arc::new(clock.clone()))
    }

    fn sorted(mut keys: Vec<String>) -> Vec<String> {
        keys.sort();
        keys
    }

    fn persisted_keys(storage: &MemoryStorage) -> Vec<String> {
        let blob = storage.get_item("tagcache.entries").unwrap().unwrap();
        let decoded = persist::decode::<String>(&blob).unwrap();
        sorted(decoded.entries.into_iter().map(|e| e.key).collect())
    }

    #[test]
    fn test_store_new() {
        let cache: ExpiringTagCache<String> = ExpiringTagCache::in_memory(CacheConfig::default());
        assert_eq!(cache.size(), 0);
        assert!(cache.is_empty());
        assert!(cache.storage().is_none());
        assert_eq!(cache.config().default_ttl_ms, 30 * 60 * 1000);
    }

    #[test]
    fn test_store_set_and_get() {
        let mut cache = memory_cache(&ManualClock::new(START));

        cache.set("key1", "value1".to_string());

        assert_eq!(cache.get("key1").as_deref(), Some("value1"));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut cache = memory_cache(&ManualClock::new(START));
        assert!(cache.get("nonexistent").is_none());
        assert!(!cache.has("nonexistent"));
    }

    #[test]
    fn test_default_ttl_applied() {
        let clock = ManualClock::new(START);
        let mut cache = memory_cache(&clock);

        cache.set("key1", "value1".to_string());
        assert_eq!(cache.ttl_remaining("key1"), Some(30 * 60 * 1000));

        clock.advance(30 * 60 * 1000);
        assert!(cache.get("key1").is_none());
    }

    #[test]
    fn test_store_ttl_expiration() {
        let clock = ManualClock::new(START);
        let mut cache = memory_cache(&clock);

        cache.set(SetOptions::new("key1").ttl_ms(1000), "value1".to_string());
        assert!(cache.get("key1").is_some());

        clock.advance(999);
        assert!(cache.has("key1"));

        clock.advance(1);
        assert!(cache.get("key1").is_none());
        assert_eq!(cache.size(), 0, "Expired entry should be evicted on read");
    }

    #[test]
    fn test_expired_entry_lingers_until_read() {
        let clock = ManualClock::new(START);
        let mut cache = memory_cache(&clock);

        cache.set(SetOptions::new("stale").ttl_ms(10), "v".to_string());
        clock.advance(50);

        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get_keys(), vec!["stale"]);

        assert!(!cache.has("stale"));
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_store_overwrite_replaces_tags() {
        let mut cache = memory_cache(&ManualClock::new(START));

        cache.set(SetOptions::new("a").tag(["x", "y"]), "v1".to_string());
        cache.set(SetOptions::new("a").tag("z"), "v2".to_string());

        assert_eq!(cache.get("a").as_deref(), Some("v2"));
        assert_eq!(cache.tags_of("a"), Some(vec!["z".to_string()]));
        assert_eq!(cache.size(), 1);

        // Old tags no longer reach the entry
        assert_eq!(cache.invalidate_by_tag("x"), 0);
        assert_eq!(cache.invalidate_by_tag("z"), 1);
    }

    #[test]
    fn test_store_remove() {
        let mut cache = memory_cache(&ManualClock::new(START));

        cache.set("key1", "value1".to_string());
        assert!(cache.remove("key1"));

        assert!(cache.is_empty());
        assert!(cache.get("key1").is_none());
    }

    #[test]
    fn test_store_remove_nonexistent() {
        let mut cache = memory_cache(&ManualClock::new(START));
        cache.set("key1", "value1".to_string());

        assert!(!cache.remove("nonexistent"));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_invalidate_by_tag() {
        let mut cache = memory_cache(&ManualClock::new(START));

        cache.set(SetOptions::new("k1").tag("x"), "1".to_string());
        cache.set(SetOptions::new("k2").tag(["x", "y"]), "2".to_string());
        cache.set(SetOptions::new("k3").tag("y"), "3".to_string());

        assert_eq!(cache.stats().total_tags, 2);
        assert_eq!(cache.invalidate_by_tag("x"), 2);

        assert!(!cache.has("k1"));
        assert!(!cache.has("k2"));
        assert!(cache.has("k3"));
        assert_eq!(cache.stats().invalidated, 2);
        assert_eq!(cache.stats().total_tags, 1);
    }

    #[test]
    fn test_invalidate_by_tag_is_case_sensitive() {
        let mut cache = memory_cache(&ManualClock::new(START));

        cache.set(SetOptions::new("k1").tag("Users"), "1".to_string());

        assert_eq!(cache.invalidate_by_tag("users"), 0);
        assert!(cache.has("k1"));
    }

    #[test]
    fn test_clear() {
        let mut cache = memory_cache(&ManualClock::new(START));

        cache.set(SetOptions::new("k1").tag("x"), "1".to_string());
        cache.set("k2", "2".to_string());
        cache.clear();

        assert_eq!(cache.size(), 0);
        assert!(cache.get_keys().is_empty());
        assert_eq!(cache.invalidate_by_tag("x"), 0);
    }

    #[test]
    fn test_empty_key_policy() {
        let storage = MemoryStorage::new();
        let mut cache = persistent_cache(&ManualClock::new(START), &storage);

        cache.set("", "ignored".to_string());

        assert_eq!(cache.size(), 0);
        assert!(cache.get("").is_none());
        assert!(!cache.has(""));
        assert!(!cache.remove(""));
        assert!(storage.is_empty(), "Ignored set should not persist");
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut cache = memory_cache(&ManualClock::new(START));
        let mut calls = 0;

        let first = cache.get_or_insert_with("k", || {
            calls += 1;
            "computed".to_string()
        });
        let second = cache.get_or_insert_with("k", || {
            calls += 1;
            "recomputed".to_string()
        });

        assert_eq!(first, "computed");
        assert_eq!(second, "computed");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_try_get_or_insert_with_error_stores_nothing() {
        let mut cache = memory_cache(&ManualClock::new(START));

        let result: Result<String, &str> = cache.try_get_or_insert_with("k", || Err("boom"));

        assert_eq!(result, Err("boom"));
        assert!(!cache.has("k"));

        let result: Result<String, &str> =
            cache.try_get_or_insert_with(SetOptions::new("k").tag("t"), || Ok("ok".to_string()));
        assert_eq!(result.as_deref(), Ok("ok"));
        assert_eq!(cache.tags_of("k"), Some(vec!["t".to_string()]));
    }

    #[test]
    fn test_purge_expired() {
        let clock = ManualClock::new(START);
        let mut cache = memory_cache(&clock);

        cache.set(SetOptions::new("short").ttl_ms(10).tag("t"), "1".to_string());
        cache.set(SetOptions::new("long").ttl_ms(10_000).tag("t"), "2".to_string());
        clock.advance(100);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get_keys(), vec!["long"]);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_size_in_bytes() {
        let mut cache = memory_cache(&ManualClock::new(START));
        assert_eq!(cache.size_in_bytes(), 0);

        cache.set(SetOptions::new("a").tag("t"), "hello".to_string());
        let expected = {
            let entry = CacheEntry::new(
                "a".to_string(),
                "hello".to_string(),
                START,
                30 * 60 * 1000,
                vec!["t".to_string()],
            );
            serde_json::to_string(&entry).unwrap().len() * 2
        };
        assert_eq!(cache.size_in_bytes(), expected);
    }

    #[test]
    fn test_stats() {
        let mut cache = memory_cache(&ManualClock::new(START));

        cache.set("key1", "value1".to_string());
        cache.get("key1"); // hit
        cache.get("nonexistent"); // miss

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    // == Persistence ==

    #[test]
    fn test_write_through_on_set_and_remove() {
        let storage = MemoryStorage::new();
        let mut cache = persistent_cache(&ManualClock::new(START), &storage);

        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        assert_eq!(persisted_keys(&storage), vec!["a", "b"]);

        cache.remove("a");
        assert_eq!(persisted_keys(&storage), vec!["b"]);
        assert_eq!(cache.stats().persist_writes, 3);
    }

    #[test]
    fn test_remove_absent_key_does_not_write() {
        let storage = MemoryStorage::new();
        let mut cache = persistent_cache(&ManualClock::new(START), &storage);

        cache.remove("missing");

        assert!(storage.is_empty());
        assert_eq!(cache.stats().persist_writes, 0);
    }

    #[test]
    fn test_invalidate_writes_once() {
        let storage = MemoryStorage::new();
        let mut cache = persistent_cache(&ManualClock::new(START), &storage);

        cache.set(SetOptions::new("k1").tag("x"), "1".to_string());
        cache.set(SetOptions::new("k2").tag("x"), "2".to_string());
        cache.set(SetOptions::new("k3").tag("y"), "3".to_string());
        let writes = cache.stats().persist_writes;

        cache.invalidate_by_tag("x");
        assert_eq!(cache.stats().persist_writes, writes + 1);
        assert_eq!(persisted_keys(&storage), vec!["k3"]);

        cache.invalidate_by_tag("nothing");
        assert_eq!(cache.stats().persist_writes, writes + 1);
    }

    #[test]
    fn test_snapshot_excludes_expired_entries() {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        let mut cache = persistent_cache(&clock, &storage);

        cache.set(SetOptions::new("short").ttl_ms(10), "1".to_string());
        clock.advance(20);
        cache.set("fresh", "2".to_string());

        // "short" still in memory but not in the snapshot
        assert_eq!(cache.size(), 2);
        assert_eq!(persisted_keys(&storage), vec!["fresh"]);
    }

    #[test]
    fn test_lazy_eviction_persists() {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        let mut cache = persistent_cache(&clock, &storage);

        cache.set(SetOptions::new("short").ttl_ms(10), "1".to_string());
        let writes = cache.stats().persist_writes;
        clock.advance(20);

        assert!(cache.get("short").is_none());
        assert_eq!(cache.stats().persist_writes, writes + 1);
        assert!(persisted_keys(&storage).is_empty());
    }

    #[test]
    fn test_lazy_eviction_in_has_persists() {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        let mut cache = persistent_cache(&clock, &storage);

        cache.set(SetOptions::new("short").ttl_ms(10), "1".to_string());
        cache.set("long", "2".to_string());
        let writes = cache.stats().persist_writes;
        clock.advance(20);

        assert!(!cache.has("short"));
        assert_eq!(cache.stats().persist_writes, writes + 1);
        assert_eq!(persisted_keys(&storage), vec!["long"]);

        // Already gone, so a second check writes nothing
        assert!(!cache.has("short"));
        assert_eq!(cache.stats().persist_writes, writes + 1);
    }

    #[test]
    fn test_clear_writes_empty_snapshot() {
        let storage = MemoryStorage::new();
        let mut cache = persistent_cache(&ManualClock::new(START), &storage);

        cache.set("a", "1".to_string());
        cache.clear();

        let blob = storage.get_item("tagcache.entries").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(json["version"], SNAPSHOT_VERSION);
        assert_eq!(json["entries"], serde_json::json!([]));
    }

    #[test]
    fn test_reload_from_storage() {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        {
            let mut cache = persistent_cache(&clock, &storage);
            cache.set(SetOptions::new("a").tag(["x", "y"]), "1".to_string());
            cache.set(SetOptions::new("b").ttl_ms(100), "2".to_string());
        }

        clock.advance(500);
        let mut reloaded = persistent_cache(&clock, &storage);

        assert_eq!(reloaded.size(), 1);
        assert_eq!(reloaded.get("a").as_deref(), Some("1"));
        assert!(reloaded.get("b").is_none());
        assert_eq!(reloaded.invalidate_by_tag("y"), 1);
    }

    #[test]
    fn test_load_sweep_rewrites_snapshot() {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        let seeded = format!(
            r#"[{{"key":"live","data":"1","expiry":{},"tags":[],"created":{}}},
                {{"key":"dead","data":"2","expiry":{},"tags":[],"created":{}}}]"#,
            START + 1000,
            START,
            START - 1,
            START - 1000
        );
        storage.set_item("tagcache.entries", &seeded).unwrap();

        let mut cache = persistent_cache(&clock, &storage);

        assert_eq!(cache.size(), 1);
        assert!(cache.get("dead").is_none());
        assert_eq!(persisted_keys(&storage), vec!["live"]);
        assert_eq!(cache.stats().persist_writes, 1);
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_load_drops_empty_keys_without_counting_expiry() {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        let seeded = format!(
            r#"[{{"key":"","data":"1","expiry":{},"tags":[],"created":{}}},
                {{"key":"live","data":"2","expiry":{},"tags":[],"created":{}}}]"#,
            START + 1000,
            START,
            START + 1000,
            START
        );
        storage.set_item("tagcache.entries", &seeded).unwrap();

        let cache = persistent_cache(&clock, &storage);

        assert_eq!(cache.get_keys(), vec!["live"]);
        assert_eq!(cache.stats().expired, 0);
        assert_eq!(persisted_keys(&storage), vec!["live"]);
        assert_eq!(cache.stats().persist_writes, 1);
    }

    #[test]
    fn test_unreadable_entry_does_not_lose_the_rest() {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        {
            let mut cache: ExpiringTagCache<f64, MemoryStorage> =
                ExpiringTagCache::new(config(), Some(storage.clone()), Arc::new(clock.clone()));
            cache.set("a", 1.5);
            cache.set("b", 2.5);
            cache.set("nan", f64::NAN);
            assert_eq!(cache.size(), 3);
        }

        let mut reloaded: ExpiringTagCache<f64, MemoryStorage> =
            ExpiringTagCache::new(config(), Some(storage.clone()), Arc::new(clock.clone()));

        assert_eq!(reloaded.size(), 2);
        assert_eq!(reloaded.get("a"), Some(1.5));
        assert_eq!(reloaded.get("b"), Some(2.5));
        assert!(reloaded.get("nan").is_none());
        assert_eq!(reloaded.stats().persist_failures, 0);

        // The cleaned set was written back without the bad entry
        let blob = storage.get_item("tagcache.entries").unwrap().unwrap();
        let decoded = persist::decode::<f64>(&blob).unwrap();
        assert_eq!(decoded.rejected, 0);
        assert_eq!(decoded.entries.len(), 2);
    }

    #[test]
    fn test_load_without_stale_entries_does_not_write() {
        let clock = ManualClock::new(START);
        let storage = MemoryStorage::new();
        {
            let mut cache = persistent_cache(&clock, &storage);
            cache.set("a", "1".to_string());
        }

        let cache = persistent_cache(&clock, &storage);
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.stats().persist_writes, 0);
    }

    #[test]
    fn test_malformed_snapshot_starts_empty() {
        let storage = MemoryStorage::new();
        storage.set_item("tagcache.entries", "{definitely not json").unwrap();

        let mut cache = persistent_cache(&ManualClock::new(START), &storage);

        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().persist_failures, 1);

        // Still fully usable, and the next write replaces the bad blob
        cache.set("a", "1".to_string());
        assert_eq!(persisted_keys(&storage), vec!["a"]);
    }

    #[test]
    fn test_newer_snapshot_version_is_ignored() {
        let storage = MemoryStorage::new();
        storage
            .set_item("tagcache.entries", r#"{"version": 99, "entries": []}"#)
            .unwrap();

        let cache = persistent_cache(&ManualClock::new(START), &storage);

        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().persist_failures, 1);
    }

    #[test]
    fn test_budget_skip_keeps_memory_and_storage_intact() {
        let storage = MemoryStorage::new();
        storage.set_item("tagcache.entries", "previous").unwrap();

        let mut cache: ExpiringTagCache<String, MemoryStorage> = ExpiringTagCache::new(
            config().with_max_storage_bytes(16),
            Some(storage.clone()),
            Arc::new(ManualClock::new(START)),
        );
        // "previous" is malformed, so it was ignored on load
        cache.set("big", "x".repeat(100));

        assert_eq!(cache.get("big"), Some("x".repeat(100)));
        assert_eq!(
            storage.get_item("tagcache.entries").unwrap().as_deref(),
            Some("previous")
        );
        assert_eq!(cache.stats().persist_skips, 1);
    }

    #[test]
    fn test_storage_failures_are_absorbed() {
        let mut cache: ExpiringTagCache<String, MemoryStorage> = ExpiringTagCache::new(
            config(),
            Some(MemoryStorage::disabled()),
            Arc::new(ManualClock::new(START)),
        );

        cache.set("a", "1".to_string());
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        cache.clear();

        // One failed load plus two failed writes
        assert_eq!(cache.stats().persist_failures, 3);
    }

    #[test]
    fn test_quota_exceeded_is_absorbed() {
        let storage = MemoryStorage::with_quota(10);
        let mut cache = persistent_cache(&ManualClock::new(START), &storage);

        cache.set("a", "1".to_string());

        assert!(cache.has("a"));
        assert!(storage.is_empty());
        assert_eq!(cache.stats().persist_failures, 1);
    }
}
