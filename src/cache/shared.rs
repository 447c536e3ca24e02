//! Shared Cache Handle
//!
//! Thread-safe wrapper for hosts that call the cache from several threads.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheStats, ExpiringTagCache, SetOptions};
use crate::storage::{MemoryStorage, Storage};

/// Cloneable handle to one [`ExpiringTagCache`] behind a single mutex.
///
/// The same lock covers the entry map and the write-through, so a snapshot
/// never sees a half-applied `set` or `remove`.
#[derive(Debug)]
pub struct SharedCache<T, S = MemoryStorage> {
    inner: Arc<Mutex<ExpiringTagCache<T, S>>>,
}

impl<T, S> Clone for SharedCache<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, S> SharedCache<T, S>
where
    T: Clone + Serialize + DeserializeOwned,
    S: Storage,
{
    pub fn new(cache: ExpiringTagCache<T, S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Locks the cache. A panic in another holder never makes it unusable.
    pub fn lock(&self) -> MutexGuard<'_, ExpiringTagCache<T, S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.lock().get(key)
    }

    pub fn set(&self, options: impl Into<SetOptions>, data: T) {
        self.lock().set(options, data);
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock().has(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key)
    }

    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        self.lock().invalidate_by_tag(tag)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Memoizes `produce` under `options.key`. The producer runs while the
    /// lock is held, so concurrent callers compute the value only once.
    pub fn get_or_insert_with<F>(&self, options: impl Into<SetOptions>, produce: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.lock().get_or_insert_with(options, produce)
    }

    pub fn try_get_or_insert_with<F, E>(
        &self,
        options: impl Into<SetOptions>,
        produce: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.lock().try_get_or_insert_with(options, produce)
    }

    pub fn ttl_remaining(&self, key: &str) -> Option<u64> {
        self.lock().ttl_remaining(key)
    }

    pub fn tags_of(&self, key: &str) -> Option<Vec<String>> {
        self.lock().tags_of(key)
    }

    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired()
    }

    pub fn get_keys(&self) -> Vec<String> {
        self.lock().get_keys()
    }

    pub fn size(&self) -> usize {
        self.lock().size()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.lock().size_in_bytes()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }
}
