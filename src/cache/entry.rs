//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with expiry and tags.

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// Represents a single cache entry with its payload and metadata.
///
/// Field names match the persisted snapshot layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Caller-supplied key
    pub key: String,
    /// The stored payload
    pub data: T,
    /// Expiration timestamp (Unix milliseconds)
    pub expiry: i64,
    /// Labels used for group invalidation
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation timestamp (Unix milliseconds)
    pub created: i64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl_ms` after `now`.
    pub fn new(key: String, data: T, now: i64, ttl_ms: u64, tags: Vec<String>) -> Self {
        let ttl = i64::try_from(ttl_ms).unwrap_or(i64::MAX);
        Self {
            key,
            data,
            expiry: now.saturating_add(ttl),
            tags,
            created: now,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is live only while `expiry > now`, so it is already expired
    /// at the exact expiry instant.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiry <= now
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self, now: i64) -> u64 {
        u64::try_from(self.expiry.saturating_sub(now)).unwrap_or(0)
    }
}
