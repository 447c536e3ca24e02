//! Cache Statistics Module
//!
//! Tracks hits, misses, expiry evictions and persistence outcomes.

use serde::Serialize;

// == Cache Stats ==
/// Diagnostic counters for a cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a live entry
    pub hits: u64,
    /// Reads that found nothing or an expired entry
    pub misses: u64,
    /// Entries dropped because they were found expired
    pub expired: u64,
    /// Entries dropped by tag invalidation
    pub invalidated: u64,
    /// Snapshots successfully written to storage
    pub persist_writes: u64,
    /// Snapshots skipped for exceeding the byte budget
    pub persist_skips: u64,
    /// Snapshot reads or writes that failed
    pub persist_failures: u64,
    /// Current number of in-memory entries
    pub total_entries: usize,
    /// Distinct tags carried by in-memory entries
    pub total_tags: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expired(&mut self, count: usize) {
        self.expired += count as u64;
    }

    pub fn record_invalidated(&mut self, count: usize) {
        self.invalidated += count as u64;
    }

    pub fn record_persist_write(&mut self) {
        self.persist_writes += 1;
    }

    pub fn record_persist_skip(&mut self) {
        self.persist_skips += 1;
    }

    pub fn record_persist_failure(&mut self) {
        self.persist_failures += 1;
    }

    // == Update Entry Count ==
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }

    pub fn set_total_tags(&mut self, count: usize) {
        self.total_tags = count;
    }
}
