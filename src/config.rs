//! Configuration Module
//!
//! Cache configuration with defaults and an environment loader for the binary.

use std::env;

/// Default TTL applied when `set` receives none: 30 minutes
pub const DEFAULT_TTL_MS: u64 = 30 * 60 * 1000;

/// Default persistence budget: 5 MiB
pub const DEFAULT_MAX_STORAGE_BYTES: usize = 5 * 1024 * 1024;

/// Storage key holding the whole snapshot
pub const DEFAULT_STORAGE_KEY: &str = "tagcache.entries";

/// Cache configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL in milliseconds for entries stored without an explicit TTL
    pub default_ttl_ms: u64,
    /// Emit per-operation debug diagnostics
    pub debug: bool,
    /// Largest snapshot (heuristic bytes) that will be written to storage
    pub max_storage_bytes: usize,
    /// Key under which the snapshot lives in the storage medium
    pub storage_key: String,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `TAGCACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 1800000)
    /// - `TAGCACHE_DEBUG` - `1`, `true`, `yes` or `on` enables diagnostics (default: off)
    /// - `TAGCACHE_MAX_STORAGE_BYTES` - Persistence budget (default: 5242880)
    /// - `TAGCACHE_STORAGE_KEY` - Snapshot key (default: `tagcache.entries`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl_ms: env::var("TAGCACHE_DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl_ms),
            debug: env::var("TAGCACHE_DEBUG")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.debug),
            max_storage_bytes: env::var("TAGCACHE_MAX_STORAGE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_storage_bytes),
            storage_key: env::var("TAGCACHE_STORAGE_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.storage_key),
        }
    }

    pub fn with_default_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.default_ttl_ms = ttl_ms;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_storage_bytes(mut self, bytes: usize) -> Self {
        self.max_storage_bytes = bytes;
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: DEFAULT_TTL_MS,
            debug: false,
            max_storage_bytes: DEFAULT_MAX_STORAGE_BYTES,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
