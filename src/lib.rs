//! Tagcache - An expiring key/value cache
//!
//! Entries carry a TTL and a set of tags. Expiry is checked lazily on read,
//! tags allow bulk invalidation, and every mutation is written through to an
//! optional synchronous storage medium on a best-effort basis.

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;

pub use cache::{ExpiringTagCache, SetOptions, SharedCache};
pub use config::CacheConfig;
pub use storage::{FileStorage, MemoryStorage, Storage};
