//! Cache Module
//!
//! Provides in-memory caching with lazy TTL expiration, tag invalidation and
//! write-through persistence.

mod clock;
mod entry;
mod options;
pub mod persist;
mod shared;
mod stats;
mod store;
mod tags;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use options::{SetOptions, Tags};
pub use shared::SharedCache;
pub use stats::CacheStats;
pub use store::ExpiringTagCache;
pub use tags::TagIndex;
