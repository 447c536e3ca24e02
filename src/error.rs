//! Error types for the cache
//!
//! None of these ever reach a cache caller. Storage and persistence failures
//! are caught at the store boundary, logged, and only degrade durability.

use thiserror::Error;

// == Storage Error Enum ==
/// Failure reported by a storage medium.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage is disabled or otherwise unreachable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Write rejected because the medium is full
    #[error("Storage quota exceeded: needed {needed} bytes, limit {limit} bytes")]
    QuotaExceeded { needed: usize, limit: usize },

    /// Underlying filesystem error
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// == Persist Error Enum ==
/// Failure while loading or writing the persisted snapshot.
#[derive(Error, Debug)]
pub enum PersistError {
    /// Entries could not be serialized
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Persisted blob is not a valid snapshot
    #[error("Malformed snapshot: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Snapshot written by a newer format
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    /// Snapshot larger than the configured byte budget
    #[error("Snapshot of {size} bytes exceeds budget of {limit} bytes")]
    BudgetExceeded { size: usize, limit: usize },

    /// Storage medium refused the read or write
    #[error(transparent)]
    Storage(#[from] StorageError),
}

// == Result Type Alias ==
/// Convenience Result type for persistence helpers.
pub type Result<T> = std::result::Result<T, PersistError>;
