//! Storage Module
//!
//! Synchronous string key/value media the cache persists its snapshot into.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;

/// A synchronous key/value storage medium.
///
/// Mirrors the browser `localStorage` surface: string keys, string values,
/// every call completes before returning.
pub trait Storage {
    /// Reads the value under `key`, `None` if absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
