//! Snapshot Module
//!
//! Encoding, decoding and size accounting for the persisted entry set.
//!
//! A snapshot is one JSON blob: `{"version": 1, "entries": [...]}`. A bare
//! array of entries (the unversioned layout) is still accepted on load.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::cache::CacheEntry;
use crate::error::{PersistError, Result};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a, T> {
    version: u32,
    entries: Vec<&'a CacheEntry<T>>,
}

/// Entries are kept as raw JSON so one bad entry cannot sink the rest.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSnapshot {
    Versioned {
        #[allow(dead_code)]
        version: u32,
        entries: Vec<Value>,
    },
    Unversioned(Vec<Value>),
}

/// Result of reading a snapshot back.
#[derive(Debug)]
pub struct Decoded<T> {
    pub entries: Vec<CacheEntry<T>>,
    /// Entries that no longer deserialize, e.g. a `NaN` written out as `null`
    pub rejected: usize,
}

// == Encode ==
/// Serializes `entries` into a snapshot blob.
pub fn encode<'a, T, I>(entries: I) -> Result<String>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a CacheEntry<T>>,
{
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        entries: entries.into_iter().collect(),
    };
    serde_json::to_string(&snapshot).map_err(PersistError::Serialize)
}

// == Decode ==
/// Parses a snapshot blob, refusing versions newer than this crate writes.
///
/// Entries that fail to deserialize are skipped and counted in `rejected`.
pub fn decode<T: DeserializeOwned>(blob: &str) -> Result<Decoded<T>> {
    let value: Value = serde_json::from_str(blob).map_err(PersistError::Malformed)?;

    if let Some(version) = value.get("version").and_then(Value::as_u64) {
        if version > u64::from(SNAPSHOT_VERSION) {
            return Err(PersistError::UnsupportedVersion(
                u32::try_from(version).unwrap_or(u32::MAX),
            ));
        }
    }

    let snapshot: StoredSnapshot =
        serde_json::from_value(value).map_err(PersistError::Malformed)?;
    let raw = match snapshot {
        StoredSnapshot::Versioned { entries, .. } => entries,
        StoredSnapshot::Unversioned(entries) => entries,
    };

    let mut entries = Vec::with_capacity(raw.len());
    let mut rejected = 0;
    for value in raw {
        match serde_json::from_value::<CacheEntry<T>>(value) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                warn!(error = %err, "dropping unreadable snapshot entry");
                rejected += 1;
            }
        }
    }
    Ok(Decoded { entries, rejected })
}

// == Size Accounting ==
/// Approximate byte size of serialized text: two bytes per UTF-16 unit.
pub fn heuristic_size(serialized: &str) -> usize {
    serialized.encode_utf16().count() * 2
}

/// Approximate byte size of one serialized entry, `0` if it cannot be serialized.
pub fn entry_size<T: Serialize>(entry: &CacheEntry<T>) -> usize {
    serde_json::to_string(entry)
        .map(|json| heuristic_size(&json))
        .unwrap_or(0)
}

/// Fails with `BudgetExceeded` when `blob` is larger than `limit`.
pub fn check_budget(blob: &str, limit: usize) -> Result<usize> {
    let size = heuristic_size(blob);
    if size > limit {
        return Err(PersistError::BudgetExceeded { size, limit });
    }
    Ok(size)
}
