//! Tag Index Module
//!
//! Reverse index from tag to the keys carrying it, used by tag invalidation.

use std::collections::{HashMap, HashSet};

// == Tag Index ==
/// Tracks which keys carry each tag.
///
/// Must be updated on every insert and removal of the entry map so that
/// `keys_for` never names a key the store no longer holds.
#[derive(Debug, Default)]
pub struct TagIndex {
    keys_by_tag: HashMap<String, HashSet<String>>,
}

impl TagIndex {
    // == Constructor ==
    /// Creates a new empty tag index.
    pub fn new() -> Self {
        Self {
            keys_by_tag: HashMap::new(),
        }
    }

    // == Insert ==
    /// Records `key` under each of `tags`. Duplicate tags are harmless.
    pub fn insert(&mut self, key: &str, tags: &[String]) {
        for tag in tags {
            self.keys_by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    // == Remove ==
    /// Drops `key` from each of `tags`, pruning tags left without keys.
    pub fn remove(&mut self, key: &str, tags: &[String]) {
        for tag in tags {
            if let Some(keys) = self.keys_by_tag.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.keys_by_tag.remove(tag);
                }
            }
        }
    }

    // == Keys For ==
    /// Returns the keys currently carrying `tag`.
    pub fn keys_for(&self, tag: &str) -> Vec<String> {
        self.keys_by_tag
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.keys_by_tag.clear();
    }

    // == Length ==
    /// Returns the number of distinct tags tracked.
    pub fn len(&self) -> usize {
        self.keys_by_tag.len()
    }
}
