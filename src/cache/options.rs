//! Set Options Module
//!
//! Per-call options for `set`: key, optional TTL and tags.

// == Tags ==
/// Normalized tag list.
///
/// Converts from a single tag or a collection of tags, so callers can pass
/// either `"users"` or `["users", "vip"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Tags {
    fn from(tag: &str) -> Self {
        Self(vec![tag.to_string()])
    }
}

impl From<String> for Tags {
    fn from(tag: String) -> Self {
        Self(vec![tag])
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        Self(tags)
    }
}

impl From<Vec<&str>> for Tags {
    fn from(tags: Vec<&str>) -> Self {
        Self(tags.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Tags {
    fn from(tags: &[&str]) -> Self {
        Self(tags.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Tags {
    fn from(tags: [&str; N]) -> Self {
        Self(tags.iter().map(|t| t.to_string()).collect())
    }
}

// == Set Options ==
/// Options for a single `set` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOptions {
    /// Entry key
    pub key: String,
    /// TTL in milliseconds, `None` uses the configured default
    pub ttl_ms: Option<u64>,
    /// Tags for group invalidation
    pub tags: Tags,
}

impl SetOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl_ms: None,
            tags: Tags::default(),
        }
    }

    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    /// Replaces the tag list with `tags`.
    pub fn tag(mut self, tags: impl Into<Tags>) -> Self {
        self.tags = tags.into();
        self
    }
}

impl From<&str> for SetOptions {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SetOptions {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}
