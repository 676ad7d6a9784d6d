//! Identifier and tag model (spec §4.1).
//!
//! An [`Id`] is an immutable `(name, sorted tag set)` value. Two identifiers
//! that are structurally equal always hash the same and always resolve to
//! the same meter instance within a [`crate::registry::Registry`].

use std::{
    borrow::Cow,
    hash::{Hash, Hasher},
    sync::OnceLock,
};

/// A single `(key, value)` tag pair.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Tag {
    key: Cow<'static, str>,
    value: Cow<'static, str>,
}

impl Tag {
    /// Creates a new tag from a key and value.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        Tag { key: key.into(), value: value.into() }
    }

    /// The tag's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The tag's value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.value.hash(state);
    }
}

/// An immutable metric identifier: a name plus a canonical (sorted,
/// deduplicated) set of tags.
///
/// Identifiers are `Send + Sync` and safe to share across threads without
/// synchronization. The hash is computed once and cached.
#[derive(Clone, Debug)]
pub struct Id {
    name: Cow<'static, str>,
    tags: Vec<Tag>,
    hash: OnceLock<u64>,
}

impl Id {
    /// Constructs a tagless identifier.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Id { name: name.into(), tags: Vec::new(), hash: OnceLock::new() }
    }

    /// Returns a new identifier with `key=value` merged in, overriding any
    /// existing tag with the same key. The tag set remains sorted by key.
    pub fn with_tag(&self, key: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        self.with_tags(std::iter::once(Tag::new(key, value)))
    }

    /// Returns a new identifier with every tag in `tags` merged in. Later
    /// entries win on key collision, matching `withTags` in spec §4.1.
    pub fn with_tags(&self, tags: impl IntoIterator<Item = Tag>) -> Self {
        let mut merged = self.tags.clone();
        for tag in tags {
            match merged.iter_mut().find(|t| t.key == tag.key) {
                Some(existing) => existing.value = tag.value,
                None => merged.push(tag),
            }
        }
        merged.sort_by(|a, b| a.key.cmp(&b.key));
        Id { name: self.name.clone(), tags: merged, hash: OnceLock::new() }
    }

    /// The metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical (sorted, deduplicated) tag set.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Looks up a tag's value by key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.key == key).map(|t| t.value())
    }

    fn compute_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        for tag in &self.tags {
            tag.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn cached_hash(&self) -> u64 {
        *self.hash.get_or_init(|| self.compute_hash())
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.tags == other.tags
    }
}

impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.cached_hash());
    }
}

impl From<&'static str> for Id {
    fn from(name: &'static str) -> Self {
        Id::new(name)
    }
}

impl From<String> for Id {
    fn from(name: String) -> Self {
        Id::new(name)
    }
}
