//! The operation model: what producers hand to the queue.

/// Well-known metadata key under which the queue stores the document
/// reference in an add entry's sidecar.
pub const REFERENCE_KEY: &str = "commit.reference";

/// The two kinds of operation a producer can enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Add (or upsert) a document in the target.
    Add,
    /// Remove a document from the target by reference.
    Remove,
}

impl OpKind {
    /// Name of the queue subtree holding entries of this kind.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

/// Document metadata: an insertion-ordered mapping from string keys to
/// one or more string values.
///
/// Iteration order is insertion order, which is preserved through the
/// sidecar codec. Lookups are linear; metadata maps are small.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, Vec<String>)>,
}

impl Metadata {
    /// Creates an empty metadata map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the map holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Appends a value under `key`, creating the key if absent.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some((_, values)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            values.push(value);
        } else {
            self.entries.push((key, vec![value]));
        }
    }

    /// Replaces all values under `key` with a single value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some((_, values)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            values.clear();
            values.push(value);
        } else {
            self.entries.push((key, vec![value]));
        }
    }

    /// Returns the first value under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// Returns all values under `key`, if any.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Iterates over keys and their values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// An immutable description of one pending unit of work.
///
/// Built by the producer at enqueue time. Content is present only for
/// [`OpKind::Add`].
#[derive(Debug, Clone)]
pub struct Operation {
    kind: OpKind,
    reference: String,
    content: Option<Vec<u8>>,
    metadata: Metadata,
}

impl Operation {
    /// Creates an add operation.
    #[must_use]
    pub fn add(reference: impl Into<String>, content: Vec<u8>, metadata: Metadata) -> Self {
        Self {
            kind: OpKind::Add,
            reference: reference.into(),
            content: Some(content),
            metadata,
        }
    }

    /// Creates a remove operation.
    ///
    /// Metadata is accepted for interface symmetry but only the
    /// reference is persisted for removes.
    #[must_use]
    pub fn remove(reference: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            kind: OpKind::Remove,
            reference: reference.into(),
            content: None,
            metadata,
        }
    }

    /// The operation kind.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// The stable external document reference.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The document content, present only for adds.
    #[must_use]
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// The document metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_preserves_insertion_order() {
        let mut meta = Metadata::new();
        meta.insert("zulu", "1");
        meta.insert("alpha", "2");
        meta.insert("mike", "3");

        let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn metadata_multi_values() {
        let mut meta = Metadata::new();
        meta.insert("tag", "a");
        meta.insert("tag", "b");

        assert_eq!(meta.get("tag"), Some("a"));
        assert_eq!(meta.get_all("tag").unwrap(), &["a", "b"]);
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn metadata_set_replaces() {
        let mut meta = Metadata::new();
        meta.insert("k", "old1");
        meta.insert("k", "old2");
        meta.set("k", "new");

        assert_eq!(meta.get_all("k").unwrap(), &["new"]);
    }

    #[test]
    fn operation_accessors() {
        let op = Operation::add("doc1", b"hello".to_vec(), Metadata::new());
        assert_eq!(op.kind(), OpKind::Add);
        assert_eq!(op.reference(), "doc1");
        assert_eq!(op.content(), Some(b"hello".as_slice()));

        let op = Operation::remove("doc2", Metadata::new());
        assert_eq!(op.kind(), OpKind::Remove);
        assert!(op.content().is_none());
    }
}
