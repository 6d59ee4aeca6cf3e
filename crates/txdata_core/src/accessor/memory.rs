//! In-memory accessor for testing.

use crate::accessor::{Accessor, RecordKey, WriteBatch};
use crate::error::{AccessorError, AccessorResult};
use crate::value::{Document, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// An in-memory document store.
///
/// Documents are kept per collection, keyed by identity. Inserts replace
/// whole documents, patches overwrite the named fields of an existing
/// document (`$set` semantics) and deletes remove the document. A patch for
/// a missing document is ignored.
///
/// # Thread Safety
///
/// This accessor is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use txdata_core::{Accessor, MemoryAccessor, Record, RecordKey, WriteBatch};
///
/// let store = MemoryAccessor::new();
/// let mut batch = WriteBatch::new();
/// batch.inserts.push(Record {
///     key: RecordKey::new("role", 1),
///     document: Default::default(),
/// });
/// store.write(batch).unwrap();
/// assert_eq!(store.len("role"), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryAccessor {
    collections: RwLock<HashMap<String, BTreeMap<KeyOrder, Document>>>,
    writes: AtomicUsize,
    closed: AtomicBool,
}

/// Map key that orders identities canonically.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyOrder(Value);

impl PartialOrd for KeyOrder {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyOrder {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp_canonical(&other.0)
    }
}

impl MemoryAccessor {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of a stored document.
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<Document> {
        self.collections
            .read()
            .get(&key.collection)
            .and_then(|docs| docs.get(&KeyOrder(key.id.clone())))
            .cloned()
    }

    /// Returns every document of a collection in identity order.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<(Value, Document)> {
        self.collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(k, d)| (k.0.clone(), d.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of documents in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns the number of batches applied so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Rejects all further writes.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Returns true if the store was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Accessor for MemoryAccessor {
    fn write(&self, batch: WriteBatch) -> AccessorResult<()> {
        if self.is_closed() {
            return Err(AccessorError::Closed);
        }

        let mut collections = self.collections.write();
        for record in batch.inserts {
            collections
                .entry(record.key.collection)
                .or_default()
                .insert(KeyOrder(record.key.id), record.document);
        }
        for (key, patch) in batch.patches {
            let existing = collections
                .get_mut(&key.collection)
                .and_then(|docs| docs.get_mut(&KeyOrder(key.id)));
            if let Some(document) = existing {
                document.extend(patch);
            }
        }
        for key in batch.deletes {
            if let Some(docs) = collections.get_mut(&key.collection) {
                docs.remove(&KeyOrder(key.id));
            }
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Record;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn memory_new_is_empty() {
        let store = MemoryAccessor::new();
        assert_eq!(store.len("role"), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn memory_insert_patch_delete() {
        let store = MemoryAccessor::new();
        let key = RecordKey::new("role", 7);

        let mut batch = WriteBatch::new();
        batch.inserts.push(Record {
            key: key.clone(),
            document: doc(&[("id", Value::from(7)), ("name", Value::from("a"))]),
        });
        store.write(batch).unwrap();

        let mut batch = WriteBatch::new();
        batch
            .patches
            .push((key.clone(), doc(&[("name", Value::from("b"))])));
        store.write(batch).unwrap();

        let stored = store.get(&key).unwrap();
        assert_eq!(stored.get("name"), Some(&Value::from("b")));
        assert_eq!(stored.get("id"), Some(&Value::from(7)));

        let mut batch = WriteBatch::new();
        batch.deletes.push(key.clone());
        store.write(batch).unwrap();
        assert!(store.get(&key).is_none());
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn memory_patch_of_missing_document_is_ignored() {
        let store = MemoryAccessor::new();
        let mut batch = WriteBatch::new();
        batch
            .patches
            .push((RecordKey::new("role", 1), doc(&[("name", Value::from("x"))])));
        store.write(batch).unwrap();
        assert_eq!(store.len("role"), 0);
    }

    #[test]
    fn memory_documents_are_ordered() {
        let store = MemoryAccessor::new();
        let mut batch = WriteBatch::new();
        for id in [3, 1, 2] {
            batch.inserts.push(Record {
                key: RecordKey::new("role", id),
                document: Document::new(),
            });
        }
        store.write(batch).unwrap();
        let ids: Vec<_> = store
            .documents("role")
            .into_iter()
            .map(|(id, _)| id.as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn memory_closed_rejects_writes() {
        let store = MemoryAccessor::new();
        store.close();
        assert_eq!(store.write(WriteBatch::new()), Err(AccessorError::Closed));
    }
}
