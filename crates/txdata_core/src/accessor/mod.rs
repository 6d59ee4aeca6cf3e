//! The durable-store boundary.
//!
//! At commit every aggregate root with a pending lifecycle change is turned
//! into a write intent and the intents are grouped per accessor. Each
//! accessor receives at most one [`WriteBatch`] per commit.

mod dispatch;
mod memory;

pub(crate) use dispatch::Dispatcher;
pub use memory::MemoryAccessor;

use crate::error::AccessorResult;
use crate::value::{Document, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A durable-store sink consumed at commit.
///
/// # Invariants
///
/// - `write` is called at most once per accessor per commit
/// - Errors and panics are caught and logged by the engine; they never undo
///   the in-memory commit and are never seen by the committing caller
/// - Retrying failed writes is the accessor's responsibility
///
/// # Implementors
///
/// - [`MemoryAccessor`] - A reference document store, for testing
pub trait Accessor: Send + Sync {
    /// Applies a batch of inserts, deletes and patches.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot apply the batch. The engine
    /// logs the error and moves on.
    fn write(&self, batch: WriteBatch) -> AccessorResult<()>;
}

/// Identity of a persisted aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Collection (data schema) name.
    pub collection: String,
    /// Value of the identity field.
    pub id: Value,
}

impl RecordKey {
    /// Creates a record key.
    pub fn new(collection: impl Into<String>, id: impl Into<Value>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.collection, self.id)
    }
}

/// A whole aggregate to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record identity.
    pub key: RecordKey,
    /// Full rendered document.
    pub document: Document,
}

/// The writes one accessor receives from one commit.
///
/// Documents are rendered when the batch is built, so a batch never
/// observes mutations made after its commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    /// Aggregates inserted in the transaction.
    pub inserts: Vec<Record>,
    /// Aggregates deleted in the transaction.
    pub deletes: Vec<RecordKey>,
    /// Field-name to value patches for updated aggregates.
    pub patches: Vec<(RecordKey, Document)>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the batch carries no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty() && self.patches.is_empty()
    }

    /// Returns the total number of writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserts.len() + self.deletes.len() + self.patches.len()
    }

    pub(crate) fn push(&mut self, intent: WriteIntent) {
        match intent {
            WriteIntent::Insert(record) => self.inserts.push(record),
            WriteIntent::Delete(key) => self.deletes.push(key),
            WriteIntent::Patch(key, patch) => self.patches.push((key, patch)),
        }
    }
}

/// What one aggregate contributes to its accessor's batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteIntent {
    Insert(Record),
    Delete(RecordKey),
    Patch(RecordKey, Document),
}

/// Groups write intents by accessor identity, keeping first-seen order.
#[derive(Default)]
pub(crate) struct BatchSet {
    batches: Vec<(Arc<dyn Accessor>, WriteBatch)>,
}

impl BatchSet {
    pub(crate) fn add(&mut self, accessor: &Arc<dyn Accessor>, intent: WriteIntent) {
        let slot = self
            .batches
            .iter()
            .position(|(a, _)| same_accessor(a, accessor));
        let index = match slot {
            Some(index) => index,
            None => {
                self.batches.push((Arc::clone(accessor), WriteBatch::new()));
                self.batches.len() - 1
            }
        };
        self.batches[index].1.push(intent);
    }

    pub(crate) fn len(&self) -> usize {
        self.batches.len()
    }

    pub(crate) fn into_batches(self) -> Vec<(Arc<dyn Accessor>, WriteBatch)> {
        self.batches
    }
}

/// Compares accessors by the object they point to.
pub(crate) fn same_accessor(a: &Arc<dyn Accessor>, b: &Arc<dyn Accessor>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_set_groups_by_accessor() {
        let a: Arc<dyn Accessor> = Arc::new(MemoryAccessor::new());
        let b: Arc<dyn Accessor> = Arc::new(MemoryAccessor::new());
        let mut set = BatchSet::default();
        set.add(&a, WriteIntent::Delete(RecordKey::new("role", 1)));
        set.add(&b, WriteIntent::Delete(RecordKey::new("role", 2)));
        set.add(&a, WriteIntent::Delete(RecordKey::new("role", 3)));

        let batches = set.into_batches();
        assert_eq!(batches.len(), 2);
        assert!(same_accessor(&batches[0].0, &a));
        assert_eq!(batches[0].1.deletes.len(), 2);
        assert_eq!(batches[1].1.len(), 1);
    }

    #[test]
    fn empty_batch() {
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
