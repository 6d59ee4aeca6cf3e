//! Core type definitions for txdata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DATA_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of an aggregate root.
///
/// Data IDs are process-unique, monotonically increasing and never reused,
/// so iterating logs keyed by `DataId` follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataId(pub u64);

impl DataId {
    /// Creates a data ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn next() -> Self {
        Self(NEXT_DATA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{}", self.0)
    }
}

/// Identifier of a node (an embedded composite that tracks its attachment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Identifier of a transactionally logged field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub u64);

impl FieldId {
    pub(crate) fn next() -> Self {
        Self(NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field:{}", self.0)
    }
}

/// Where a node hangs in the object graph.
///
/// `owner` is the aggregate root that ultimately contains the node and
/// `position` is the index of the root's top-level field it lives under.
/// A detached node has no owner and position 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Attachment {
    /// Owning aggregate root.
    pub owner: Option<DataId>,
    /// Top-level field position within the owner.
    pub position: usize,
}

impl Attachment {
    /// The detached attachment.
    pub const DETACHED: Self = Self {
        owner: None,
        position: 0,
    };

    /// Creates an attachment to `owner` at `position`.
    #[must_use]
    pub const fn to(owner: DataId, position: usize) -> Self {
        Self {
            owner: Some(owner),
            position,
        }
    }

    /// Returns true if the node has no owner.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.owner.is_none()
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            Some(owner) => write!(f, "{owner}@{}", self.position),
            None => f.write_str("detached"),
        }
    }
}

/// Lifecycle state of an aggregate root.
///
/// State transitions:
/// - `None` → `Insert` (insert)
/// - `Insert` → `Update` (commit)
/// - `Update` → `Delete` (delete)
/// - `Insert` → `Delete` (delete)
/// - `Delete` → `None` (commit)
///
/// `Delete` is terminal within a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataState {
    /// Transient: never inserted, or deleted and committed.
    #[default]
    None,
    /// Pending insertion.
    Insert,
    /// Persisted; field mutations produce patches.
    Update,
    /// Pending deletion.
    Delete,
}

impl DataState {
    /// Returns true for states in which the aggregate exists in the store.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Insert | Self::Update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_ids_are_increasing() {
        let a = DataId::next();
        let b = DataId::next();
        assert!(a < b);
    }

    #[test]
    fn attachment_display() {
        assert_eq!(Attachment::to(DataId::new(3), 2).to_string(), "data:3@2");
        assert_eq!(Attachment::DETACHED.to_string(), "detached");
        assert!(Attachment::default().is_detached());
    }

    #[test]
    fn live_states() {
        assert!(DataState::Insert.is_live());
        assert!(DataState::Update.is_live());
        assert!(!DataState::Delete.is_live());
        assert!(!DataState::None.is_live());
    }
}
