//! Shadow logs held by a transaction scope.

use crate::accessor::Accessor;
use crate::dirty::DirtySet;
use crate::entity::{Data, NodeCell};
use crate::field::{FieldCell, FieldValue};
use crate::types::{Attachment, DataId, DataState, FieldId, NodeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Pending lifecycle state of an aggregate root.
///
/// Entries are copied into the innermost scope before they are modified, so
/// an enclosing scope's entry is never changed by a nested scope that may
/// still fail.
#[derive(Clone)]
pub(crate) struct DataLog {
    pub(crate) data: Data,
    pub(crate) accessor: Option<Arc<dyn Accessor>>,
    pub(crate) state: DataState,
    pub(crate) dirty: DirtySet,
}

impl DataLog {
    pub(crate) fn new(data: Data, accessor: Option<Arc<dyn Accessor>>, state: DataState) -> Self {
        Self {
            data,
            accessor,
            state,
            dirty: DirtySet::new(),
        }
    }
}

/// Pending attachment of a node.
pub(crate) struct NodeLog {
    pub(crate) node: Arc<NodeCell>,
    pub(crate) at: Attachment,
}

/// Pending value of a field.
pub(crate) struct FieldLog {
    pub(crate) cell: Arc<FieldCell>,
    pub(crate) value: FieldValue,
}

/// When a listener runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    /// After the outermost transaction committed.
    Succeeded,
    /// After the outermost transaction failed.
    Failed,
    /// After the outermost transaction ended either way.
    Finished,
}

impl When {
    pub(crate) fn matches(self, outcome: When) -> bool {
        self == When::Finished || self == outcome
    }
}

/// A deferred action registered on a transaction.
pub(crate) struct Listener {
    pub(crate) task: Box<dyn FnOnce()>,
    pub(crate) when: When,
}

/// Everything one scope has written.
#[derive(Default)]
pub(crate) struct Logs {
    pub(crate) data: BTreeMap<DataId, DataLog>,
    pub(crate) nodes: HashMap<NodeId, NodeLog>,
    pub(crate) fields: HashMap<FieldId, FieldLog>,
    pub(crate) listeners: Vec<Listener>,
}

impl Logs {
    /// Folds a successful nested scope into this one. Inner entries win.
    pub(crate) fn merge(&mut self, inner: Logs) {
        self.data.extend(inner.data);
        self.nodes.extend(inner.nodes);
        self.fields.extend(inner.fields);
        self.listeners.extend(inner.listeners);
    }

    /// Keeps the listeners of a failed nested scope.
    ///
    /// The enclosing outcome is not known yet, so failure listeners become
    /// finish listeners and success listeners are dropped.
    pub(crate) fn adopt_failed(&mut self, inner: Logs) {
        self.listeners
            .extend(inner.listeners.into_iter().filter_map(|mut listener| {
                match listener.when {
                    When::Succeeded => None,
                    When::Failed => {
                        listener.when = When::Finished;
                        Some(listener)
                    }
                    When::Finished => Some(listener),
                }
            }));
    }
}

/// Frozen logs of an enclosing scope.
pub(crate) struct Savepoint {
    pub(crate) logs: Logs,
    pub(crate) failed: bool,
}
