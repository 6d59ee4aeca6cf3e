//! The per-thread transaction and its savepoint stack.

use crate::accessor::BatchSet;
use crate::config::SAVEPOINT_CAPACITY;
use crate::entity::{Data, NodeCell};
use crate::error::{TxError, TxResult};
use crate::field::{FieldCell, FieldValue};
use crate::store::StoreInner;
use crate::transaction::state::{DataLog, FieldLog, Listener, Logs, NodeLog, Savepoint, When};
use crate::types::{Attachment, DataId, DataState, FieldId, NodeId};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// One logical unit of work on one thread.
///
/// The transaction owns the logs of the innermost scope. Each nested scope
/// freezes the enclosing logs into a savepoint; lookups walk from the
/// innermost scope outward and the first hit wins.
pub(crate) struct Transaction {
    store: Arc<StoreInner>,
    failed: bool,
    logs: Logs,
    savepoints: Vec<Savepoint>,
}

impl Transaction {
    pub(crate) fn new(store: Arc<StoreInner>) -> Self {
        Self {
            store,
            failed: false,
            logs: Logs::default(),
            savepoints: Vec::with_capacity(SAVEPOINT_CAPACITY),
        }
    }

    /// Current depth; the outermost scope is depth 1.
    pub(crate) fn depth(&self) -> usize {
        self.savepoints.len() + 1
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.failed
    }

    pub(crate) fn fail(&mut self) {
        self.failed = true;
    }

    pub(crate) fn belongs_to(&self, store: &Arc<StoreInner>) -> bool {
        Arc::ptr_eq(&self.store, store)
    }

    /// The current logs followed by each savepoint, innermost first.
    fn chain(&self) -> impl Iterator<Item = &Logs> {
        std::iter::once(&self.logs).chain(self.savepoints.iter().rev().map(|s| &s.logs))
    }

    pub(crate) fn data_log(&self, id: DataId) -> Option<&DataLog> {
        self.chain().find_map(|logs| logs.data.get(&id))
    }

    /// Returns the entry visible just before `log` was written.
    pub(crate) fn prev_data_log(&self, id: DataId, log: &DataLog) -> Option<&DataLog> {
        let mut found = false;
        for logs in self.chain() {
            if let Some(entry) = logs.data.get(&id) {
                if found {
                    return Some(entry);
                }
                found = std::ptr::eq(entry, log);
            }
        }
        None
    }

    pub(crate) fn set_data_log(&mut self, log: DataLog) {
        self.logs.data.insert(log.data.id(), log);
    }

    pub(crate) fn field_log(&self, id: FieldId) -> Option<&FieldValue> {
        self.chain().find_map(|logs| logs.fields.get(&id)).map(|log| &log.value)
    }

    /// Records a field's new shadow and dirties its owner.
    pub(crate) fn set_field_log(&mut self, cell: &Arc<FieldCell>, value: FieldValue, at: Attachment) {
        self.logs.fields.insert(
            cell.id,
            FieldLog {
                cell: Arc::clone(cell),
                value,
            },
        );
        if let Some(owner) = at.owner {
            if !cell.def.ignore {
                self.mark_dirty(owner, at.position);
            }
        }
    }

    /// Sets a dirty bit on the owner's update log, creating one with the
    /// owner's own accessor if the owner is persisted and has no log yet.
    fn mark_dirty(&mut self, owner: DataId, position: usize) {
        if let Some(log) = self.logs.data.get_mut(&owner) {
            if log.state == DataState::Update {
                log.dirty.insert(position);
            }
            return;
        }

        let inherited = self
            .savepoints
            .iter()
            .rev()
            .find_map(|s| s.logs.data.get(&owner))
            .cloned();
        let mut log = match inherited {
            Some(log) => log,
            None => match Data::lookup(owner) {
                Some(data) if data.committed_state() == DataState::Update => {
                    let accessor = data.accessor();
                    DataLog::new(data, accessor, DataState::Update)
                }
                _ => return,
            },
        };
        if log.state == DataState::Update {
            log.dirty.insert(position);
            self.logs.data.insert(owner, log);
        }
    }

    pub(crate) fn node_log(&self, id: NodeId) -> Option<Attachment> {
        self.chain().find_map(|logs| logs.nodes.get(&id)).map(|log| log.at)
    }

    pub(crate) fn set_node_log(&mut self, node: &Arc<NodeCell>, at: Attachment) {
        self.logs.nodes.insert(
            node.id,
            NodeLog {
                node: Arc::clone(node),
                at,
            },
        );
    }

    pub(crate) fn add_listener(&mut self, task: Box<dyn FnOnce()>, when: When) {
        self.logs.listeners.push(Listener { task, when });
    }

    /// Opens a nested scope.
    pub(crate) fn save(&mut self, limit: usize) -> TxResult<()> {
        let limit = limit.min(SAVEPOINT_CAPACITY);
        let depth = self.depth();
        if depth >= limit {
            return Err(TxError::NestingTooDeep {
                depth: depth + 1,
                limit,
            });
        }

        self.savepoints.push(Savepoint {
            logs: mem::take(&mut self.logs),
            failed: mem::replace(&mut self.failed, false),
        });
        debug!(depth = self.depth(), "savepoint pushed");
        Ok(())
    }

    /// Closes the innermost nested scope.
    pub(crate) fn restore(&mut self) {
        let Some(savepoint) = self.savepoints.pop() else {
            return;
        };
        let inner = mem::replace(&mut self.logs, savepoint.logs);
        let failed = mem::replace(&mut self.failed, savepoint.failed);
        if failed {
            self.logs.adopt_failed(inner);
        } else {
            self.logs.merge(inner);
        }
        debug!(depth = self.depth(), failed, "savepoint popped");
    }

    /// Fails and closes every open level, leaving only the outermost.
    pub(crate) fn abandon(mut self) -> Self {
        while !self.savepoints.is_empty() {
            self.failed = true;
            self.restore();
        }
        self.failed = true;
        self
    }

    /// Ends the outermost scope: commits unless failed, then runs listeners.
    pub(crate) fn finish(mut self) {
        let listeners = mem::take(&mut self.logs.listeners);
        let outcome = if self.failed {
            When::Failed
        } else {
            self.commit();
            When::Succeeded
        };

        for listener in listeners {
            if !listener.when.matches(outcome) {
                continue;
            }
            if panic::catch_unwind(AssertUnwindSafe(listener.task)).is_err() {
                error!(when = ?listener.when, "transaction listener panicked");
            }
        }
    }

    fn commit(&mut self) {
        let logs = mem::take(&mut self.logs);
        let (nodes, fields, data) = (logs.nodes.len(), logs.fields.len(), logs.data.len());

        for log in logs.nodes.into_values() {
            log.node.commit(log.at);
        }
        for log in logs.fields.into_values() {
            log.cell.commit(log.value);
        }

        let mut batches = BatchSet::default();
        for log in logs.data.into_values() {
            let intent = log.data.commit(&log);
            match log.state {
                DataState::Insert => self.store.register(&log.data),
                DataState::Delete => self.store.unregister(log.data.id()),
                DataState::Update | DataState::None => {}
            }
            if let (Some(intent), Some(accessor)) = (intent, log.accessor.as_ref()) {
                batches.add(accessor, intent);
            }
        }

        debug!(nodes, fields, data, accessors = batches.len(), "transaction committed");
        for (accessor, batch) in batches.into_batches() {
            self.store.dispatch(accessor, batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn transaction() -> Transaction {
        Transaction::new(Store::default().inner().clone())
    }

    #[test]
    fn depth_tracks_savepoints() {
        let mut tx = transaction();
        assert_eq!(tx.depth(), 1);
        tx.save(8).unwrap();
        assert_eq!(tx.depth(), 2);
        tx.restore();
        assert_eq!(tx.depth(), 1);
    }

    #[test]
    fn save_rejects_beyond_limit() {
        let mut tx = transaction();
        for _ in 1..8 {
            tx.save(8).unwrap();
        }
        assert_eq!(tx.depth(), 8);
        assert_eq!(
            tx.save(8),
            Err(TxError::NestingTooDeep { depth: 9, limit: 8 })
        );
        assert_eq!(tx.depth(), 8);
    }

    #[test]
    fn limit_never_exceeds_capacity() {
        let mut tx = transaction();
        for _ in 1..SAVEPOINT_CAPACITY {
            tx.save(100).unwrap();
        }
        assert!(tx.save(100).is_err());
    }

    #[test]
    fn failed_flag_is_scoped() {
        let mut tx = transaction();
        tx.save(8).unwrap();
        tx.fail();
        assert!(tx.is_failed());
        tx.restore();
        assert!(!tx.is_failed());
    }

    #[test]
    fn node_logs_resolve_innermost_first() {
        let mut tx = transaction();
        let node = Arc::new(NodeCell::new(Attachment::DETACHED));
        let outer = Attachment::to(DataId::new(1), 0);
        let inner = Attachment::to(DataId::new(2), 1);

        tx.set_node_log(&node, outer);
        tx.save(8).unwrap();
        assert_eq!(tx.node_log(node.id), Some(outer));
        tx.set_node_log(&node, inner);
        assert_eq!(tx.node_log(node.id), Some(inner));

        tx.fail();
        tx.restore();
        assert_eq!(tx.node_log(node.id), Some(outer));
    }
}
