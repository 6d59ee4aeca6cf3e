//! Attachment tracking for embedded composites.

use crate::entity::Bean;
use crate::field::{FieldCell, FieldValue};
use crate::transaction::Transaction;
use crate::types::{Attachment, NodeId};
use parking_lot::RwLock;

/// The committed attachment of a node.
pub(crate) struct NodeCell {
    pub(crate) id: NodeId,
    attachment: RwLock<Attachment>,
}

impl NodeCell {
    pub(crate) fn new(at: Attachment) -> Self {
        Self {
            id: NodeId::next(),
            attachment: RwLock::new(at),
        }
    }

    pub(crate) fn committed(&self) -> Attachment {
        *self.attachment.read()
    }

    /// The attachment visible to `tx`, or the committed one.
    pub(crate) fn resolve(&self, tx: Option<&Transaction>) -> Attachment {
        tx.and_then(|tx| tx.node_log(self.id))
            .unwrap_or_else(|| self.committed())
    }

    pub(crate) fn commit(&self, at: Attachment) {
        *self.attachment.write() = at;
    }
}

/// How re-parenting is recorded.
pub(crate) enum Mode<'a> {
    /// As node logs of the active transaction.
    Logged(&'a mut Transaction),
    /// Straight into the committed attachment (optional writes).
    Direct,
}

impl Mode<'_> {
    pub(crate) fn attachment(&self, node: &NodeCell) -> Attachment {
        match self {
            Mode::Logged(tx) => node.resolve(Some(&**tx)),
            Mode::Direct => node.committed(),
        }
    }

    pub(crate) fn field_value(&self, cell: &FieldCell) -> FieldValue {
        match self {
            Mode::Logged(tx) => cell.resolve(Some(&**tx)),
            Mode::Direct => cell.committed(),
        }
    }
}

/// Beans entering and leaving a container in one mutation.
#[derive(Default)]
pub(crate) struct Relinks {
    attach: Vec<Bean>,
    detach: Vec<Bean>,
}

impl Relinks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&mut self, bean: &Bean) {
        self.attach.push(bean.clone());
    }

    pub(crate) fn detach(&mut self, bean: &Bean) {
        self.detach.push(bean.clone());
    }

    /// Detaches leaving beans, then attaches entering beans to `at`.
    ///
    /// A bean that both leaves and enters (replaced by itself) stays put.
    pub(crate) fn apply(self, mode: &mut Mode<'_>, at: Attachment) {
        for bean in &self.detach {
            if !self.attach.iter().any(|b| b.ptr_eq(bean)) {
                bean.reattach(mode, Attachment::DETACHED);
            }
        }
        for bean in &self.attach {
            bean.reattach(mode, at);
        }
    }
}
