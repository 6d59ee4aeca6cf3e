//! Embedded composites.

use crate::entity::node::{Mode, NodeCell};
use crate::entity::Composite;
use crate::error::ValidationError;
use crate::field::{Field, FieldCell, FieldValue, Host};
use crate::schema::{BeanSchema, FieldDef};
use crate::transaction::{read_current, Transaction};
use crate::types::{Attachment, NodeId};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

pub(crate) struct BeanCell {
    node: Arc<NodeCell>,
    schema: &'static BeanSchema,
    fields: Vec<Arc<FieldCell>>,
}

/// A composite value embedded in an aggregate root's fields.
///
/// A bean is a node: it tracks the aggregate root and top-level position it
/// hangs under. Putting it into a field re-points it (and every bean below
/// it) to that field's attachment; removing it detaches it. Inside a
/// transaction the change is a node log, visible only to that transaction
/// until commit.
///
/// Cloning a `Bean` clones the handle, not the value.
#[derive(Clone)]
pub struct Bean(Arc<BeanCell>);

impl Bean {
    /// Creates a detached bean with default field values.
    #[must_use]
    pub fn new(schema: &'static BeanSchema) -> Self {
        let node = Arc::new(NodeCell::new(Attachment::DETACHED));
        let fields = schema
            .fields
            .iter()
            .map(|def| {
                FieldCell::new(def, Host::Bean(Arc::clone(&node)), FieldValue::empty(&def.kind))
            })
            .collect();
        Self(Arc::new(BeanCell {
            node,
            schema,
            fields,
        }))
    }

    /// Builds a detached bean from its rendered form.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a map matching `schema`.
    pub fn from_value(schema: &'static BeanSchema, value: &Value) -> Result<Self, ValidationError> {
        Self::parse(schema, value, Attachment::DETACHED)
    }

    pub(crate) fn parse(
        schema: &'static BeanSchema,
        value: &Value,
        at: Attachment,
    ) -> Result<Self, ValidationError> {
        if value.as_map().is_none() {
            return Err(ValidationError::malformed(format!(
                "bean {} expects a map, found {}",
                schema.name,
                value.type_name()
            )));
        }
        let node = Arc::new(NodeCell::new(at));
        let fields = schema
            .fields
            .iter()
            .map(|def| {
                let parsed = FieldValue::parse(def, value.get(def.name), at)?;
                Ok(FieldCell::new(def, Host::Bean(Arc::clone(&node)), parsed))
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Ok(Self(Arc::new(BeanCell {
            node,
            schema,
            fields,
        })))
    }

    /// Returns the bean's schema.
    #[must_use]
    pub fn schema(&self) -> &'static BeanSchema {
        self.0.schema
    }

    /// Returns the bean's node ID.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.0.node.id
    }

    /// Returns where the bean hangs, as seen by the current transaction.
    #[must_use]
    pub fn attachment(&self) -> Attachment {
        read_current(|tx| self.0.node.resolve(tx))
    }

    /// Returns the committed attachment, ignoring any transaction.
    #[must_use]
    pub fn committed_attachment(&self) -> Attachment {
        self.0.node.committed()
    }

    /// Returns true if both handles refer to the same bean.
    #[must_use]
    pub fn ptr_eq(&self, other: &Bean) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Re-points this bean and every bean below it to `at`.
    pub(crate) fn reattach(&self, mode: &mut Mode<'_>, at: Attachment) {
        if mode.attachment(&self.0.node) == at {
            return;
        }
        match mode {
            Mode::Logged(tx) => tx.set_node_log(&self.0.node, at),
            Mode::Direct => self.0.node.commit(at),
        }
        for cell in &self.0.fields {
            if !cell.def.kind.holds_beans() {
                continue;
            }
            for child in mode.field_value(cell).beans() {
                child.reattach(mode, at);
            }
        }
    }

    pub(crate) fn render(&self, tx: Option<&Transaction>) -> Value {
        Value::map(
            self.0
                .fields
                .iter()
                .filter(|cell| !cell.def.ignore)
                .map(|cell| (Value::from(cell.def.name), cell.resolve(tx).render(tx)))
                .collect(),
        )
    }
}

impl Composite for Bean {
    fn type_name(&self) -> &'static str {
        self.0.schema.name
    }

    fn field_defs(&self) -> &'static [FieldDef] {
        self.0.schema.fields
    }

    fn field_at(&self, position: usize) -> Option<Field> {
        self.0.fields.get(position).map(|cell| Field::new(Arc::clone(cell)))
    }

    fn to_value(&self) -> Value {
        read_current(|tx| self.render(tx))
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("schema", &self.0.schema.name)
            .field("node", &self.0.node.id)
            .finish()
    }
}
