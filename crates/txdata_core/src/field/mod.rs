//! Transactionally logged fields.
//!
//! Every field owns a committed baseline. Inside a transaction a mutation
//! computes a new value from the field's effective value (the innermost
//! pending shadow, else the baseline) and records it as a shadow log; the
//! baseline changes only when the outermost transaction commits. Outside a
//! transaction a mutation either writes the baseline directly (when
//! optional writes are enabled) or fails with
//! [`TxError::NotInTransaction`].
//!
//! Collection values are persistent structures: a mutation produces a new
//! value sharing structure with the old one, so shadows and baselines never
//! alias mutable state.

mod item;
mod list;
mod map;
mod scalar;
mod set;

pub use item::Item;
pub use list::ListField;
pub use map::MapField;
pub use scalar::{BeanField, ScalarField};
pub use set::SetField;

use crate::config;
use crate::entity::{Bean, Mode, NodeCell, Relinks};
use crate::error::{TxError, TxResult, ValidationError};
use crate::schema::{FieldDef, FieldKind};
use crate::transaction::{read_current, with_current, Transaction};
use crate::types::{Attachment, DataId, FieldId};
use crate::value::Value;
use imbl::{HashMap, HashSet, Vector};
use item::check_key;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// What a field hangs under.
pub(crate) enum Host {
    /// A top-level field of an aggregate root.
    Data { owner: DataId, position: usize },
    /// A field of a bean; it follows the bean's attachment.
    Bean(Arc<NodeCell>),
}

/// The value a field holds, committed or pending.
#[derive(Clone)]
pub(crate) enum FieldValue {
    Scalar(Value),
    Bean(Option<Bean>),
    List(Vector<Item>),
    Set(HashSet<Value>),
    Map(HashMap<Value, Item>),
}

impl FieldValue {
    pub(crate) fn empty(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Scalar(ty) => Self::Scalar(ty.default_value()),
            FieldKind::Bean(_) => Self::Bean(None),
            FieldKind::List(_) => Self::List(Vector::new()),
            FieldKind::Set(_) => Self::Set(HashSet::new()),
            FieldKind::Map(..) => Self::Map(HashMap::new()),
        }
    }

    /// Beans held directly by this value.
    pub(crate) fn beans(&self) -> Vec<Bean> {
        match self {
            Self::Bean(bean) => bean.iter().cloned().collect(),
            Self::List(items) => items.iter().filter_map(|i| i.as_bean().cloned()).collect(),
            Self::Map(entries) => entries.values().filter_map(|i| i.as_bean().cloned()).collect(),
            Self::Scalar(_) | Self::Set(_) => Vec::new(),
        }
    }

    pub(crate) fn render(&self, tx: Option<&Transaction>) -> Value {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::Bean(bean) => bean.as_ref().map_or(Value::Null, |b| b.render(tx)),
            Self::List(items) => Value::Array(items.iter().map(|i| i.render(tx)).collect()),
            Self::Set(values) => Value::sorted_array(values.iter().cloned().collect()),
            Self::Map(entries) => Value::map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.render(tx)))
                    .collect(),
            ),
        }
    }

    /// Reads a stored value. Missing and null values become the default.
    pub(crate) fn parse(
        def: &'static FieldDef,
        value: Option<&Value>,
        at: Attachment,
    ) -> Result<Self, ValidationError> {
        let value = match value {
            None | Some(Value::Null) => return Ok(Self::empty(&def.kind)),
            Some(value) => value,
        };
        let shape = || {
            ValidationError::malformed(format!(
                "field {} expects a {} value, found {}",
                def.name,
                def.kind.name(),
                value.type_name()
            ))
        };

        match def.kind {
            FieldKind::Scalar(ty) => {
                def.check_scalar(ty, value)?;
                Ok(Self::Scalar(value.clone()))
            }
            FieldKind::Bean(schema) => Ok(Self::Bean(Some(Bean::parse(schema, value, at)?))),
            FieldKind::List(elem) => value
                .as_array()
                .ok_or_else(shape)?
                .iter()
                .map(|v| Item::parse(def.name, elem, v, at))
                .collect::<Result<Vector<_>, _>>()
                .map(Self::List),
            FieldKind::Set(ty) => value
                .as_array()
                .ok_or_else(shape)?
                .iter()
                .map(|v| check_key(def.name, ty, v).map(|()| v.clone()))
                .collect::<Result<HashSet<_>, _>>()
                .map(Self::Set),
            FieldKind::Map(key, elem) => value
                .as_map()
                .ok_or_else(shape)?
                .iter()
                .map(|(k, v)| {
                    check_key(def.name, key, k)?;
                    Ok((k.clone(), Item::parse(def.name, elem, v, at)?))
                })
                .collect::<Result<HashMap<_, _>, _>>()
                .map(Self::Map),
        }
    }
}

/// Result of applying an edit to a field's effective value.
pub(crate) enum Edit<R> {
    /// The field takes `value`; `relinks` re-parents beans.
    Changed {
        value: FieldValue,
        relinks: Relinks,
        result: R,
    },
    /// Nothing to record.
    Unchanged(R),
}

impl<R> Edit<R> {
    pub(crate) fn changed(value: FieldValue, relinks: Relinks, result: R) -> Self {
        Self::Changed {
            value,
            relinks,
            result,
        }
    }
}

/// Storage behind every field handle.
pub(crate) struct FieldCell {
    pub(crate) id: FieldId,
    pub(crate) def: &'static FieldDef,
    host: Host,
    baseline: RwLock<FieldValue>,
}

impl FieldCell {
    pub(crate) fn new(def: &'static FieldDef, host: Host, value: FieldValue) -> Arc<Self> {
        Arc::new(Self {
            id: FieldId::next(),
            def,
            host,
            baseline: RwLock::new(value),
        })
    }

    pub(crate) fn committed(&self) -> FieldValue {
        self.baseline.read().clone()
    }

    /// The value visible to `tx`: its innermost shadow, else the baseline.
    pub(crate) fn resolve(&self, tx: Option<&Transaction>) -> FieldValue {
        tx.and_then(|tx| tx.field_log(self.id))
            .cloned()
            .unwrap_or_else(|| self.committed())
    }

    pub(crate) fn current(&self) -> FieldValue {
        read_current(|tx| self.resolve(tx))
    }

    pub(crate) fn commit(&self, value: FieldValue) {
        *self.baseline.write() = value;
    }

    /// Where values stored in this field hang.
    pub(crate) fn attachment(&self, tx: Option<&Transaction>) -> Attachment {
        match &self.host {
            Host::Data { owner, position } => Attachment::to(*owner, *position),
            Host::Bean(node) => node.resolve(tx),
        }
    }

    /// Applies `edit` to the effective value, as a shadow log inside a
    /// transaction or directly when optional writes are enabled.
    ///
    /// `edit` validates its input before returning, so a rejected mutation
    /// leaves no trace.
    pub(crate) fn mutate<R>(
        self: &Arc<Self>,
        edit: impl FnOnce(&FieldValue) -> TxResult<Edit<R>>,
    ) -> TxResult<R> {
        let mut edit = Some(edit);
        let logged = with_current(|tx| {
            let tx = tx?;
            let edit = edit.take()?;
            Some(self.mutate_logged(tx, edit))
        });
        match (logged, edit) {
            (Some(result), _) => result,
            (None, Some(edit)) if config::is_optional() => self.mutate_direct(edit),
            (None, _) => Err(TxError::NotInTransaction),
        }
    }

    fn mutate_logged<R>(
        self: &Arc<Self>,
        tx: &mut Transaction,
        edit: impl FnOnce(&FieldValue) -> TxResult<Edit<R>>,
    ) -> TxResult<R> {
        let current = self.resolve(Some(&*tx));
        match edit(&current)? {
            Edit::Unchanged(result) => Ok(result),
            Edit::Changed {
                value,
                relinks,
                result,
            } => {
                let at = self.attachment(Some(&*tx));
                relinks.apply(&mut Mode::Logged(&mut *tx), at);
                tx.set_field_log(self, value, at);
                Ok(result)
            }
        }
    }

    fn mutate_direct<R>(
        self: &Arc<Self>,
        edit: impl FnOnce(&FieldValue) -> TxResult<Edit<R>>,
    ) -> TxResult<R> {
        let mut baseline = self.baseline.write();
        match edit(&*baseline)? {
            Edit::Unchanged(result) => Ok(result),
            Edit::Changed {
                value,
                relinks,
                result,
            } => {
                *baseline = value;
                drop(baseline);
                relinks.apply(&mut Mode::Direct, self.attachment(None));
                Ok(result)
            }
        }
    }
}

/// A handle to one field of an aggregate root or bean.
#[derive(Clone)]
pub struct Field(Arc<FieldCell>);

impl Field {
    pub(crate) fn new(cell: Arc<FieldCell>) -> Self {
        Self(cell)
    }

    /// Returns the field ID.
    #[must_use]
    pub fn id(&self) -> FieldId {
        self.0.id
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.0.def.name
    }

    /// Returns the field definition.
    #[must_use]
    pub fn def(&self) -> &'static FieldDef {
        self.0.def
    }

    /// Renders the value as seen by the current transaction.
    #[must_use]
    pub fn value(&self) -> Value {
        read_current(|tx| self.0.resolve(tx).render(tx))
    }

    /// Renders the committed value, ignoring any transaction.
    #[must_use]
    pub fn committed_value(&self) -> Value {
        self.0.committed().render(None)
    }

    /// Returns where values stored in this field hang.
    #[must_use]
    pub fn attachment(&self) -> Attachment {
        read_current(|tx| self.0.attachment(tx))
    }

    /// Views this field as a scalar.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::KindMismatch`] for other kinds.
    pub fn as_scalar(&self) -> TxResult<ScalarField> {
        match self.0.def.kind {
            FieldKind::Scalar(ty) => Ok(ScalarField::new(Arc::clone(&self.0), ty)),
            _ => Err(TxError::kind_mismatch(self.name(), "scalar")),
        }
    }

    /// Views this field as a bean field.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::KindMismatch`] for other kinds.
    pub fn as_bean(&self) -> TxResult<BeanField> {
        match self.0.def.kind {
            FieldKind::Bean(schema) => Ok(BeanField::new(Arc::clone(&self.0), schema)),
            _ => Err(TxError::kind_mismatch(self.name(), "bean")),
        }
    }

    /// Views this field as a list.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::KindMismatch`] for other kinds.
    pub fn as_list(&self) -> TxResult<ListField> {
        match self.0.def.kind {
            FieldKind::List(elem) => Ok(ListField::new(Arc::clone(&self.0), elem)),
            _ => Err(TxError::kind_mismatch(self.name(), "list")),
        }
    }

    /// Views this field as a set.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::KindMismatch`] for other kinds.
    pub fn as_set(&self) -> TxResult<SetField> {
        match self.0.def.kind {
            FieldKind::Set(ty) => Ok(SetField::new(Arc::clone(&self.0), ty)),
            _ => Err(TxError::kind_mismatch(self.name(), "set")),
        }
    }

    /// Views this field as a map.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::KindMismatch`] for other kinds.
    pub fn as_map(&self) -> TxResult<MapField> {
        match self.0.def.kind {
            FieldKind::Map(key, value) => Ok(MapField::new(Arc::clone(&self.0), key, value)),
            _ => Err(TxError::kind_mismatch(self.name(), "map")),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.0.id)
            .field("name", &self.0.def.name)
            .field("kind", &self.0.def.kind)
            .finish()
    }
}
