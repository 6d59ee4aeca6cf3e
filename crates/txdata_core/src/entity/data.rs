//! Aggregate roots.

use crate::accessor::{Accessor, Record, RecordKey, WriteIntent};
use crate::dirty::DirtySet;
use crate::entity::Composite;
use crate::error::{TxResult, ValidationError};
use crate::field::{Field, FieldCell, FieldValue, Host};
use crate::schema::{DataSchema, FieldDef, FieldKind};
use crate::transaction::{read_current, DataLog, Transaction};
use crate::types::{Attachment, DataId, DataState};
use crate::value::{Document, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Every live aggregate by ID, whichever store (if any) tracks it.
static LIVE: RwLock<BTreeMap<DataId, Weak<DataCell>>> = RwLock::new(BTreeMap::new());

pub(crate) struct DataCell {
    id: DataId,
    schema: &'static DataSchema,
    fields: Vec<Arc<FieldCell>>,
    state: RwLock<DataState>,
    accessor: RwLock<Option<Arc<dyn Accessor>>>,
}

/// An aggregate root: a persistable entity with identity.
///
/// A `Data` is a positional table of fields described by its
/// [`DataSchema`]. It starts transient ([`DataState::None`]); inserting it
/// through a [`Store`](crate::Store) makes it persisted once the
/// transaction commits, after which field mutations are written to the
/// accessor as patches of the changed top-level fields.
///
/// Cloning a `Data` clones the handle, not the entity.
#[derive(Clone)]
pub struct Data(Arc<DataCell>);

impl Data {
    /// Creates a transient aggregate with the given identity and default
    /// values everywhere else.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is invalid or `key` does not fit the
    /// identity field.
    pub fn new(schema: &'static DataSchema, key: impl Into<Value>) -> TxResult<Self> {
        schema.validate()?;
        let key = key.into();
        let id_def = &schema.fields[schema.id_field];
        if let FieldKind::Scalar(ty) = id_def.kind {
            id_def.check_scalar(ty, &key)?;
        }

        let id = DataId::next();
        let fields = schema
            .fields
            .iter()
            .enumerate()
            .map(|(position, def)| {
                let value = if position == schema.id_field {
                    FieldValue::Scalar(key.clone())
                } else {
                    FieldValue::empty(&def.kind)
                };
                FieldCell::new(def, Host::Data { owner: id, position }, value)
            })
            .collect();
        Ok(Self::assemble(id, schema, fields))
    }

    /// Rebuilds an aggregate from a stored document.
    pub(crate) fn parse(schema: &'static DataSchema, document: &Document) -> TxResult<Self> {
        schema.validate()?;
        let id_def = &schema.fields[schema.id_field];
        if document.get(id_def.name).map_or(true, Value::is_null) {
            return Err(ValidationError::malformed(format!(
                "{} document has no {}",
                schema.name, id_def.name
            ))
            .into());
        }

        let id = DataId::next();
        let fields = schema
            .fields
            .iter()
            .enumerate()
            .map(|(position, def)| {
                let value = FieldValue::parse(def, document.get(def.name), Attachment::to(id, position))?;
                Ok(FieldCell::new(def, Host::Data { owner: id, position }, value))
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Ok(Self::assemble(id, schema, fields))
    }

    fn assemble(id: DataId, schema: &'static DataSchema, fields: Vec<Arc<FieldCell>>) -> Self {
        let cell = Arc::new(DataCell {
            id,
            schema,
            fields,
            state: RwLock::new(DataState::None),
            accessor: RwLock::new(None),
        });
        LIVE.write().insert(id, Arc::downgrade(&cell));
        Self(cell)
    }

    /// Resolves a live aggregate by ID, resident in a store or not.
    pub(crate) fn lookup(id: DataId) -> Option<Data> {
        let cell = LIVE.read().get(&id).and_then(Weak::upgrade)?;
        Some(Self(cell))
    }

    /// Returns the aggregate's ID.
    #[must_use]
    pub fn id(&self) -> DataId {
        self.0.id
    }

    /// Returns the aggregate's schema.
    #[must_use]
    pub fn schema(&self) -> &'static DataSchema {
        self.0.schema
    }

    /// Returns the identity field's value as seen by the current transaction.
    #[must_use]
    pub fn key(&self) -> Value {
        read_current(|tx| self.key_in(tx))
    }

    fn key_in(&self, tx: Option<&Transaction>) -> Value {
        match self.0.fields[self.0.schema.id_field].resolve(tx) {
            FieldValue::Scalar(value) => value,
            _ => Value::Null,
        }
    }

    /// Returns the accessor-facing identity.
    #[must_use]
    pub fn record_key(&self) -> RecordKey {
        RecordKey::new(self.0.schema.name, self.key())
    }

    /// Returns the lifecycle state as seen by the current transaction.
    #[must_use]
    pub fn state(&self) -> DataState {
        read_current(|tx| self.state_in(tx))
    }

    pub(crate) fn state_in(&self, tx: Option<&Transaction>) -> DataState {
        tx.and_then(|tx| tx.data_log(self.0.id))
            .map_or_else(|| self.committed_state(), |log| log.state)
    }

    /// Returns the committed lifecycle state, ignoring any transaction.
    #[must_use]
    pub fn committed_state(&self) -> DataState {
        *self.0.state.read()
    }

    /// Returns true if the current transaction inserted this aggregate,
    /// whatever happened to it afterwards.
    #[must_use]
    pub fn inserted_in_transaction(&self) -> bool {
        read_current(|tx| {
            let Some(tx) = tx else {
                return false;
            };
            let mut log = tx.data_log(self.0.id);
            while let Some(entry) = log {
                if entry.state == DataState::Insert {
                    return true;
                }
                log = tx.prev_data_log(self.0.id, entry);
            }
            false
        })
    }

    /// Returns the field positions the current transaction has dirtied.
    ///
    /// Empty outside a transaction and for aggregates that are not
    /// persisted; ignored fields are never dirty.
    #[must_use]
    pub fn dirty(&self) -> DirtySet {
        read_current(|tx| {
            tx.and_then(|tx| tx.data_log(self.0.id))
                .map(|log| log.dirty.clone())
                .unwrap_or_default()
        })
    }

    /// Renders the persisted fields as seen by the current transaction.
    #[must_use]
    pub fn document(&self) -> Document {
        read_current(|tx| self.render(tx))
    }

    /// Returns true if both handles refer to the same aggregate.
    #[must_use]
    pub fn ptr_eq(&self, other: &Data) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn accessor(&self) -> Option<Arc<dyn Accessor>> {
        self.0.accessor.read().clone()
    }

    pub(crate) fn render(&self, tx: Option<&Transaction>) -> Document {
        self.0
            .fields
            .iter()
            .filter(|cell| !cell.def.ignore)
            .map(|cell| (cell.def.name.to_string(), cell.resolve(tx).render(tx)))
            .collect()
    }

    /// Folds a data log into the committed state and returns the write it
    /// implies. Field baselines must already be committed.
    pub(crate) fn commit(&self, log: &DataLog) -> Option<WriteIntent> {
        *self.0.state.write() = match log.state {
            DataState::Insert | DataState::Update => DataState::Update,
            DataState::Delete | DataState::None => DataState::None,
        };
        if log.state != DataState::Delete {
            self.0.accessor.write().clone_from(&log.accessor);
        }

        let key = RecordKey::new(self.0.schema.name, self.key_in(None));
        match log.state {
            DataState::Insert => Some(WriteIntent::Insert(Record {
                key,
                document: self.render(None),
            })),
            DataState::Delete => Some(WriteIntent::Delete(key)),
            DataState::Update => {
                let patch: Document = log
                    .dirty
                    .iter()
                    .filter_map(|position| self.0.fields.get(position))
                    .filter(|cell| !cell.def.ignore)
                    .map(|cell| (cell.def.name.to_string(), cell.committed().render(None)))
                    .collect();
                (!patch.is_empty()).then_some(WriteIntent::Patch(key, patch))
            }
            DataState::None => None,
        }
    }
}

impl Composite for Data {
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
        Value::from_document(self.document())
    }
}

impl Drop for DataCell {
    fn drop(&mut self) {
        LIVE.write().remove(&self.id);
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("id", &self.0.id)
            .field("schema", &self.0.schema.name)
            .field("state", &self.committed_state())
            .finish()
    }
}
