//! Set fields.

use crate::entity::Relinks;
use crate::error::TxResult;
use crate::field::item::check_key;
use crate::field::{Edit, FieldCell, FieldValue};
use crate::schema::ScalarType;
use crate::value::Value;
use imbl::HashSet;
use std::sync::Arc;

/// An unordered set of primitives.
#[derive(Clone)]
pub struct SetField {
    cell: Arc<FieldCell>,
    ty: ScalarType,
}

fn values_of(value: &FieldValue) -> HashSet<Value> {
    match value {
        FieldValue::Set(values) => values.clone(),
        _ => HashSet::new(),
    }
}

impl SetField {
    pub(crate) fn new(cell: Arc<FieldCell>, ty: ScalarType) -> Self {
        Self { cell, ty }
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.cell.def.name
    }

    /// Returns a snapshot of the set as seen by the current transaction.
    #[must_use]
    pub fn values(&self) -> HashSet<Value> {
        values_of(&self.cell.current())
    }

    /// Returns true if the set holds `value`.
    #[must_use]
    pub fn contains(&self, value: impl Into<Value>) -> bool {
        self.values().contains(&value.into())
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values().len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// Adds a value. Returns false if it was already present.
    ///
    /// # Errors
    ///
    /// Returns a validation error for null or mistyped values, or
    /// [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn insert(&self, value: impl Into<Value>) -> TxResult<bool> {
        let value = value.into();
        check_key(self.name(), self.ty, &value)?;
        self.cell.mutate(|current| {
            let mut values = values_of(current);
            if values.contains(&value) {
                return Ok(Edit::Unchanged(false));
            }
            values.insert(value);
            Ok(Edit::changed(FieldValue::Set(values), Relinks::new(), true))
        })
    }

    /// Removes a value. Returns false if it was absent.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn remove(&self, value: impl Into<Value>) -> TxResult<bool> {
        let value = value.into();
        self.cell.mutate(|current| {
            let mut values = values_of(current);
            if values.remove(&value).is_none() {
                return Ok(Edit::Unchanged(false));
            }
            Ok(Edit::changed(FieldValue::Set(values), Relinks::new(), true))
        })
    }

    /// Removes every value.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn clear(&self) -> TxResult<()> {
        self.cell.mutate(|current| {
            if values_of(current).is_empty() {
                return Ok(Edit::Unchanged(()));
            }
            Ok(Edit::changed(FieldValue::Set(HashSet::new()), Relinks::new(), ()))
        })
    }
}

impl std::fmt::Debug for SetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values().iter()).finish()
    }
}
