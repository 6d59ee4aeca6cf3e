//! Aggregate roots and embedded composites.

mod bean;
mod data;
mod node;

pub use bean::Bean;
pub use data::Data;
pub(crate) use node::{Mode, NodeCell, Relinks};

use crate::error::{TxError, TxResult};
use crate::field::{BeanField, Field, ListField, MapField, ScalarField, SetField};
use crate::schema::FieldDef;
use crate::value::Value;

/// Field access shared by aggregate roots and beans.
///
/// Generated entity types wrap a [`Data`] or [`Bean`] and expose typed
/// accessors built from these lookups.
pub trait Composite {
    /// Returns the schema name.
    fn type_name(&self) -> &'static str;

    /// Returns the positional field table.
    fn field_defs(&self) -> &'static [FieldDef];

    /// Returns the field at `position`.
    fn field_at(&self, position: usize) -> Option<Field>;

    /// Renders the persisted fields as seen by the current transaction.
    fn to_value(&self) -> Value;

    /// Returns the named field.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::UnknownField`] if the schema has no such field.
    fn field(&self, name: &str) -> TxResult<Field> {
        self.field_defs()
            .iter()
            .position(|def| def.name == name)
            .and_then(|position| self.field_at(position))
            .ok_or_else(|| TxError::UnknownField {
                schema: self.type_name(),
                name: name.to_string(),
            })
    }

    /// Returns the named scalar field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a scalar.
    fn scalar(&self, name: &str) -> TxResult<ScalarField> {
        self.field(name)?.as_scalar()
    }

    /// Returns the named bean field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a bean field.
    fn bean(&self, name: &str) -> TxResult<BeanField> {
        self.field(name)?.as_bean()
    }

    /// Returns the named list field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a list.
    fn list(&self, name: &str) -> TxResult<ListField> {
        self.field(name)?.as_list()
    }

    /// Returns the named set field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a set.
    fn set(&self, name: &str) -> TxResult<SetField> {
        self.field(name)?.as_set()
    }

    /// Returns the named map field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a map.
    fn map(&self, name: &str) -> TxResult<MapField> {
        self.field(name)?.as_map()
    }
}
