//! Scalar and bean fields.

use crate::entity::{Bean, Relinks};
use crate::error::{TxResult, ValidationError};
use crate::field::{Edit, FieldCell, FieldValue};
use crate::schema::{BeanSchema, ScalarType};
use crate::value::Value;
use std::sync::Arc;

/// A primitive-valued field.
#[derive(Clone)]
pub struct ScalarField {
    cell: Arc<FieldCell>,
    ty: ScalarType,
}

impl ScalarField {
    pub(crate) fn new(cell: Arc<FieldCell>, ty: ScalarType) -> Self {
        Self { cell, ty }
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.cell.def.name
    }

    /// Returns the value as seen by the current transaction.
    #[must_use]
    pub fn get(&self) -> Value {
        match self.cell.current() {
            FieldValue::Scalar(value) => value,
            _ => Value::Null,
        }
    }

    /// Sets the value.
    ///
    /// # Errors
    ///
    /// Returns a validation error for null, mistyped or out-of-range
    /// values, or [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn set(&self, value: impl Into<Value>) -> TxResult<()> {
        let value = value.into();
        self.cell.def.check_scalar(self.ty, &value)?;
        self.cell
            .mutate(|_| Ok(Edit::changed(FieldValue::Scalar(value), Relinks::new(), ())))
    }
}

impl std::fmt::Debug for ScalarField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {:?}", self.name(), self.get())
    }
}

/// A field holding at most one bean.
#[derive(Clone)]
pub struct BeanField {
    cell: Arc<FieldCell>,
    schema: &'static BeanSchema,
}

impl BeanField {
    pub(crate) fn new(cell: Arc<FieldCell>, schema: &'static BeanSchema) -> Self {
        Self { cell, schema }
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.cell.def.name
    }

    /// Returns the bean as seen by the current transaction.
    #[must_use]
    pub fn get(&self) -> Option<Bean> {
        match self.cell.current() {
            FieldValue::Bean(bean) => bean,
            _ => None,
        }
    }

    /// Stores `bean` (or clears the field) and returns the previous bean.
    ///
    /// The new bean is attached to this field; the previous one is detached.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::BeanSchemaMismatch`] for a bean of another
    /// schema, or [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn set(&self, bean: Option<Bean>) -> TxResult<Option<Bean>> {
        if let Some(bean) = &bean {
            if !std::ptr::eq(bean.schema(), self.schema) {
                return Err(ValidationError::BeanSchemaMismatch {
                    field: self.name(),
                    expected: self.schema.name,
                    found: bean.schema().name,
                }
                .into());
            }
        }

        self.cell.mutate(|current| {
            let old = match current {
                FieldValue::Bean(old) => old.clone(),
                _ => None,
            };
            let mut relinks = Relinks::new();
            if let Some(old) = &old {
                relinks.detach(old);
            }
            if let Some(bean) = &bean {
                relinks.attach(bean);
            }
            Ok(Edit::changed(FieldValue::Bean(bean), relinks, old))
        })
    }
}

impl std::fmt::Debug for BeanField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {:?}", self.name(), self.get())
    }
}
