//! List fields.

use crate::entity::Relinks;
use crate::error::{TxResult, ValidationError};
use crate::field::{Edit, FieldCell, FieldValue, Item};
use crate::schema::ElemType;
use imbl::Vector;
use std::sync::Arc;

/// An ordered list of primitives or beans.
#[derive(Clone)]
pub struct ListField {
    cell: Arc<FieldCell>,
    elem: ElemType,
}

fn items_of(value: &FieldValue) -> Vector<Item> {
    match value {
        FieldValue::List(items) => items.clone(),
        _ => Vector::new(),
    }
}

impl ListField {
    pub(crate) fn new(cell: Arc<FieldCell>, elem: ElemType) -> Self {
        Self { cell, elem }
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.cell.def.name
    }

    /// Returns a snapshot of the list as seen by the current transaction.
    #[must_use]
    pub fn items(&self) -> Vector<Item> {
        items_of(&self.cell.current())
    }

    /// Returns the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Item> {
        self.items().get(index).cloned()
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    fn out_of_bounds(&self, index: usize, len: usize) -> ValidationError {
        ValidationError::IndexOutOfBounds {
            field: self.name(),
            index,
            len,
        }
    }

    /// Appends an element.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an element of the wrong type, or
    /// [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn push(&self, item: impl Into<Item>) -> TxResult<()> {
        let item = item.into();
        item.check(self.name(), self.elem)?;
        self.cell.mutate(|current| {
            let mut items = items_of(current);
            let mut relinks = Relinks::new();
            if let Item::Bean(bean) = &item {
                relinks.attach(bean);
            }
            items.push_back(item);
            Ok(Edit::changed(FieldValue::List(items), relinks, ()))
        })
    }

    /// Inserts an element at `index`, shifting later elements.
    ///
    /// # Errors
    ///
    /// As [`ListField::push`], plus
    /// [`ValidationError::IndexOutOfBounds`] if `index > len`.
    pub fn insert(&self, index: usize, item: impl Into<Item>) -> TxResult<()> {
        let item = item.into();
        item.check(self.name(), self.elem)?;
        self.cell.mutate(|current| {
            let mut items = items_of(current);
            if index > items.len() {
                return Err(self.out_of_bounds(index, items.len()).into());
            }
            let mut relinks = Relinks::new();
            if let Item::Bean(bean) = &item {
                relinks.attach(bean);
            }
            items.insert(index, item);
            Ok(Edit::changed(FieldValue::List(items), relinks, ()))
        })
    }

    /// Replaces the element at `index` and returns the old one.
    ///
    /// # Errors
    ///
    /// As [`ListField::push`], plus
    /// [`ValidationError::IndexOutOfBounds`] if `index >= len`.
    pub fn set(&self, index: usize, item: impl Into<Item>) -> TxResult<Item> {
        let item = item.into();
        item.check(self.name(), self.elem)?;
        self.cell.mutate(|current| {
            let mut items = items_of(current);
            if index >= items.len() {
                return Err(self.out_of_bounds(index, items.len()).into());
            }
            let mut relinks = Relinks::new();
            if let Item::Bean(bean) = &item {
                relinks.attach(bean);
            }
            let old = items.set(index, item);
            if let Item::Bean(bean) = &old {
                relinks.detach(bean);
            }
            Ok(Edit::changed(FieldValue::List(items), relinks, old))
        })
    }

    /// Removes the element at `index` and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::IndexOutOfBounds`] if `index >= len`, or
    /// [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn remove(&self, index: usize) -> TxResult<Item> {
        self.cell.mutate(|current| {
            let mut items = items_of(current);
            if index >= items.len() {
                return Err(self.out_of_bounds(index, items.len()).into());
            }
            let old = items.remove(index);
            let mut relinks = Relinks::new();
            if let Item::Bean(bean) = &old {
                relinks.detach(bean);
            }
            Ok(Edit::changed(FieldValue::List(items), relinks, old))
        })
    }

    /// Removes every element, detaching beans.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn clear(&self) -> TxResult<()> {
        self.cell.mutate(|current| {
            let items = items_of(current);
            if items.is_empty() {
                return Ok(Edit::Unchanged(()));
            }
            let mut relinks = Relinks::new();
            for item in items.iter() {
                if let Item::Bean(bean) = item {
                    relinks.detach(bean);
                }
            }
            Ok(Edit::changed(FieldValue::List(Vector::new()), relinks, ()))
        })
    }
}

impl std::fmt::Debug for ListField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.items().iter()).finish()
    }
}
