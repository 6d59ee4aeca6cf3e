//! Map fields.

use crate::entity::Relinks;
use crate::error::TxResult;
use crate::field::item::check_key;
use crate::field::{Edit, FieldCell, FieldValue, Item};
use crate::schema::{ElemType, ScalarType};
use crate::value::Value;
use imbl::HashMap;
use std::sync::Arc;

/// A map from primitive keys to primitives or beans.
#[derive(Clone)]
pub struct MapField {
    cell: Arc<FieldCell>,
    key: ScalarType,
    value: ElemType,
}

fn entries_of(value: &FieldValue) -> HashMap<Value, Item> {
    match value {
        FieldValue::Map(entries) => entries.clone(),
        _ => HashMap::new(),
    }
}

impl MapField {
    pub(crate) fn new(cell: Arc<FieldCell>, key: ScalarType, value: ElemType) -> Self {
        Self { cell, key, value }
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.cell.def.name
    }

    /// Returns a snapshot of the map as seen by the current transaction.
    #[must_use]
    pub fn entries(&self) -> HashMap<Value, Item> {
        entries_of(&self.cell.current())
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: impl Into<Value>) -> Option<Item> {
        self.entries().get(&key.into()).cloned()
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: impl Into<Value>) -> bool {
        self.entries().contains_key(&key.into())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn check(&self, key: &Value, value: &Item) -> TxResult<()> {
        check_key(self.name(), self.key, key)?;
        value.check(self.name(), self.value)?;
        Ok(())
    }

    /// Stores `value` under `key` and returns the previous value.
    ///
    /// A bean value is attached to this field; a replaced bean is detached.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an illegal key or value, or
    /// [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn put(&self, key: impl Into<Value>, value: impl Into<Item>) -> TxResult<Option<Item>> {
        let (key, value) = (key.into(), value.into());
        self.check(&key, &value)?;
        self.cell.mutate(|current| {
            let mut entries = entries_of(current);
            let mut relinks = Relinks::new();
            if let Item::Bean(bean) = &value {
                relinks.attach(bean);
            }
            let old = entries.insert(key, value);
            if let Some(Item::Bean(bean)) = &old {
                relinks.detach(bean);
            }
            Ok(Edit::changed(FieldValue::Map(entries), relinks, old))
        })
    }

    /// Stores every entry. Either all entries are stored or, if any key or
    /// value is illegal, none is. When a key repeats, the last value wins.
    ///
    /// # Errors
    ///
    /// As [`MapField::put`].
    pub fn put_all<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>) -> TxResult<()>
    where
        K: Into<Value>,
        V: Into<Item>,
    {
        let pairs: Vec<(Value, Item)> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        for (key, value) in &pairs {
            self.check(key, value)?;
        }
        // A repeated key keeps its last value; earlier ones never enter the map.
        let incoming: HashMap<Value, Item> = pairs.into_iter().collect();
        if incoming.is_empty() {
            return Ok(());
        }

        self.cell.mutate(|current| {
            let mut map = entries_of(current);
            let mut relinks = Relinks::new();
            for (key, value) in incoming {
                if let Item::Bean(bean) = &value {
                    relinks.attach(bean);
                }
                if let Some(Item::Bean(old)) = map.insert(key, value) {
                    relinks.detach(&old);
                }
            }
            Ok(Edit::changed(FieldValue::Map(map), relinks, ()))
        })
    }

    /// Removes `key` and returns its value.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn remove(&self, key: impl Into<Value>) -> TxResult<Option<Item>> {
        let key = key.into();
        self.cell.mutate(|current| {
            let mut entries = entries_of(current);
            let Some(old) = entries.remove(&key) else {
                return Ok(Edit::Unchanged(None));
            };
            let mut relinks = Relinks::new();
            if let Item::Bean(bean) = &old {
                relinks.detach(bean);
            }
            Ok(Edit::changed(FieldValue::Map(entries), relinks, Some(old)))
        })
    }

    /// Removes every entry, detaching beans.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::NotInTransaction`](crate::TxError::NotInTransaction)
    /// outside a transaction without optional writes.
    pub fn clear(&self) -> TxResult<()> {
        self.cell.mutate(|current| {
            let entries = entries_of(current);
            if entries.is_empty() {
                return Ok(Edit::Unchanged(()));
            }
            let mut relinks = Relinks::new();
            for value in entries.values() {
                if let Item::Bean(bean) = value {
                    relinks.detach(bean);
                }
            }
            Ok(Edit::changed(FieldValue::Map(HashMap::new()), relinks, ()))
        })
    }
}

impl std::fmt::Debug for MapField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries().iter()).finish()
    }
}
