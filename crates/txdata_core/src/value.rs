//! Dynamic field values.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A rendered entity: field name to value.
pub type Document = BTreeMap<String, Value>;

/// A dynamic value.
///
/// Scalars, rendered beans and rendered collections all use this type.
/// Floats are intentionally not supported: values must be usable as map keys
/// and set elements, which needs total equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of key-value pairs (kept sorted by canonical key order).
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Creates a map value with sorted keys.
    pub fn map(mut pairs: Vec<(Value, Value)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp_canonical(&b.0));
        Value::Map(pairs)
    }

    /// Creates an array value sorted by canonical order.
    ///
    /// Used to render sets deterministically.
    pub fn sorted_array(mut items: Vec<Value>) -> Self {
        items.sort_by(Value::cmp_canonical);
        Value::Array(items)
    }

    /// Creates a map value from a document.
    pub fn from_document(document: Document) -> Self {
        Value::map(
            document
                .into_iter()
                .map(|(k, v)| (Value::Text(k), v))
                .collect(),
        )
    }

    /// Compares two values for canonical ordering.
    ///
    /// Values of different kinds order by kind; same-kind values order
    /// length-first for strings, bytes and containers, numerically for integers.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let rank = self.rank().cmp(&other.rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| x.cmp_canonical(y))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
            (Value::Map(a), Value::Map(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b.iter())
                    .map(|((ak, av), (bk, bv))| ak.cmp_canonical(bk).then_with(|| av.cmp_canonical(bv)))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
            _ => Ordering::Equal,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Text(_) => 3,
            Value::Bytes(_) => 4,
            Value::Array(_) => 5,
            Value::Map(_) => 6,
        }
    }

    /// Returns the name of this value's kind.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Returns true for null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for bool, integer and text, the types usable as keys.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Integer(_) | Value::Text(_))
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the text, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the array items, if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the map entries, if this is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Looks up a text key in a map value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_sorts_keys() {
        let value = Value::map(vec![
            (Value::from("bb"), Value::from(2)),
            (Value::from("a"), Value::from(1)),
        ]);
        let keys: Vec<_> = value
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["a", "bb"]);
    }

    #[test]
    fn canonical_order_is_kind_first() {
        assert_eq!(
            Value::Bool(true).cmp_canonical(&Value::Integer(0)),
            Ordering::Less
        );
        assert_eq!(
            Value::Integer(-5).cmp_canonical(&Value::Integer(3)),
            Ordering::Less
        );
        assert_eq!(
            Value::from("zz").cmp_canonical(&Value::from("aaa")),
            Ordering::Less
        );
    }

    #[test]
    fn sorted_array_is_deterministic() {
        let a = Value::sorted_array(vec![Value::from(3), Value::from(1), Value::from(2)]);
        assert_eq!(
            a,
            Value::Array(vec![Value::from(1), Value::from(2), Value::from(3)])
        );
    }

    #[test]
    fn primitive_kinds() {
        assert!(Value::from(1).is_primitive());
        assert!(Value::from("k").is_primitive());
        assert!(!Value::Null.is_primitive());
        assert!(!Value::Bytes(vec![1]).is_primitive());
    }

    #[test]
    fn get_reads_text_keys() {
        let doc = Value::map(vec![(Value::from("name"), Value::from("alice"))]);
        assert_eq!(doc.get("name"), Some(&Value::from("alice")));
        assert_eq!(doc.get("missing"), None);
    }
}
