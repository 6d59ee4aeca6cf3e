//! Schema descriptors.
//!
//! These are what a schema code generator emits for each aggregate root and
//! embedded bean: a positional table of named, typed fields. They are plain
//! `'static` data so generated code can declare them as `static` items:
//!
//! ```
//! use txdata_core::{BeanSchema, DataSchema, ElemType, FieldDef, ScalarType};
//!
//! static ITEM: BeanSchema = BeanSchema {
//!     name: "Item",
//!     fields: &[
//!         FieldDef::scalar("id", ScalarType::Integer),
//!         FieldDef::scalar("count", ScalarType::Integer).range(0, 999),
//!     ],
//! };
//!
//! static ROLE: DataSchema = DataSchema {
//!     name: "role",
//!     id_field: 0,
//!     fields: &[
//!         FieldDef::scalar("id", ScalarType::Integer),
//!         FieldDef::map("items", ScalarType::Integer, ElemType::Bean(&ITEM)),
//!     ],
//! };
//!
//! assert!(ROLE.validate().is_ok());
//! ```

use crate::error::{TxError, TxResult, ValidationError};
use crate::value::Value;
use std::fmt;

/// Primitive scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Integer,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
}

impl ScalarType {
    /// Returns the type name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Bytes => "bytes",
        }
    }

    /// Returns the value a fresh field of this type holds.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Integer => Value::Integer(0),
            Self::Text => Value::Text(String::new()),
            Self::Bytes => Value::Bytes(Vec::new()),
        }
    }

    /// Returns true if this type may be used as a map key or set element.
    #[must_use]
    pub const fn is_primitive(self) -> bool {
        !matches!(self, Self::Bytes)
    }

    pub(crate) fn admits(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Bool, Value::Bool(_))
                | (Self::Integer, Value::Integer(_))
                | (Self::Text, Value::Text(_))
                | (Self::Bytes, Value::Bytes(_))
        )
    }

    /// Checks that `value` is a non-null value of this type.
    pub(crate) fn check(self, field: &'static str, value: &Value) -> Result<(), ValidationError> {
        if value.is_null() {
            return Err(ValidationError::NullValue { field });
        }
        if !self.admits(value) {
            return Err(ValidationError::TypeMismatch {
                field,
                expected: self.name(),
                found: value.type_name(),
            });
        }
        Ok(())
    }
}

/// Element type of a list or map value.
#[derive(Clone, Copy)]
pub enum ElemType {
    /// A primitive scalar.
    Scalar(ScalarType),
    /// An embedded bean of the given schema.
    Bean(&'static BeanSchema),
}

impl ElemType {
    /// Returns true if elements are beans.
    #[must_use]
    pub const fn is_bean(&self) -> bool {
        matches!(self, Self::Bean(_))
    }
}

impl fmt::Debug for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(t) => write!(f, "Scalar({})", t.name()),
            Self::Bean(schema) => write!(f, "Bean({})", schema.name),
        }
    }
}

/// The closed set of field kinds.
#[derive(Clone, Copy)]
pub enum FieldKind {
    /// A primitive scalar.
    Scalar(ScalarType),
    /// An optional embedded bean.
    Bean(&'static BeanSchema),
    /// An ordered list.
    List(ElemType),
    /// A set of primitive values.
    Set(ScalarType),
    /// A map from primitive keys to values.
    Map(ScalarType, ElemType),
}

impl FieldKind {
    /// Returns the kind name used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Bean(_) => "bean",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(..) => "map",
        }
    }

    /// Returns true if values of this kind can own beans.
    #[must_use]
    pub const fn holds_beans(&self) -> bool {
        match self {
            Self::Bean(_) => true,
            Self::List(elem) | Self::Map(_, elem) => elem.is_bean(),
            Self::Scalar(_) | Self::Set(_) => false,
        }
    }
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(t) => write!(f, "Scalar({})", t.name()),
            Self::Bean(schema) => write!(f, "Bean({})", schema.name),
            Self::List(elem) => write!(f, "List({elem:?})"),
            Self::Set(t) => write!(f, "Set({})", t.name()),
            Self::Map(k, v) => write!(f, "Map({}, {v:?})", k.name()),
        }
    }
}

/// A named, typed field at a fixed position.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Field name, used as the document key.
    pub name: &'static str,
    /// Field kind.
    pub kind: FieldKind,
    /// Inclusive integer range enforced on writes.
    pub range: Option<(i64, i64)>,
    /// Ignored fields are transactional but never persisted.
    pub ignore: bool,
}

impl FieldDef {
    /// Creates a field of any kind.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            range: None,
            ignore: false,
        }
    }

    /// Creates a scalar field.
    #[must_use]
    pub const fn scalar(name: &'static str, ty: ScalarType) -> Self {
        Self::new(name, FieldKind::Scalar(ty))
    }

    /// Creates a bean field.
    #[must_use]
    pub const fn bean(name: &'static str, schema: &'static BeanSchema) -> Self {
        Self::new(name, FieldKind::Bean(schema))
    }

    /// Creates a list field.
    #[must_use]
    pub const fn list(name: &'static str, elem: ElemType) -> Self {
        Self::new(name, FieldKind::List(elem))
    }

    /// Creates a set field.
    #[must_use]
    pub const fn set(name: &'static str, elem: ScalarType) -> Self {
        Self::new(name, FieldKind::Set(elem))
    }

    /// Creates a map field.
    #[must_use]
    pub const fn map(name: &'static str, key: ScalarType, value: ElemType) -> Self {
        Self::new(name, FieldKind::Map(key, value))
    }

    /// Restricts an integer scalar to `[min, max]`.
    #[must_use]
    pub const fn range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Marks the field as never persisted.
    #[must_use]
    pub const fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Checks a scalar value against this field's type and range.
    pub(crate) fn check_scalar(&self, ty: ScalarType, value: &Value) -> Result<(), ValidationError> {
        ty.check(self.name, value)?;
        if let (Some((min, max)), Value::Integer(n)) = (self.range, value) {
            if *n < min || *n > max {
                return Err(ValidationError::OutOfRange {
                    field: self.name,
                    value: *n,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    fn validate(&self, owner: &'static str, seen: &mut Vec<*const BeanSchema>) -> TxResult<()> {
        if let Some((min, max)) = self.range {
            if !matches!(self.kind, FieldKind::Scalar(ScalarType::Integer)) {
                return Err(TxError::invalid_schema(format!(
                    "{owner}.{}: range on a non-integer field",
                    self.name
                )));
            }
            if min > max {
                return Err(TxError::invalid_schema(format!(
                    "{owner}.{}: empty range [{min}, {max}]",
                    self.name
                )));
            }
        }

        let key = match self.kind {
            FieldKind::Set(key) | FieldKind::Map(key, _) => Some(key),
            _ => None,
        };
        if let Some(key) = key {
            if !key.is_primitive() {
                return Err(TxError::invalid_schema(format!(
                    "{owner}.{}: {} is not a primitive key type",
                    self.name,
                    key.name()
                )));
            }
        }

        let bean = match self.kind {
            FieldKind::Bean(schema)
            | FieldKind::List(ElemType::Bean(schema))
            | FieldKind::Map(_, ElemType::Bean(schema)) => Some(schema),
            _ => None,
        };
        match bean {
            Some(schema) => schema.validate_inner(seen),
            None => Ok(()),
        }
    }
}

/// Schema of an embedded composite value.
pub struct BeanSchema {
    /// Bean type name.
    pub name: &'static str,
    /// Positional field table.
    pub fields: &'static [FieldDef],
}

impl BeanSchema {
    /// Returns the position of the named field.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns true if both refer to the same schema.
    #[must_use]
    pub fn same(&'static self, other: &'static BeanSchema) -> bool {
        std::ptr::eq(self, other)
    }

    /// Validates the bean's field table.
    pub fn validate(&'static self) -> TxResult<()> {
        self.validate_inner(&mut Vec::new())
    }

    fn validate_inner(&'static self, seen: &mut Vec<*const BeanSchema>) -> TxResult<()> {
        let ptr: *const BeanSchema = self;
        if seen.contains(&ptr) {
            return Ok(());
        }
        seen.push(ptr);
        check_unique(self.name, self.fields)?;
        for def in self.fields {
            def.validate(self.name, seen)?;
        }
        Ok(())
    }
}

impl fmt::Debug for BeanSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanSchema")
            .field("name", &self.name)
            .field("fields", &self.fields.iter().map(|d| d.name).collect::<Vec<_>>())
            .finish()
    }
}

/// Schema of an aggregate root.
#[derive(Debug)]
pub struct DataSchema {
    /// Collection name used by accessors.
    pub name: &'static str,
    /// Position of the identity field.
    pub id_field: usize,
    /// Positional field table.
    pub fields: &'static [FieldDef],
}

impl DataSchema {
    /// Returns the position of the named field.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Validates the field table and the identity field.
    pub fn validate(&'static self) -> TxResult<()> {
        let id = self.fields.get(self.id_field).ok_or_else(|| {
            TxError::invalid_schema(format!(
                "{}: id position {} out of range",
                self.name, self.id_field
            ))
        })?;
        match id.kind {
            FieldKind::Scalar(ty) if ty.is_primitive() => {}
            _ => {
                return Err(TxError::invalid_schema(format!(
                    "{}: id field {} must be a primitive scalar",
                    self.name, id.name
                )))
            }
        }
        if id.ignore {
            return Err(TxError::invalid_schema(format!(
                "{}: id field {} cannot be ignored",
                self.name, id.name
            )));
        }

        check_unique(self.name, self.fields)?;
        let mut seen = Vec::new();
        for def in self.fields {
            def.validate(self.name, &mut seen)?;
        }
        Ok(())
    }
}

fn check_unique(owner: &'static str, fields: &[FieldDef]) -> TxResult<()> {
    for (i, def) in fields.iter().enumerate() {
        if fields[..i].iter().any(|other| other.name == def.name) {
            return Err(TxError::invalid_schema(format!(
                "{owner}: duplicate field {}",
                def.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    static NODE: BeanSchema = BeanSchema {
        name: "Node",
        fields: &[
            FieldDef::scalar("label", ScalarType::Text),
            FieldDef::list("children", ElemType::Bean(&NODE)),
        ],
    };

    static TREE: DataSchema = DataSchema {
        name: "tree",
        id_field: 0,
        fields: &[
            FieldDef::scalar("id", ScalarType::Integer),
            FieldDef::bean("root", &NODE),
        ],
    };

    static BAD_ID: DataSchema = DataSchema {
        name: "bad",
        id_field: 1,
        fields: &[
            FieldDef::scalar("a", ScalarType::Integer),
            FieldDef::set("b", ScalarType::Integer),
        ],
    };

    static BAD_KEY: DataSchema = DataSchema {
        name: "bad_key",
        id_field: 0,
        fields: &[
            FieldDef::scalar("id", ScalarType::Integer),
            FieldDef::map("m", ScalarType::Bytes, ElemType::Scalar(ScalarType::Integer)),
        ],
    };

    static BAD_RANGE: DataSchema = DataSchema {
        name: "bad_range",
        id_field: 0,
        fields: &[
            FieldDef::scalar("id", ScalarType::Integer),
            FieldDef::scalar("name", ScalarType::Text).range(0, 1),
        ],
    };

    #[test]
    fn recursive_bean_schema_validates() {
        assert!(TREE.validate().is_ok());
        assert_eq!(NODE.position("children"), Some(1));
    }

    #[test]
    fn id_field_must_be_scalar() {
        assert!(matches!(BAD_ID.validate(), Err(TxError::InvalidSchema { .. })));
    }

    #[test]
    fn map_keys_must_be_primitive() {
        assert!(BAD_KEY.validate().is_err());
    }

    #[test]
    fn ranges_only_on_integers() {
        assert!(BAD_RANGE.validate().is_err());
    }

    #[test]
    fn scalar_check_enforces_range() {
        let def = FieldDef::scalar("level", ScalarType::Integer).range(1, 10);
        assert!(def.check_scalar(ScalarType::Integer, &Value::from(5)).is_ok());
        assert!(matches!(
            def.check_scalar(ScalarType::Integer, &Value::from(11)),
            Err(ValidationError::OutOfRange { value: 11, .. })
        ));
        assert!(matches!(
            def.check_scalar(ScalarType::Integer, &Value::Null),
            Err(ValidationError::NullValue { .. })
        ));
        assert!(matches!(
            def.check_scalar(ScalarType::Integer, &Value::from("x")),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn debug_does_not_recurse_into_beans() {
        let rendered = format!("{:?}", NODE.fields[1].kind);
        assert_eq!(rendered, "List(Bean(Node))");
    }
}
