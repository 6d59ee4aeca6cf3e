//! Collection elements.

use crate::entity::Bean;
use crate::error::ValidationError;
use crate::schema::{ElemType, ScalarType};
use crate::transaction::Transaction;
use crate::types::Attachment;
use crate::value::Value;

/// An element of a list or a value of a map: a primitive or a bean.
///
/// Beans compare by identity, primitives by value.
#[derive(Debug, Clone)]
pub enum Item {
    /// A primitive value.
    Value(Value),
    /// An embedded bean.
    Bean(Bean),
}

impl Item {
    /// Returns the primitive, if this is one.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Item::Value(value) => Some(value),
            Item::Bean(_) => None,
        }
    }

    /// Returns the bean, if this is one.
    #[must_use]
    pub fn as_bean(&self) -> Option<&Bean> {
        match self {
            Item::Bean(bean) => Some(bean),
            Item::Value(_) => None,
        }
    }

    /// Converts into the bean, if this is one.
    #[must_use]
    pub fn into_bean(self) -> Option<Bean> {
        match self {
            Item::Bean(bean) => Some(bean),
            Item::Value(_) => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    pub(crate) fn render(&self, tx: Option<&Transaction>) -> Value {
        match self {
            Item::Value(value) => value.clone(),
            Item::Bean(bean) => bean.render(tx),
        }
    }

    /// Checks that this item may be stored in a collection of `elem`.
    pub(crate) fn check(&self, field: &'static str, elem: ElemType) -> Result<(), ValidationError> {
        match (elem, self) {
            (ElemType::Scalar(ty), Item::Value(value)) => ty.check(field, value),
            (ElemType::Scalar(ty), Item::Bean(_)) => Err(ValidationError::TypeMismatch {
                field,
                expected: ty.name(),
                found: "bean",
            }),
            (ElemType::Bean(schema), Item::Bean(bean)) => {
                if std::ptr::eq(schema, bean.schema()) {
                    Ok(())
                } else {
                    Err(ValidationError::BeanSchemaMismatch {
                        field,
                        expected: schema.name,
                        found: bean.schema().name,
                    })
                }
            }
            (ElemType::Bean(_), Item::Value(Value::Null)) => Err(ValidationError::NullValue { field }),
            (ElemType::Bean(schema), Item::Value(value)) => Err(ValidationError::TypeMismatch {
                field,
                expected: schema.name,
                found: value.type_name(),
            }),
        }
    }

    pub(crate) fn parse(
        field: &'static str,
        elem: ElemType,
        value: &Value,
        at: Attachment,
    ) -> Result<Self, ValidationError> {
        match elem {
            ElemType::Scalar(ty) => {
                ty.check(field, value)?;
                Ok(Item::Value(value.clone()))
            }
            ElemType::Bean(schema) => Ok(Item::Bean(Bean::parse(schema, value, at)?)),
        }
    }
}

/// Checks a map key or set element.
pub(crate) fn check_key(field: &'static str, ty: ScalarType, key: &Value) -> Result<(), ValidationError> {
    if key.is_null() {
        return Err(ValidationError::NullValue { field });
    }
    if !key.is_primitive() {
        return Err(ValidationError::IllegalKey {
            field,
            found: key.type_name(),
        });
    }
    if !ty.admits(key) {
        return Err(ValidationError::TypeMismatch {
            field,
            expected: ty.name(),
            found: key.type_name(),
        });
    }
    Ok(())
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Item::Value(a), Item::Value(b)) => a == b,
            (Item::Bean(a), Item::Bean(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Item {}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        Item::Value(value)
    }
}

impl From<Bean> for Item {
    fn from(bean: Bean) -> Self {
        Item::Bean(bean)
    }
}

impl From<&Bean> for Item {
    fn from(bean: &Bean) -> Self {
        Item::Bean(bean.clone())
    }
}

impl From<bool> for Item {
    fn from(b: bool) -> Self {
        Item::Value(Value::Bool(b))
    }
}

impl From<i64> for Item {
    fn from(n: i64) -> Self {
        Item::Value(Value::Integer(n))
    }
}

impl From<i32> for Item {
    fn from(n: i32) -> Self {
        Item::Value(Value::from(n))
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Item::Value(Value::from(s))
    }
}

impl From<String> for Item {
    fn from(s: String) -> Self {
        Item::Value(Value::Text(s))
    }
}
