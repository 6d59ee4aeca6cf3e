//! Error types for txdata core.

use crate::types::{DataId, DataState};
use thiserror::Error;

/// Result type for core operations.
pub type TxResult<T> = Result<T, TxError>;

/// Result type for accessor writes.
pub type AccessorResult<T> = Result<T, AccessorError>;

/// Errors that can occur in transaction, field and lifecycle operations.
///
/// These are expected conditions the caller can branch on. Broken internal
/// invariants (for example ending transaction scopes out of order) panic
/// instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// The operation needs an active transaction and none is active.
    #[error("not in a transaction")]
    NotInTransaction,

    /// A non-nested transaction was requested while one is already active.
    #[error("already in a transaction")]
    AlreadyInTransaction,

    /// A nested transaction would exceed the savepoint capacity.
    #[error("nesting too deep: depth {depth} exceeds limit {limit}")]
    NestingTooDeep {
        /// Depth the rejected begin would have reached.
        depth: usize,
        /// Configured nesting limit.
        limit: usize,
    },

    /// The active transaction belongs to a different store.
    #[error("the active transaction belongs to another store")]
    ForeignStore,

    /// A lifecycle operation is not valid in the aggregate's current state.
    #[error("cannot {operation} {data} in state {state:?}")]
    InvalidLifecycle {
        /// The aggregate.
        data: DataId,
        /// Its effective lifecycle state.
        state: DataState,
        /// The rejected operation.
        operation: &'static str,
    },

    /// No field with this name exists in the schema.
    #[error("unknown field {name} in {schema}")]
    UnknownField {
        /// Schema that was searched.
        schema: &'static str,
        /// Requested field name.
        name: String,
    },

    /// The field exists but holds a different kind of value.
    #[error("field {field} is not a {expected} field")]
    KindMismatch {
        /// Field name.
        field: &'static str,
        /// Kind that was requested.
        expected: &'static str,
    },

    /// A schema descriptor is inconsistent.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },

    /// A value was rejected before any log was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl TxError {
    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid lifecycle error.
    pub fn invalid_lifecycle(data: DataId, state: DataState, operation: &'static str) -> Self {
        Self::InvalidLifecycle {
            data,
            state,
            operation,
        }
    }

    /// Creates a kind mismatch error.
    pub fn kind_mismatch(field: &'static str, expected: &'static str) -> Self {
        Self::KindMismatch { field, expected }
    }
}

/// Illegal keys, values or documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Null is never a legal field, key or element value.
    #[error("null value for field {field}")]
    NullValue {
        /// Field name.
        field: &'static str,
    },

    /// The value has the wrong type for the field.
    #[error("field {field} expects {expected}, found {found}")]
    TypeMismatch {
        /// Field name.
        field: &'static str,
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        found: &'static str,
    },

    /// An integer is outside the declared range.
    #[error("value {value} for field {field} is outside [{min}, {max}]")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Rejected value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },

    /// Map keys must be primitive.
    #[error("illegal key of type {found} for field {field}")]
    IllegalKey {
        /// Field name.
        field: &'static str,
        /// Actual type name.
        found: &'static str,
    },

    /// A bean of the wrong schema was stored.
    #[error("field {field} expects bean {expected}, found {found}")]
    BeanSchemaMismatch {
        /// Field name.
        field: &'static str,
        /// Expected bean schema name.
        expected: &'static str,
        /// Actual bean schema name.
        found: &'static str,
    },

    /// A list index is out of bounds.
    #[error("index {index} out of bounds for field {field} of length {len}")]
    IndexOutOfBounds {
        /// Field name.
        field: &'static str,
        /// Requested index.
        index: usize,
        /// Current length.
        len: usize,
    },

    /// A document does not match its schema.
    #[error("malformed document: {message}")]
    MalformedDocument {
        /// Description of the mismatch.
        message: String,
    },
}

impl ValidationError {
    /// Creates a malformed document error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: message.into(),
        }
    }
}

/// Errors reported by a durable-store accessor.
///
/// The engine logs these and never propagates them to the committing caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessorError {
    /// The backing store could not be reached.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The store refused part of the batch.
    #[error("write rejected: {message}")]
    Rejected {
        /// Description of the rejection.
        message: String,
    },

    /// The accessor was closed and no longer accepts writes.
    #[error("accessor is closed")]
    Closed,
}

impl AccessorError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a rejected error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}
