//! # txdata Core
//!
//! Nested-transaction engine for in-process entity graphs.
//!
//! This crate provides:
//! - Aggregate roots ([`Data`]) and embedded composites ([`Bean`]) built
//!   from static schema descriptors
//! - Transactional fields: scalars, bean references, lists, sets and maps
//! - Per-thread transactions with up to eight levels of savepoint nesting
//! - Owner/position tracking for every bean, rolled back with its transaction
//! - Minimal write batches per accessor at commit
//! - Transaction listeners for success, failure and completion
//!
//! ## Example
//!
//! ```rust
//! use txdata_core::{Composite, Data, DataSchema, FieldDef, ScalarType, Store, TxError};
//!
//! static ACCOUNT: DataSchema = DataSchema {
//!     name: "account",
//!     id_field: 0,
//!     fields: &[
//!         FieldDef::scalar("id", ScalarType::Text),
//!         FieldDef::scalar("balance", ScalarType::Integer),
//!     ],
//! };
//!
//! let store = Store::default();
//! let account = Data::new(&ACCOUNT, "acc-1").unwrap();
//! let balance = account.scalar("balance").unwrap();
//!
//! store
//!     .run(|| {
//!         store.insert(&account)?;
//!         balance.set(100)?;
//!
//!         // A failed nested scope is rolled back on its own.
//!         let nested: Result<(), TxError> = store.run_nested(|| {
//!             balance.set(-5)?;
//!             Err(TxError::invalid_schema("overdrawn"))
//!         });
//!         assert!(nested.is_err());
//!         assert_eq!(balance.get().as_i64(), Some(100));
//!         Ok::<_, TxError>(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(balance.get().as_i64(), Some(100));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accessor;
mod config;
mod dirty;
mod entity;
mod error;
mod field;
mod schema;
mod store;
mod transaction;
mod types;
mod value;

pub use accessor::{Accessor, MemoryAccessor, Record, RecordKey, WriteBatch};
pub use config::{
    is_optional, set_global_optional, set_local_optional, Config, DispatchMode,
    SAVEPOINT_CAPACITY,
};
pub use dirty::DirtySet;
pub use entity::{Bean, Composite, Data};
pub use error::{AccessorError, AccessorResult, TxError, TxResult, ValidationError};
pub use field::{BeanField, Field, Item, ListField, MapField, ScalarField, SetField};
pub use schema::{BeanSchema, DataSchema, ElemType, FieldDef, FieldKind, ScalarType};
pub use store::Store;
pub use transaction::{
    depth, is_inside, on_failed, on_finished, on_succeeded, rollback, Scope, When,
};
pub use types::{Attachment, DataId, DataState, FieldId, NodeId};
pub use value::{Document, Value};

/// Re-exported persistent collection types returned by collection fields.
pub mod collections {
    pub use imbl::{HashMap, HashSet, Vector};
}
