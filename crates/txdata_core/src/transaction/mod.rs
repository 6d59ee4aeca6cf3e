//! Nested transactions over the in-memory object graph.
//!
//! Each thread has at most one active transaction. Mutations inside it are
//! recorded as shadow logs (per aggregate root, per node and per field) and
//! only become the committed baseline when the outermost scope ends
//! successfully:
//! - **Isolation**: other threads keep reading baselines until commit
//! - **Nesting**: inner scopes roll back independently through savepoints
//! - **Persistence**: committed changes are handed to accessors, best effort
//!
//! Scopes are opened through [`Store::begin`](crate::Store::begin) or the
//! [`Store::run`](crate::Store::run) helpers.

mod manager;
mod scope;
mod state;

pub(crate) use manager::Transaction;
pub(crate) use scope::{begin, read_current, with_current};
pub use scope::{depth, is_inside, on_failed, on_finished, on_succeeded, rollback, Scope};
pub(crate) use state::DataLog;
pub use state::When;
