//! The resident aggregate registry and transaction entry points.

use crate::accessor::{Accessor, Dispatcher, WriteBatch};
use crate::config::{self, Config};
use crate::entity::Data;
use crate::error::{TxError, TxResult};
use crate::schema::DataSchema;
use crate::transaction::{self, with_current, DataLog, Scope};
use crate::types::{DataId, DataState};
use crate::value::{Document, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub(crate) struct StoreInner {
    config: Config,
    accessor: Option<Arc<dyn Accessor>>,
    resident: RwLock<HashMap<DataId, Data>>,
    dispatcher: Dispatcher,
}

impl StoreInner {
    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn resident(&self, id: DataId) -> Option<Data> {
        self.resident.read().get(&id).cloned()
    }

    pub(crate) fn register(&self, data: &Data) {
        self.resident.write().insert(data.id(), data.clone());
    }

    pub(crate) fn unregister(&self, id: DataId) {
        self.resident.write().remove(&id);
    }

    pub(crate) fn dispatch(&self, accessor: Arc<dyn Accessor>, batch: WriteBatch) {
        self.dispatcher.dispatch(accessor, batch);
    }
}

/// An in-memory transactional store of aggregate roots.
///
/// The store is the identity map of persisted aggregates: each resident
/// [`Data`] is addressed by its [`DataId`], and beans refer to their owner
/// by that ID. Transactions are bound to the store they were opened on.
///
/// Committed lifecycle changes and field patches are handed to the store's
/// accessor, if it has one.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use txdata_core::{Composite, Config, Data, DataSchema, FieldDef, MemoryAccessor, ScalarType, Store};
///
/// static USER: DataSchema = DataSchema {
///     name: "user",
///     id_field: 0,
///     fields: &[
///         FieldDef::scalar("id", ScalarType::Integer),
///         FieldDef::scalar("name", ScalarType::Text),
///     ],
/// };
///
/// let backend = Arc::new(MemoryAccessor::new());
/// let store = Store::open(backend.clone(), Config::default());
/// let user = Data::new(&USER, 1).unwrap();
///
/// store
///     .run(|| {
///         store.insert(&user)?;
///         user.scalar("name")?.set("alice")
///     })
///     .unwrap();
///
/// assert_eq!(backend.len("user"), 1);
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Creates a store with no accessor; commits stay in memory.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::build(None, config)
    }

    /// Creates a store that writes committed changes to `accessor`.
    #[must_use]
    pub fn open(accessor: Arc<dyn Accessor>, config: Config) -> Self {
        Self::build(Some(accessor), config)
    }

    fn build(accessor: Option<Arc<dyn Accessor>>, config: Config) -> Self {
        let dispatcher = Dispatcher::new(config.dispatch);
        Self {
            inner: Arc::new(StoreInner {
                config,
                accessor,
                resident: RwLock::new(HashMap::new()),
                dispatcher,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<StoreInner> {
        &self.inner
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the store's accessor.
    #[must_use]
    pub fn accessor(&self) -> Option<Arc<dyn Accessor>> {
        self.inner.accessor.clone()
    }

    /// Opens a transaction scope on this thread.
    ///
    /// With no active transaction this starts one. With one active,
    /// `nested = true` opens a savepoint-backed nested scope and
    /// `nested = false` fails.
    ///
    /// # Errors
    ///
    /// - [`TxError::AlreadyInTransaction`] for a non-nested begin inside a
    ///   transaction
    /// - [`TxError::NestingTooDeep`] when the nesting limit is reached
    /// - [`TxError::ForeignStore`] when the active transaction belongs to
    ///   another store
    pub fn begin(&self, nested: bool) -> TxResult<Scope> {
        transaction::begin(&self.inner, nested)
    }

    /// Runs `task` in a new outermost transaction.
    ///
    /// If `task` returns an error or panics the transaction is marked
    /// failed and the failure is passed on unchanged. The scope is ended on
    /// every path.
    ///
    /// # Errors
    ///
    /// Returns the task's error, or the begin error converted into `E`.
    pub fn run<R, E, F>(&self, task: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
        E: From<TxError>,
    {
        self.run_scoped(false, task)
    }

    /// Runs `task` in a nested transaction, or a new one if none is active.
    ///
    /// # Errors
    ///
    /// As [`Store::run`].
    pub fn run_nested<R, E, F>(&self, task: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
        E: From<TxError>,
    {
        self.run_scoped(true, task)
    }

    fn run_scoped<R, E, F>(&self, nested: bool, task: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
        E: From<TxError>,
    {
        let scope = self.begin(nested)?;
        let result = task();
        if result.is_err() {
            scope.fail();
        }
        scope.end();
        result
    }

    /// Inserts a transient aggregate.
    ///
    /// Inside a transaction the insert is pending until commit. Outside one,
    /// with optional writes enabled, it takes effect and is written
    /// immediately.
    ///
    /// # Errors
    ///
    /// - [`TxError::InvalidLifecycle`] unless the aggregate is transient
    /// - [`TxError::NotInTransaction`] outside a transaction without
    ///   optional writes
    /// - [`TxError::ForeignStore`] when the active transaction belongs to
    ///   another store
    pub fn insert(&self, data: &Data) -> TxResult<()> {
        self.change_lifecycle(data, DataState::Insert)
    }

    /// Deletes a live aggregate.
    ///
    /// Delete is terminal: the aggregate cannot be inserted again in the same
    /// transaction, and later field mutations have no persistence effect.
    ///
    /// # Errors
    ///
    /// As [`Store::insert`], with [`TxError::InvalidLifecycle`] unless the
    /// aggregate is inserted or persisted.
    pub fn delete(&self, data: &Data) -> TxResult<()> {
        self.change_lifecycle(data, DataState::Delete)
    }

    fn change_lifecycle(&self, data: &Data, target: DataState) -> TxResult<()> {
        let operation = match target {
            DataState::Insert => "insert",
            _ => "delete",
        };
        let allowed = |state: DataState| match target {
            DataState::Insert => state == DataState::None,
            _ => state.is_live(),
        };

        let logged = with_current(|tx| {
            let tx = tx?;
            if !tx.belongs_to(&self.inner) {
                return Some(Err(TxError::ForeignStore));
            }
            let state = data.state_in(Some(&*tx));
            if !allowed(state) {
                return Some(Err(TxError::invalid_lifecycle(data.id(), state, operation)));
            }
            let accessor = tx
                .data_log(data.id())
                .and_then(|log| log.accessor.clone())
                .or_else(|| data.accessor())
                .or_else(|| self.inner.accessor.clone());
            tx.set_data_log(DataLog::new(data.clone(), accessor, target));
            Some(Ok(()))
        });
        if let Some(result) = logged {
            return result;
        }

        if !config::is_optional() {
            return Err(TxError::NotInTransaction);
        }
        let state = data.committed_state();
        if !allowed(state) {
            return Err(TxError::invalid_lifecycle(data.id(), state, operation));
        }
        let accessor = data.accessor().or_else(|| self.inner.accessor.clone());
        let log = DataLog::new(data.clone(), accessor, target);
        let intent = data.commit(&log);
        match target {
            DataState::Insert => self.inner.register(data),
            _ => self.inner.unregister(data.id()),
        }
        debug!(data = %data.id(), operation, "lifecycle change applied outside a transaction");
        if let (Some(intent), Some(accessor)) = (intent, log.accessor) {
            let mut batch = WriteBatch::new();
            batch.push(intent);
            self.inner.dispatch(accessor, batch);
        }
        Ok(())
    }

    /// Rebuilds a persisted aggregate from a stored document and makes it
    /// resident.
    ///
    /// If an aggregate of the same schema and key is already resident, that
    /// one is returned and the document is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is invalid or the document does not
    /// match it.
    pub fn load(&self, schema: &'static DataSchema, document: &Document) -> TxResult<Data> {
        if let Some(key) = schema
            .fields
            .get(schema.id_field)
            .and_then(|def| document.get(def.name))
        {
            if let Some(existing) = self.find(schema, key.clone()) {
                return Ok(existing);
            }
        }

        let data = Data::parse(schema, document)?;
        let log = DataLog::new(data.clone(), self.inner.accessor.clone(), DataState::Update);
        data.commit(&log);
        self.inner.register(&data);
        Ok(data)
    }

    /// Returns the resident aggregate with this ID.
    #[must_use]
    pub fn get(&self, id: DataId) -> Option<Data> {
        self.inner.resident(id)
    }

    /// Finds a resident aggregate by schema and key.
    #[must_use]
    pub fn find(&self, schema: &'static DataSchema, key: impl Into<Value>) -> Option<Data> {
        let key = key.into();
        let candidates: Vec<Data> = self
            .inner
            .resident
            .read()
            .values()
            .filter(|data| std::ptr::eq(data.schema(), schema))
            .cloned()
            .collect();
        candidates.into_iter().find(|data| data.key() == key)
    }

    /// Stops tracking an aggregate. Returns false if it was not resident.
    ///
    /// The aggregate stays persisted: `get` and `find` no longer return it,
    /// but its committed field mutations still reach its accessor.
    pub fn evict(&self, data: &Data) -> bool {
        self.inner.resident.write().remove(&data.id()).is_some()
    }

    /// Returns the number of resident aggregates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.resident.read().len()
    }

    /// Returns true if no aggregate is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until every write batch dispatched so far was delivered.
    ///
    /// A no-op for inline dispatch.
    pub fn flush(&self) {
        self.inner.dispatcher.flush();
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.inner.config)
            .field("resident", &self.len())
            .field("accessor", &self.inner.accessor.is_some())
            .finish()
    }
}
