//! Test fixtures and store helpers.
//!
//! The schemas below stand in for generated entity types: a `team`
//! aggregate holding every field kind, and the `role` and `badge` beans
//! embedded in it.

use std::sync::{Arc, Once};
use txdata_core::{
    Bean, BeanField, BeanSchema, Composite, Config, Data, DataSchema, ElemType, FieldDef,
    ListField, MapField, MemoryAccessor, ScalarField, ScalarType, SetField, Store, TxError,
    Value,
};

/// A badge bean: a single label.
pub static BADGE: BeanSchema = BeanSchema {
    name: "badge",
    fields: &[FieldDef::scalar("label", ScalarType::Text)],
};

/// A role bean with a nested badge.
pub static ROLE: BeanSchema = BeanSchema {
    name: "role",
    fields: &[
        FieldDef::scalar("name", ScalarType::Text),
        FieldDef::scalar("level", ScalarType::Integer).range(0, 10),
        FieldDef::bean("badge", &BADGE),
    ],
};

/// The team aggregate.
pub static TEAM: DataSchema = DataSchema {
    name: "team",
    id_field: 0,
    fields: &[
        FieldDef::scalar("id", ScalarType::Integer),
        FieldDef::scalar("title", ScalarType::Text),
        FieldDef::list("members", ElemType::Bean(&ROLE)),
        FieldDef::set("tags", ScalarType::Text),
        FieldDef::map("scores", ScalarType::Text, ElemType::Scalar(ScalarType::Integer)),
        FieldDef::bean("lead", &ROLE),
        FieldDef::map("roles", ScalarType::Text, ElemType::Bean(&ROLE)),
        FieldDef::scalar("note", ScalarType::Text).ignored(),
    ],
};

/// Typed view of a `team` aggregate.
#[derive(Debug, Clone)]
pub struct Team(pub Data);

impl Team {
    /// Position of `title`.
    pub const TITLE: usize = 1;
    /// Position of `members`.
    pub const MEMBERS: usize = 2;
    /// Position of `tags`.
    pub const TAGS: usize = 3;
    /// Position of `scores`.
    pub const SCORES: usize = 4;
    /// Position of `lead`.
    pub const LEAD: usize = 5;
    /// Position of `roles`.
    pub const ROLES: usize = 6;
    /// Position of `note`.
    pub const NOTE: usize = 7;

    /// Creates a transient team.
    pub fn new(id: i64) -> Self {
        Self(Data::new(&TEAM, id).expect("team schema is valid"))
    }

    /// Returns the underlying aggregate.
    pub fn data(&self) -> &Data {
        &self.0
    }

    /// The `title` field.
    pub fn title(&self) -> ScalarField {
        self.0.scalar("title").expect("team.title")
    }

    /// The `members` field.
    pub fn members(&self) -> ListField {
        self.0.list("members").expect("team.members")
    }

    /// The `tags` field.
    pub fn tags(&self) -> SetField {
        self.0.set("tags").expect("team.tags")
    }

    /// The `scores` field.
    pub fn scores(&self) -> MapField {
        self.0.map("scores").expect("team.scores")
    }

    /// The `lead` field.
    pub fn lead(&self) -> BeanField {
        self.0.bean("lead").expect("team.lead")
    }

    /// The `roles` field.
    pub fn roles(&self) -> MapField {
        self.0.map("roles").expect("team.roles")
    }

    /// The ignored `note` field.
    pub fn note(&self) -> ScalarField {
        self.0.scalar("note").expect("team.note")
    }
}

/// Typed view of a `role` bean.
#[derive(Debug, Clone)]
pub struct Role(pub Bean);

impl Role {
    /// Creates a detached role without a badge.
    pub fn new(name: &str, level: i64) -> Self {
        let value = Value::map(vec![
            (Value::from("name"), Value::from(name)),
            (Value::from("level"), Value::from(level)),
        ]);
        Self(Bean::from_value(&ROLE, &value).expect("role document is valid"))
    }

    /// Creates a detached role wearing a badge.
    pub fn with_badge(name: &str, level: i64, label: &str) -> Self {
        let badge = Value::map(vec![(Value::from("label"), Value::from(label))]);
        let value = Value::map(vec![
            (Value::from("name"), Value::from(name)),
            (Value::from("level"), Value::from(level)),
            (Value::from("badge"), badge),
        ]);
        Self(Bean::from_value(&ROLE, &value).expect("role document is valid"))
    }

    /// Returns the underlying bean.
    pub fn bean(&self) -> &Bean {
        &self.0
    }

    /// The `name` field.
    pub fn name(&self) -> ScalarField {
        self.0.scalar("name").expect("role.name")
    }

    /// The `level` field.
    pub fn level(&self) -> ScalarField {
        self.0.scalar("level").expect("role.level")
    }

    /// The `badge` field.
    pub fn badge(&self) -> BeanField {
        self.0.bean("badge").expect("role.badge")
    }
}

/// A store backed by a [`MemoryAccessor`].
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    /// The accessor receiving committed writes.
    pub backend: Arc<MemoryAccessor>,
}

impl TestStore {
    /// Creates a store with inline dispatch.
    pub fn memory() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a store with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let backend = Arc::new(MemoryAccessor::new());
        Self {
            store: Store::open(backend.clone(), config),
            backend,
        }
    }

    /// Inserts a new team with a title and commits it.
    pub fn persisted_team(&self, id: i64, title: &str) -> Team {
        let team = Team::new(id);
        self.store
            .run(|| {
                self.store.insert(team.data())?;
                team.title().set(title)
            })
            .expect("failed to persist team");
        self.store.flush();
        team
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a fresh memory-backed store.
///
/// # Example
///
/// ```rust
/// use txdata_testkit::{with_store, Team};
///
/// with_store(|store| {
///     let team = store.persisted_team(1, "core");
///     assert_eq!(team.title().get().as_str(), Some("core"));
/// });
/// ```
pub fn with_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    init_test_tracing();
    let store = TestStore::memory();
    f(&store)
}

/// Runs `task` in a transaction that is rolled back at the end.
pub fn rolled_back<R>(store: &Store, task: impl FnOnce() -> Result<R, TxError>) -> Result<R, TxError> {
    let scope = store.begin(false)?;
    let result = task();
    scope.fail();
    scope.end();
    result
}

/// Installs a `tracing` subscriber for tests, once per process.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use txdata_core::DataState;

    #[test]
    fn fixture_schemas_are_valid() {
        TEAM.validate().unwrap();
        ROLE.validate().unwrap();
        BADGE.validate().unwrap();
    }

    #[test]
    fn persisted_team_is_written() {
        with_store(|store| {
            let team = store.persisted_team(1, "core");
            assert_eq!(team.data().state(), DataState::Update);
            let doc = store.backend.get(&team.data().record_key()).unwrap();
            assert_eq!(doc.get("title"), Some(&Value::from("core")));
            assert!(!doc.contains_key("note"));
        });
    }

    #[test]
    fn role_with_badge_nests() {
        let role = Role::with_badge("lead", 3, "gold");
        let badge = role.badge().get().unwrap();
        assert_eq!(badge.scalar("label").unwrap().get(), Value::from("gold"));
        assert!(badge.attachment().is_detached());
    }
}
