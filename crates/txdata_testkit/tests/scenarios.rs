//! End-to-end transaction scenarios.

use txdata_core::{depth, is_inside, rollback, Config, Item, TxError, Value};
use txdata_testkit::{init_test_tracing, Team, TestStore};

#[test]
fn map_put_is_discarded_by_rollback() {
    init_test_tracing();
    let store = TestStore::memory();
    let team = store.persisted_team(1, "alpha");
    let scores = team.scores();
    assert!(scores.is_empty());

    let scope = store.begin(false).unwrap();
    scores.put("a", 1).unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores.get("a"), Some(Item::from(1)));
    rollback().unwrap();
    scope.end();

    assert!(!is_inside());
    assert!(scores.is_empty());
    assert_eq!(store.backend.write_count(), 1);
}

#[test]
fn nested_rollback_keeps_outer_write() {
    init_test_tracing();
    let store = TestStore::memory();
    let team = store.persisted_team(2, "initial");
    let title = team.title();

    let outer = store.begin(false).unwrap();
    title.set("X").unwrap();

    let nested = store.begin(true).unwrap();
    assert_eq!(nested.depth(), 2);
    title.set("Y").unwrap();
    assert_eq!(title.get(), Value::from("Y"));
    rollback().unwrap();
    nested.end();

    assert_eq!(title.get(), Value::from("X"));
    assert_eq!(team.data().committed_state(), txdata_core::DataState::Update);
    outer.end();

    assert_eq!(title.get(), Value::from("X"));
    let doc = store.backend.get(&team.data().record_key()).unwrap();
    assert_eq!(doc.get("title"), Some(&Value::from("X")));
}

#[test]
fn ninth_begin_is_too_deep() {
    init_test_tracing();
    let store = TestStore::memory();
    let team = store.persisted_team(3, "steady");
    let writes = store.backend.write_count();

    let mut scopes = vec![store.begin(false).unwrap()];
    for _ in 1..8 {
        scopes.push(store.begin(true).unwrap());
    }
    assert_eq!(depth(), 8);

    let err = store.begin(true).err();
    assert_eq!(err, Some(TxError::NestingTooDeep { depth: 9, limit: 8 }));
    assert_eq!(depth(), 8);
    assert!(!scopes.last().unwrap().is_failed());

    while let Some(scope) = scopes.pop() {
        scope.end();
    }
    assert!(!is_inside());
    assert_eq!(team.title().get(), Value::from("steady"));
    assert_eq!(store.backend.write_count(), writes);
}

#[test]
fn configured_nesting_limit_applies() {
    let store = TestStore::with_config(Config::new().max_nesting(2));
    let outer = store.begin(false).unwrap();
    let inner = store.begin(true).unwrap();
    assert_eq!(
        store.begin(true).err(),
        Some(TxError::NestingTooDeep { depth: 3, limit: 2 })
    );
    inner.end();
    outer.end();
}

#[test]
fn non_nested_begin_inside_transaction_fails() {
    let store = TestStore::memory();
    let outer = store.begin(false).unwrap();
    assert_eq!(store.begin(false).err(), Some(TxError::AlreadyInTransaction));
    assert_eq!(depth(), 1);
    outer.end();
}

#[test]
fn run_nested_without_transaction_starts_one() {
    let store = TestStore::memory();
    let team = store.persisted_team(4, "solo");
    store
        .run_nested(|| {
            assert_eq!(depth(), 1);
            team.title().set("nested-first")
        })
        .unwrap();
    assert_eq!(team.title().get(), Value::from("nested-first"));
}

#[test]
fn run_propagates_task_error_unchanged() {
    let store = TestStore::memory();
    let team = store.persisted_team(5, "keep");

    #[derive(Debug, PartialEq)]
    enum AppError {
        Tx(TxError),
        Refused,
    }
    impl From<TxError> for AppError {
        fn from(err: TxError) -> Self {
            Self::Tx(err)
        }
    }

    let result: Result<(), AppError> = store.run(|| {
        team.title().set("changed")?;
        Err(AppError::Refused)
    });
    assert_eq!(result, Err(AppError::Refused));
    assert_eq!(team.title().get(), Value::from("keep"));
}

#[test]
fn panicking_task_fails_and_ends_scope() {
    let store = TestStore::memory();
    let team = store.persisted_team(6, "calm");

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<(), TxError> = store.run(|| {
            team.title().set("panicked")?;
            panic!("task blew up");
        });
    }));

    assert!(outcome.is_err());
    assert!(!is_inside());
    assert_eq!(team.title().get(), Value::from("calm"));
}

#[test]
fn mutation_outside_transaction_is_rejected() {
    let team = Team::new(7);
    assert_eq!(team.title().set("x"), Err(TxError::NotInTransaction));
    assert_eq!(rollback(), Err(TxError::NotInTransaction));
    assert_eq!(team.title().get(), Value::from(""));
}

#[test]
#[should_panic(expected = "ended while the active depth is")]
fn ending_outer_scope_first_panics() {
    let store = TestStore::memory();
    let outer = store.begin(false).unwrap();
    let _inner = store.begin(true).unwrap();
    outer.end();
}
