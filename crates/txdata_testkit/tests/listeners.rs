//! Transaction listeners and their reclassification by failed inner scopes.

use std::cell::RefCell;
use std::rc::Rc;
use txdata_core::{is_inside, on_failed, on_finished, on_succeeded, rollback, TxError, Value};
use txdata_testkit::{init_test_tracing, TestStore};

type Log = Rc<RefCell<Vec<&'static str>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn register(log: &Log, name: &'static str) -> Result<(), TxError> {
    let (a, b, c) = (log.clone(), log.clone(), log.clone());
    on_succeeded(move || a.borrow_mut().push(name))?;
    on_failed(move || b.borrow_mut().push(name))?;
    on_finished(move || c.borrow_mut().push(name))
}

#[test]
fn registration_outside_transaction_fails() {
    assert_eq!(on_succeeded(|| {}), Err(TxError::NotInTransaction));
    assert_eq!(on_failed(|| {}), Err(TxError::NotInTransaction));
    assert_eq!(on_finished(|| {}), Err(TxError::NotInTransaction));
}

#[test]
fn listeners_run_in_registration_order() {
    init_test_tracing();
    let store = TestStore::memory();
    let calls = log();

    store
        .run(|| {
            let (a, b, c) = (calls.clone(), calls.clone(), calls.clone());
            on_finished(move || a.borrow_mut().push("finished-1"))?;
            on_succeeded(move || b.borrow_mut().push("succeeded"))?;
            on_failed(move || c.borrow_mut().push("failed"))?;
            let d = calls.clone();
            on_finished(move || d.borrow_mut().push("finished-2"))
        })
        .unwrap();

    assert_eq!(*calls.borrow(), vec!["finished-1", "succeeded", "finished-2"]);
}

#[test]
fn failed_transaction_skips_success_listeners() {
    let store = TestStore::memory();
    let calls = log();

    let result: Result<(), TxError> = store.run(|| {
        let (a, b) = (calls.clone(), calls.clone());
        on_succeeded(move || a.borrow_mut().push("succeeded"))?;
        on_failed(move || b.borrow_mut().push("failed"))?;
        Err(TxError::invalid_schema("refused"))
    });

    assert!(result.is_err());
    assert_eq!(*calls.borrow(), vec!["failed"]);
}

#[test]
fn failed_inner_scope_reclassifies_its_listeners() {
    let store = TestStore::memory();
    let (outer, inner) = (log(), log());

    store
        .run(|| {
            register(&outer, "outer")?;
            let nested: Result<(), TxError> = store.run_nested(|| {
                register(&inner, "inner")?;
                Err(TxError::invalid_schema("inner refused"))
            });
            assert!(nested.is_err());
            Ok::<_, TxError>(())
        })
        .unwrap();

    // The inner failure listener runs even though the outermost scope
    // succeeded; its success listener never does.
    assert_eq!(*inner.borrow(), vec!["inner", "inner"]);
    assert_eq!(*outer.borrow(), vec!["outer", "outer"]);
}

#[test]
fn reclassified_listeners_run_when_outer_fails_too() {
    let store = TestStore::memory();
    let inner = log();

    let result: Result<(), TxError> = store.run(|| {
        let _: Result<(), TxError> = store.run_nested(|| {
            register(&inner, "inner")?;
            rollback()
        });
        rollback()?;
        Ok(())
    });

    assert!(result.is_ok());
    assert_eq!(*inner.borrow(), vec!["inner", "inner"]);
}

#[test]
fn successful_inner_scope_defers_to_outer_outcome() {
    let store = TestStore::memory();
    let inner = log();

    let result: Result<(), TxError> = store.run(|| {
        store.run_nested(|| register(&inner, "inner"))?;
        Err(TxError::invalid_schema("outer refused"))
    });

    assert!(result.is_err());
    assert_eq!(*inner.borrow(), vec!["inner", "inner"]);
}

#[test]
fn panicking_listener_does_not_stop_the_rest() {
    init_test_tracing();
    let store = TestStore::memory();
    let team = store.persisted_team(1, "before");
    let calls = log();

    store
        .run(|| {
            team.title().set("after")?;
            on_succeeded(|| panic!("listener exploded"))?;
            let a = calls.clone();
            on_succeeded(move || a.borrow_mut().push("survivor"))
        })
        .unwrap();

    assert_eq!(*calls.borrow(), vec!["survivor"]);
    assert_eq!(team.title().get(), Value::from("after"));
}

#[test]
fn listener_may_open_a_new_transaction() {
    let store = TestStore::memory();
    let team = store.persisted_team(2, "first");
    let (handle, follow_up) = (store.store.clone(), team.clone());

    store
        .run(|| {
            team.title().set("second")?;
            on_succeeded(move || {
                assert!(!is_inside());
                handle
                    .run(|| follow_up.tags().insert("from-listener").map(drop))
                    .unwrap();
            })
        })
        .unwrap();

    assert!(team.tags().contains("from-listener"));
    assert_eq!(team.title().get(), Value::from("second"));
}
