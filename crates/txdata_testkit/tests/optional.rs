//! Writes outside a transaction under the thread-local optional switch.

use std::thread;
use txdata_core::{is_optional, set_local_optional, DataState, TxError, Value};
use txdata_testkit::{Role, Team, TestStore};

/// Enables optional writes on this thread until dropped.
struct LocalOptional;

impl LocalOptional {
    fn enable() -> Self {
        set_local_optional(true);
        Self
    }
}

impl Drop for LocalOptional {
    fn drop(&mut self) {
        set_local_optional(false);
    }
}

#[test]
fn local_switch_is_per_thread() {
    let _guard = LocalOptional::enable();
    assert!(is_optional());
    assert!(!thread::spawn(is_optional).join().unwrap());
}

#[test]
fn direct_write_updates_baseline_without_persisting() {
    let store = TestStore::memory();
    let team = store.persisted_team(1, "before");
    let writes = store.backend.write_count();

    {
        let _guard = LocalOptional::enable();
        team.title().set("direct").unwrap();
        team.tags().insert("x").unwrap();
    }

    assert_eq!(team.title().get(), Value::from("direct"));
    assert!(team.tags().contains("x"));
    assert_eq!(store.backend.write_count(), writes);
    assert_eq!(team.title().set("again"), Err(TxError::NotInTransaction));
}

#[test]
fn direct_write_reparents_beans_immediately() {
    let team = Team::new(2);
    let role = Role::with_badge("direct", 2, "copper");
    let badge = role.badge().get().unwrap();

    let _guard = LocalOptional::enable();
    team.members().push(role.bean()).unwrap();

    let expected = txdata_core::Attachment::to(team.data().id(), Team::MEMBERS);
    assert_eq!(role.bean().committed_attachment(), expected);
    assert_eq!(badge.committed_attachment(), expected);

    team.members().clear().unwrap();
    assert!(badge.committed_attachment().is_detached());
}

#[test]
fn lifecycle_outside_transaction_applies_immediately() {
    let store = TestStore::memory();
    let team = Team::new(3);
    assert_eq!(store.insert(team.data()), Err(TxError::NotInTransaction));

    let _guard = LocalOptional::enable();
    store.insert(team.data()).unwrap();
    assert_eq!(team.data().committed_state(), DataState::Update);
    assert_eq!(store.backend.len("team"), 1);

    store.delete(team.data()).unwrap();
    assert_eq!(team.data().committed_state(), DataState::None);
    assert_eq!(store.backend.len("team"), 0);
    assert!(store.is_empty());
}

#[test]
fn transactions_still_log_when_optional() {
    let store = TestStore::memory();
    let team = store.persisted_team(4, "logged");
    let _guard = LocalOptional::enable();

    store
        .run(|| {
            team.title().set("pending")?;
            assert_eq!(team.title().get(), Value::from("pending"));
            assert_eq!(
                txdata_core::Composite::field(team.data(), "title")?.committed_value(),
                Value::from("logged")
            );
            txdata_core::rollback()
        })
        .unwrap();

    assert_eq!(team.title().get(), Value::from("logged"));
}
