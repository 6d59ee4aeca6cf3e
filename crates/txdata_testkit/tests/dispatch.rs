//! Inline and background accessor dispatch.

use std::sync::Arc;
use std::thread;
use txdata_core::{Config, DispatchMode, Store, Value};
use txdata_testkit::{
    init_test_tracing, stress_nested_transactions, RecordingAccessor, StressConfig, Team,
};

fn store_with(mode: DispatchMode) -> (Store, Arc<RecordingAccessor>) {
    let recorder = Arc::new(RecordingAccessor::new());
    let store = Store::open(recorder.clone(), Config::new().dispatch(mode));
    (store, recorder)
}

#[test]
fn inline_dispatch_runs_on_committing_thread() {
    let (store, recorder) = store_with(DispatchMode::Inline);
    let team = Team::new(1);
    store.run(|| store.insert(team.data())).unwrap();

    assert_eq!(recorder.calls(), 1);
    let here = thread::current().name().map(str::to_owned);
    assert_eq!(recorder.threads(), vec![here]);
}

#[test]
fn background_dispatch_runs_on_worker_thread() {
    init_test_tracing();
    let (store, recorder) = store_with(DispatchMode::Background);
    let team = Team::new(2);
    store.run(|| store.insert(team.data())).unwrap();
    store.flush();

    assert_eq!(recorder.calls(), 1);
    assert_eq!(recorder.threads(), vec![Some("txdata-dispatch".to_string())]);
}

#[test]
fn background_batches_are_snapshots() {
    let (store, recorder) = store_with(DispatchMode::Background);
    let team = Team::new(3);
    store
        .run(|| {
            store.insert(team.data())?;
            team.title().set("one")
        })
        .unwrap();
    store.run(|| team.title().set("two")).unwrap();
    store.run(|| team.title().set("three")).unwrap();
    store.flush();

    let titles: Vec<Value> = recorder
        .batches()
        .iter()
        .map(|batch| match (batch.inserts.first(), batch.patches.first()) {
            (Some(record), _) => record.document["title"].clone(),
            (None, Some((_, patch))) => patch["title"].clone(),
            (None, None) => Value::Null,
        })
        .collect();
    assert_eq!(
        titles,
        vec![Value::from("one"), Value::from("two"), Value::from("three")]
    );
}

#[test]
fn dropping_store_drains_pending_batches() {
    let recorder = Arc::new(RecordingAccessor::new());
    {
        let store = Store::open(
            recorder.clone(),
            Config::new().dispatch(DispatchMode::Background),
        );
        for id in 0..16 {
            let team = Team::new(100 + id);
            store.run(|| store.insert(team.data())).unwrap();
        }
    }
    assert_eq!(recorder.calls(), 16);
}

#[test]
fn nested_stress_under_background_dispatch() {
    let config = StressConfig {
        threads: 3,
        transactions: 30,
        nesting: 4,
        dispatch: DispatchMode::Background,
    };
    let outcome = stress_nested_transactions(&config);
    assert_eq!(outcome.result.total_ops, 90);
    assert_eq!(outcome.result.rolled_back, 30);

    for (team, expected) in outcome.teams.iter().zip(&outcome.expected) {
        let total = team.scores().get("total").and_then(|i| i.as_i64());
        assert_eq!(total, Some(*expected));
        assert_eq!(*expected, 20 * 2);
        let persisted = outcome.store.backend.get(&team.data().record_key()).unwrap();
        assert_eq!(persisted.get("scores"), team.data().document().get("scores"));
    }
}
