//! Property tests for the transactional laws.

use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use txdata_core::{Config, Store, TxError};
use txdata_testkit::{
    dirtied_names, observe, overwrite_op_strategy, rolled_back, team_ops_strategy, RecordingAccessor,
    Team, TeamOp, TestStore,
};

fn apply_all(team: &Team, ops: &[TeamOp]) -> Result<(), TxError> {
    ops.iter().try_for_each(|op| op.apply(team))
}

fn seeded(seed: &[TeamOp]) -> (TestStore, Team) {
    let store = TestStore::memory();
    let team = store.persisted_team(1, "seed");
    store
        .run(|| apply_all(&team, seed))
        .expect("seed ops apply cleanly");
    (store, team)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn rollback_restores_observable_state(
        seed in team_ops_strategy(8),
        ops in team_ops_strategy(16),
    ) {
        let (store, team) = seeded(&seed);
        let before = observe(&team);
        let writes = store.backend.write_count();

        let result = rolled_back(&store, || apply_all(&team, &ops));

        prop_assert!(result.is_ok());
        prop_assert_eq!(observe(&team), before);
        prop_assert_eq!(store.backend.write_count(), writes);
    }

    #[test]
    fn commit_keeps_last_written_values(
        seed in team_ops_strategy(8),
        ops in team_ops_strategy(16),
    ) {
        let (store, team) = seeded(&seed);
        let mut seen_inside = None;

        store
            .run(|| {
                apply_all(&team, &ops)?;
                seen_inside = Some(observe(&team));
                Ok::<_, TxError>(())
            })
            .unwrap();

        prop_assert_eq!(Some(observe(&team)), seen_inside);
        prop_assert_eq!(
            store.backend.get(&team.data().record_key()),
            Some(team.data().document())
        );
    }

    #[test]
    fn nested_scope_merges_or_vanishes(
        outer_ops in team_ops_strategy(8),
        inner_ops in team_ops_strategy(8),
        inner_fails in any::<bool>(),
    ) {
        let (store, team) = seeded(&[]);
        let mut before_inner = None;
        let mut inside_inner = None;
        let mut after_inner = None;

        store
            .run(|| {
                apply_all(&team, &outer_ops)?;
                before_inner = Some(observe(&team));
                let inner: Result<(), TxError> = store.run_nested(|| {
                    apply_all(&team, &inner_ops)?;
                    inside_inner = Some(observe(&team));
                    if inner_fails {
                        return Err(TxError::invalid_schema("inner scope refused"));
                    }
                    Ok(())
                });
                assert_eq!(inner.is_err(), inner_fails);
                after_inner = Some(observe(&team));
                Ok::<_, TxError>(())
            })
            .unwrap();

        if inner_fails {
            prop_assert_eq!(&after_inner, &before_inner);
        } else {
            prop_assert_eq!(&after_inner, &inside_inner);
        }
        prop_assert_eq!(Some(observe(&team)), after_inner);
    }

    #[test]
    fn patch_holds_exactly_the_dirtied_fields(
        ops in prop::collection::vec(overwrite_op_strategy(), 0..12),
    ) {
        let recorder = Arc::new(RecordingAccessor::new());
        let store = Store::open(recorder.clone(), Config::default());
        let team = Team::new(1);
        store.run(|| store.insert(team.data())).unwrap();
        recorder.clear();

        store.run(|| apply_all(&team, &ops)).unwrap();

        let expected = dirtied_names(&ops);
        if expected.is_empty() {
            prop_assert_eq!(recorder.calls(), 0);
        } else {
            prop_assert_eq!(recorder.calls(), 1);
            let batch = recorder.last().unwrap();
            prop_assert!(batch.inserts.is_empty());
            prop_assert!(batch.deletes.is_empty());
            prop_assert_eq!(batch.patches.len(), 1);

            let (key, patch) = &batch.patches[0];
            prop_assert_eq!(key, &team.data().record_key());
            let names: BTreeSet<&str> = patch.keys().map(String::as_str).collect();
            prop_assert_eq!(names, expected);

            let document = team.data().document();
            for (name, value) in patch {
                prop_assert_eq!(Some(value), document.get(name));
            }
        }
    }
}
