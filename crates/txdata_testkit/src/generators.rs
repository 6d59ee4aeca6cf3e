//! Property-based test generators using proptest.
//!
//! Provides strategies for random mutation sequences on a [`Team`], the
//! raw material of the rollback, last-write-wins, nested-merge and
//! dirty-patch properties.

use crate::fixtures::{Role, Team};
use proptest::prelude::*;
use std::collections::BTreeSet;
use txdata_core::{TxResult, Value};

/// One mutation of a team.
#[derive(Debug, Clone)]
pub enum TeamOp {
    /// Set the title.
    SetTitle(String),
    /// Set the ignored note.
    SetNote(String),
    /// Add a tag.
    AddTag(String),
    /// Remove a tag.
    RemoveTag(String),
    /// Put a score.
    PutScore(String, i64),
    /// Remove a score.
    RemoveScore(String),
    /// Append a new member.
    PushMember(String, i64),
    /// Remove the member at `index % len`; a no-op on an empty list.
    RemoveMember(usize),
    /// Replace the lead, or clear it.
    SetLead(Option<(String, i64)>),
    /// Move the first member into the roles map under a key.
    PromoteFirst(String),
}

impl TeamOp {
    /// Applies the mutation in the current transaction.
    pub fn apply(&self, team: &Team) -> TxResult<()> {
        match self {
            Self::SetTitle(title) => team.title().set(title.as_str()),
            Self::SetNote(note) => team.note().set(note.as_str()),
            Self::AddTag(tag) => team.tags().insert(tag.as_str()).map(drop),
            Self::RemoveTag(tag) => team.tags().remove(tag.as_str()).map(drop),
            Self::PutScore(key, score) => team.scores().put(key.as_str(), *score).map(drop),
            Self::RemoveScore(key) => team.scores().remove(key.as_str()).map(drop),
            Self::PushMember(name, level) => team.members().push(Role::new(name, *level).0),
            Self::RemoveMember(index) => {
                let members = team.members();
                match members.len() {
                    0 => Ok(()),
                    len => members.remove(index % len).map(drop),
                }
            }
            Self::SetLead(lead) => {
                let bean = lead.as_ref().map(|(name, level)| Role::new(name, *level).0);
                team.lead().set(bean).map(drop)
            }
            Self::PromoteFirst(key) => {
                let members = team.members();
                if members.is_empty() {
                    return Ok(());
                }
                let first = members.remove(0)?;
                team.roles().put(key.as_str(), first).map(drop)
            }
        }
    }

    /// Returns the top-level field positions this op may change.
    pub fn positions(&self) -> Vec<usize> {
        match self {
            Self::SetTitle(_) => vec![Team::TITLE],
            Self::SetNote(_) => vec![Team::NOTE],
            Self::AddTag(_) | Self::RemoveTag(_) => vec![Team::TAGS],
            Self::PutScore(..) | Self::RemoveScore(_) => vec![Team::SCORES],
            Self::PushMember(..) | Self::RemoveMember(_) => vec![Team::MEMBERS],
            Self::SetLead(_) => vec![Team::LEAD],
            Self::PromoteFirst(_) => vec![Team::MEMBERS, Team::ROLES],
        }
    }
}

/// Strategy for tag and score keys, drawn from a small pool so that
/// sequences revisit the same keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["red", "green", "blue", "amber"]).prop_map(str::to_owned)
}

/// Strategy for short text values.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{0,8}").expect("Invalid regex")
}

/// Strategy for role levels within the schema range.
pub fn level_strategy() -> impl Strategy<Value = i64> {
    0i64..=10
}

/// Strategy for any team mutation.
pub fn team_op_strategy() -> impl Strategy<Value = TeamOp> {
    prop_oneof![
        text_strategy().prop_map(TeamOp::SetTitle),
        text_strategy().prop_map(TeamOp::SetNote),
        key_strategy().prop_map(TeamOp::AddTag),
        key_strategy().prop_map(TeamOp::RemoveTag),
        (key_strategy(), any::<i64>()).prop_map(|(k, v)| TeamOp::PutScore(k, v)),
        key_strategy().prop_map(TeamOp::RemoveScore),
        (text_strategy(), level_strategy()).prop_map(|(n, l)| TeamOp::PushMember(n, l)),
        any::<usize>().prop_map(TeamOp::RemoveMember),
        prop::option::of((text_strategy(), level_strategy())).prop_map(TeamOp::SetLead),
        key_strategy().prop_map(TeamOp::PromoteFirst),
    ]
}

/// Strategy for a sequence of team mutations.
pub fn team_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<TeamOp>> {
    prop::collection::vec(team_op_strategy(), 0..=max_len)
}

/// Strategy for mutations that always change their field on first use:
/// overwrites and additions only.
pub fn overwrite_op_strategy() -> impl Strategy<Value = TeamOp> {
    prop_oneof![
        text_strategy().prop_map(TeamOp::SetTitle),
        text_strategy().prop_map(TeamOp::SetNote),
        key_strategy().prop_map(TeamOp::AddTag),
        (key_strategy(), any::<i64>()).prop_map(|(k, v)| TeamOp::PutScore(k, v)),
        (text_strategy(), level_strategy()).prop_map(|(n, l)| TeamOp::PushMember(n, l)),
    ]
}

/// Returns the persisted field names an overwrite sequence dirties.
pub fn dirtied_names(ops: &[TeamOp]) -> BTreeSet<&'static str> {
    let fields = crate::fixtures::TEAM.fields;
    ops.iter()
        .flat_map(TeamOp::positions)
        .map(|position| &fields[position])
        .filter(|def| !def.ignore)
        .map(|def| def.name)
        .collect()
}

/// Renders a team plus the attachment of each bean it holds, as seen by the
/// current transaction.
pub fn observe(team: &Team) -> (Value, Vec<String>) {
    let mut attachments: Vec<String> = team
        .members()
        .items()
        .iter()
        .filter_map(|item| item.as_bean())
        .map(|bean| format!("member {}", bean.attachment()))
        .collect();
    if let Some(lead) = team.lead().get() {
        attachments.push(format!("lead {}", lead.attachment()));
    }
    (txdata_core::Composite::to_value(team.data()), attachments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn key_strategy_stays_in_pool() {
        let mut runner = TestRunner::default();
        for _ in 0..32 {
            let key = key_strategy().new_tree(&mut runner).unwrap().current();
            assert!(["red", "green", "blue", "amber"].contains(&key.as_str()));
        }
    }

    #[test]
    fn dirtied_names_skip_ignored_fields() {
        let ops = vec![
            TeamOp::SetNote("x".into()),
            TeamOp::SetTitle("y".into()),
            TeamOp::AddTag("red".into()),
        ];
        let names: Vec<_> = dirtied_names(&ops).into_iter().collect();
        assert_eq!(names, vec!["tags", "title"]);
    }
}
