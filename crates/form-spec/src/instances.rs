use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::address::{GroupKey, split_field_key};
use crate::answers::AnswerStore;

/// What happens to answers of later instances when one is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Later instances are re-keyed one slot down, matching the contiguous
    /// render order.
    #[default]
    Compact,
    /// Later instances keep their original index. Rendering stays
    /// contiguous, so the removed slot renders empty and the highest stored
    /// instance is no longer reachable.
    Preserve,
}

/// Group key to instance count mapping; absent groups have one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceTable {
    counts: BTreeMap<GroupKey, usize>,
}

impl InstanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, group: &GroupKey) -> usize {
        self.counts.get(group).copied().unwrap_or(1).max(1)
    }

    /// Instance indices rendered for the group, always contiguous.
    pub fn instances(&self, group: &GroupKey) -> Range<usize> {
        0..self.count(group)
    }

    pub fn add(&mut self, group: &GroupKey) -> usize {
        let count = self.count(group) + 1;
        self.counts.insert(*group, count);
        count
    }

    /// Removes instance `index` of `group` together with its answers.
    ///
    /// Returns `false` without touching anything when the group is down to
    /// its last instance or `index` is not a live instance.
    pub fn remove(
        &mut self,
        group: &GroupKey,
        index: usize,
        answers: &mut AnswerStore,
        policy: RemovalPolicy,
    ) -> bool {
        let count = self.count(group);
        if count <= 1 || index >= count {
            return false;
        }

        let mut shifted = Vec::new();
        for (key, field, rest) in answers.keys_in_group(group) {
            if field.instance == index {
                answers.remove(&key);
            } else if field.instance > index
                && policy == RemovalPolicy::Compact
                && let Some(value) = answers.remove(&key)
            {
                let target = format!("{}{}", field.with_instance(field.instance - 1), rest);
                shifted.push((target, value));
            }
        }
        // Re-insert after all removals: string order puts i10 before i2.
        for (key, value) in shifted {
            answers.insert(key, value);
        }

        self.counts.insert(*group, count - 1);
        true
    }

    /// Drops every instance beyond the first, e.g. when a group stops being
    /// repeatable.
    pub fn collapse(&mut self, group: &GroupKey, answers: &mut AnswerStore) {
        for (key, field, _) in answers.keys_in_group(group) {
            if field.instance > 0 {
                answers.remove(&key);
            }
        }
        self.counts.remove(group);
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &usize)> {
        self.counts.iter()
    }
}

/// Whether `key` addresses an answer inside `group` at `instance`.
pub fn key_in_instance(key: &str, group: &GroupKey, instance: usize) -> bool {
    split_field_key(key)
        .is_some_and(|(field, _)| group.contains(&field) && field.instance == instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{field_key, group_key};
    use crate::answers::AnswerValue;

    fn seeded() -> (InstanceTable, AnswerStore, GroupKey) {
        let group = group_key(0, 0, 1);
        let mut table = InstanceTable::new();
        table.add(&group);
        table.add(&group);
        let mut answers = AnswerStore::new();
        for instance in 0..3 {
            answers.insert(
                field_key(0, 0, 1, 0, instance).to_string(),
                format!("child-{instance}"),
            );
            answers.insert(
                field_key(0, 0, 1, 1, instance).sub(0),
                format!("sub-{instance}"),
            );
        }
        answers.insert(field_key(0, 0, 0, 0, 1).to_string(), "other group");
        (table, answers, group)
    }

    #[test]
    fn starts_with_one_instance() {
        let table = InstanceTable::new();
        let group = group_key(0, 0, 0);
        assert_eq!(table.count(&group), 1);
        assert_eq!(table.instances(&group), 0..1);
    }

    #[test]
    fn add_then_remove_first_instance() {
        let group = group_key(0, 0, 0);
        let mut table = InstanceTable::new();
        let mut answers = AnswerStore::new();
        answers.insert(field_key(0, 0, 0, 0, 0).to_string(), "first");
        answers.insert(field_key(0, 0, 0, 0, 1).to_string(), "second");

        assert_eq!(table.add(&group), 2);
        assert!(table.remove(&group, 0, &mut answers, RemovalPolicy::Preserve));
        assert_eq!(table.count(&group), 1);
        assert!(answers.get("p0_s0_g0_q0_i0").is_none());
        assert_eq!(
            answers.get("p0_s0_g0_q0_i1"),
            Some(&AnswerValue::text("second"))
        );
    }

    #[test]
    fn removing_last_instance_is_noop() {
        let group = group_key(0, 0, 0);
        let mut table = InstanceTable::new();
        let mut answers = AnswerStore::new();
        answers.insert(field_key(0, 0, 0, 0, 0).to_string(), "keep");
        assert!(!table.remove(&group, 0, &mut answers, RemovalPolicy::Compact));
        assert_eq!(table.count(&group), 1);
        assert_eq!(answers.len(), 1);
    }

    #[test]
    fn out_of_range_index_is_noop() {
        let (mut table, mut answers, group) = seeded();
        let before = answers.clone();
        assert!(!table.remove(&group, 7, &mut answers, RemovalPolicy::Compact));
        assert_eq!(table.count(&group), 3);
        assert_eq!(answers, before);
    }

    #[test]
    fn preserve_policy_leaves_later_indices_alone() {
        let (mut table, mut answers, group) = seeded();
        assert!(table.remove(&group, 1, &mut answers, RemovalPolicy::Preserve));
        assert_eq!(table.count(&group), 2);
        assert!(answers.get("p0_s0_g1_q0_i1").is_none());
        assert!(answers.get("p0_s0_g1_q1_i1_sub0").is_none());
        assert_eq!(
            answers.get("p0_s0_g1_q0_i2"),
            Some(&AnswerValue::text("child-2"))
        );
        // Slot 1 now renders with no stored answer while instance 2 is unreachable.
        assert_eq!(table.instances(&group), 0..2);
        assert_eq!(
            answers.get("p0_s0_g0_q0_i1"),
            Some(&AnswerValue::text("other group"))
        );
    }

    #[test]
    fn compact_policy_shifts_later_indices_down() {
        let (mut table, mut answers, group) = seeded();
        assert!(table.remove(&group, 1, &mut answers, RemovalPolicy::Compact));
        assert_eq!(table.count(&group), 2);
        assert_eq!(
            answers.get("p0_s0_g1_q0_i1"),
            Some(&AnswerValue::text("child-2"))
        );
        assert_eq!(
            answers.get("p0_s0_g1_q1_i1_sub0"),
            Some(&AnswerValue::text("sub-2"))
        );
        assert!(answers.get("p0_s0_g1_q0_i2").is_none());
        assert_eq!(
            answers.get("p0_s0_g1_q0_i0"),
            Some(&AnswerValue::text("child-0"))
        );
        assert_eq!(
            answers.get("p0_s0_g0_q0_i1"),
            Some(&AnswerValue::text("other group"))
        );
    }

    #[test]
    fn collapse_keeps_first_instance() {
        let (mut table, mut answers, group) = seeded();
        table.collapse(&group, &mut answers);
        assert_eq!(table.count(&group), 1);
        assert!(key_in_instance("p0_s0_g1_q0_i0", &group, 0));
        assert!(answers.get("p0_s0_g1_q0_i0").is_some());
        assert!(answers.get("p0_s0_g1_q0_i2").is_none());
    }
}
