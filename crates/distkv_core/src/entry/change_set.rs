//! First-write log of touched keys.
//!
//! A `ChangeSet` remembers the state every touched key had before the
//! first mutation of a call or transaction. Diffing it against the table
//! yields the net change, and replaying it restores the exact prior state.

use super::{Entry, EntryTable};
use crate::types::DeviceScope;
use std::collections::BTreeMap;

/// Net effect of a change set, split by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct NetChanges {
    pub(crate) inserted: Vec<Entry>,
    pub(crate) updated: Vec<Entry>,
    pub(crate) deleted: Vec<Entry>,
}

impl NetChanges {
    pub(crate) fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct ChangeSet {
    before: BTreeMap<(DeviceScope, String), Option<Entry>>,
}

impl ChangeSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Remembers the current state of a key unless it was already recorded.
    pub(crate) fn record(&mut self, table: &EntryTable, scope: &DeviceScope, key: &str) {
        self.before
            .entry((scope.clone(), key.to_string()))
            .or_insert_with(|| table.get(scope, key).cloned());
    }

    /// Folds a later change set into this one, keeping the earliest states.
    pub(crate) fn absorb(&mut self, later: ChangeSet) {
        for (k, prior) in later.before {
            self.before.entry(k).or_insert(prior);
        }
    }

    /// Compares the recorded states with the table.
    pub(crate) fn resolve(&self, table: &EntryTable) -> NetChanges {
        let mut net = NetChanges::default();
        for ((scope, key), prior) in &self.before {
            match (prior, table.get(scope, key)) {
                (None, Some(now)) => net.inserted.push(now.clone()),
                (Some(_), Some(now)) => net.updated.push(now.clone()),
                (Some(old), None) => net.deleted.push(old.clone()),
                (None, None) => {}
            }
        }
        net
    }

    /// Restores every recorded key to its prior state.
    pub(crate) fn undo(self, table: &mut EntryTable) {
        for ((scope, key), prior) in self.before {
            table.restore(scope, key, prior);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distkv_codec::TypedValue;

    fn put(table: &mut EntryTable, key: &str, v: i64) {
        table.put(
            DeviceScope::Local,
            key.to_string(),
            TypedValue::Integer(v),
            DeviceScope::Local,
        );
    }

    #[test]
    fn insert_then_delete_is_no_change() {
        let mut table = EntryTable::new();
        let mut set = ChangeSet::new();
        set.record(&table, &DeviceScope::Local, "a");
        put(&mut table, "a", 1);
        table.remove(&DeviceScope::Local, "a");
        assert!(set.resolve(&table).is_empty());
    }

    #[test]
    fn classifies_changes() {
        let mut table = EntryTable::new();
        put(&mut table, "old", 1);
        put(&mut table, "gone", 2);

        let mut set = ChangeSet::new();
        for key in ["old", "gone", "new"] {
            set.record(&table, &DeviceScope::Local, key);
        }
        put(&mut table, "old", 10);
        table.remove(&DeviceScope::Local, "gone");
        put(&mut table, "new", 3);

        let net = set.resolve(&table);
        assert_eq!(net.inserted.len(), 1);
        assert_eq!(net.inserted[0].key, "new");
        assert_eq!(net.updated[0].value, TypedValue::Integer(10));
        assert_eq!(net.deleted[0].value, TypedValue::Integer(2));
    }

    #[test]
    fn undo_restores_earliest_state() {
        let mut table = EntryTable::new();
        put(&mut table, "a", 1);

        let mut first = ChangeSet::new();
        first.record(&table, &DeviceScope::Local, "a");
        put(&mut table, "a", 2);

        let mut second = ChangeSet::new();
        second.record(&table, &DeviceScope::Local, "a");
        second.record(&table, &DeviceScope::Local, "b");
        put(&mut table, "a", 3);
        put(&mut table, "b", 4);

        first.absorb(second);
        first.undo(&mut table);
        let a = table.get(&DeviceScope::Local, "a").unwrap();
        assert_eq!(a.value, TypedValue::Integer(1));
        assert_eq!(a.version, 1);
        assert!(table.get(&DeviceScope::Local, "b").is_none());
    }
}
