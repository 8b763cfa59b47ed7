//! Ordered in-memory entry table.

use super::Entry;
use crate::types::{DeviceScope, LogicalTimestamp};
use distkv_codec::TypedValue;
use std::collections::{BTreeMap, BTreeSet};

type TableKey = (DeviceScope, String);

/// Entries keyed by `(scope, key)`.
///
/// Keys are ordered within a scope so prefix lookups are range scans.
#[derive(Debug, Default)]
pub(crate) struct EntryTable {
    entries: BTreeMap<TableKey, Entry>,
    clock: LogicalTimestamp,
}

impl EntryTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, scope: &DeviceScope, key: &str) -> Option<&Entry> {
        self.entries.get(&(scope.clone(), key.to_string()))
    }

    /// Writes a value, stamping version and write time. Returns the prior entry.
    pub(crate) fn put(
        &mut self,
        scope: DeviceScope,
        key: String,
        value: TypedValue,
        origin: DeviceScope,
    ) -> Option<Entry> {
        self.clock = self.clock.next();
        let table_key = (scope.clone(), key.clone());
        let version = self.entries.get(&table_key).map_or(1, |e| e.version + 1);
        self.entries.insert(
            table_key,
            Entry {
                scope,
                key,
                value,
                version,
                updated_at: self.clock,
                origin,
            },
        )
    }

    pub(crate) fn remove(&mut self, scope: &DeviceScope, key: &str) -> Option<Entry> {
        self.entries.remove(&(scope.clone(), key.to_string()))
    }

    /// Puts back an exact prior state without touching the clock.
    pub(crate) fn restore(&mut self, scope: DeviceScope, key: String, prior: Option<Entry>) {
        match prior {
            Some(entry) => {
                self.entries.insert((scope, key), entry);
            }
            None => {
                self.entries.remove(&(scope, key));
            }
        }
    }

    /// Entries of `scope` whose key starts with `prefix`, in key order.
    pub(crate) fn scan_prefix<'a>(
        &'a self,
        scope: &DeviceScope,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a Entry> + 'a {
        let scope = scope.clone();
        self.entries
            .range((scope.clone(), prefix.to_string())..)
            .take_while(move |((s, k), _)| *s == scope && k.starts_with(prefix))
            .map(|(_, entry)| entry)
    }

    /// Every entry of `scope`, in key order.
    pub(crate) fn scan<'a>(&'a self, scope: &DeviceScope) -> impl Iterator<Item = &'a Entry> + 'a {
        self.scan_prefix(scope, "")
    }

    /// Remote device ids that currently hold entries.
    pub(crate) fn remote_devices(&self) -> BTreeSet<String> {
        self.entries
            .keys()
            .filter_map(|(scope, _)| scope.device_id().map(str::to_string))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clock(&self) -> LogicalTimestamp {
        self.clock
    }

    /// Moves every entry and the clock into a fresh table.
    pub(crate) fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(table: &mut EntryTable, scope: &DeviceScope, key: &str, v: i64) -> Option<Entry> {
        table.put(
            scope.clone(),
            key.to_string(),
            TypedValue::Integer(v),
            scope.clone(),
        )
    }

    #[test]
    fn put_stamps_version_and_clock() {
        let mut table = EntryTable::new();
        assert!(put(&mut table, &DeviceScope::Local, "a", 1).is_none());
        let prior = put(&mut table, &DeviceScope::Local, "a", 2).unwrap();
        assert_eq!(prior.version, 1);

        let entry = table.get(&DeviceScope::Local, "a").unwrap();
        assert_eq!(entry.version, 2);
        assert_eq!(entry.updated_at, LogicalTimestamp::new(2));
        assert_eq!(entry.value, TypedValue::Integer(2));
    }

    #[test]
    fn prefix_scan_stays_in_scope() {
        let mut table = EntryTable::new();
        let remote = DeviceScope::remote("dev");
        put(&mut table, &DeviceScope::Local, "user_1", 1);
        put(&mut table, &DeviceScope::Local, "user_2", 2);
        put(&mut table, &DeviceScope::Local, "vip_1", 3);
        put(&mut table, &remote, "user_3", 4);

        let keys: Vec<_> = table
            .scan_prefix(&DeviceScope::Local, "user_")
            .map(|e| e.key.as_str())
            .collect();
        assert_eq!(keys, vec!["user_1", "user_2"]);
        assert_eq!(table.scan(&remote).count(), 1);
        assert_eq!(table.remote_devices().into_iter().collect::<Vec<_>>(), vec!["dev"]);
    }

    #[test]
    fn restore_is_exact() {
        let mut table = EntryTable::new();
        put(&mut table, &DeviceScope::Local, "a", 1);
        let before = table.get(&DeviceScope::Local, "a").cloned();
        put(&mut table, &DeviceScope::Local, "a", 9);
        table.restore(DeviceScope::Local, "a".to_string(), before.clone());
        assert_eq!(table.get(&DeviceScope::Local, "a").cloned(), before);

        table.restore(DeviceScope::Local, "a".to_string(), None);
        assert!(table.get(&DeviceScope::Local, "a").is_none());
        assert_eq!(table.scan(&DeviceScope::Local).count(), 0);
    }
}
