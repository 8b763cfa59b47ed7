//! Key-value store handles.
//!
//! A [`KvStore`] is a cheap, cloneable handle to shared store state owned by
//! the [`crate::KvManager`]. Every mutation runs inside one write-locked
//! critical section that validates its input, applies it, and then either
//! publishes the net change or folds it into the active transaction.
//! Reads take the read lock.
//!
//! Device-collaboration stores keep one keyspace per device; entries from
//! peers live in `Remote` scopes. Single-version stores keep one shared
//! keyspace and remember the producing device in [`Entry::origin`].

use crate::backup::{self, BackupMetadata, RestoreStats};
use crate::config::{KvStoreType, ManagerConfig, Options, SecurityLevel};
use crate::entry::{ChangeSet, Entry, EntryTable};
use crate::error::{CoreError, CoreResult};
use crate::notification::{ChangeOrigin, Dispatcher, Subscription, SubscriptionKind};
use crate::query::{CompiledQuery, Query};
use crate::result_set::KvResultSet;
use crate::stats::{StatsSnapshot, StoreStats};
use crate::sync::{
    self, RemoteChanges, SyncAdapter, SyncMode, SyncRequest, SyncSettings, SyncStatus,
};
use crate::transaction::Transaction;
use crate::types::{DeviceScope, StoreId, TransactionId};
use distkv_codec::{validate_key, validate_value, TypedValue, ValueType};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Maximum number of items in one batch call.
pub const MAX_BATCH_SIZE: usize = 128;

/// Entries selected by a read: a key prefix or a query.
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    /// Every entry whose key starts with the prefix. Empty selects all.
    Prefix(&'a str),
    /// Entries matching a query.
    Query(&'a Query),
}

impl<'a> From<&'a str> for Selection<'a> {
    fn from(prefix: &'a str) -> Self {
        Self::Prefix(prefix)
    }
}

impl<'a> From<&'a String> for Selection<'a> {
    fn from(prefix: &'a String) -> Self {
        Self::Prefix(prefix)
    }
}

impl<'a> From<&'a Query> for Selection<'a> {
    fn from(query: &'a Query) -> Self {
        Self::Query(query)
    }
}

/// What `delete` removes: one key or every local entry matching a query.
#[derive(Debug, Clone, Copy)]
pub enum DeleteTarget<'a> {
    /// A single key. Absent keys are not an error.
    Key(&'a str),
    /// Local entries matching a query.
    Query(&'a Query),
}

impl<'a> From<&'a str> for DeleteTarget<'a> {
    fn from(key: &'a str) -> Self {
        Self::Key(key)
    }
}

impl<'a> From<&'a String> for DeleteTarget<'a> {
    fn from(key: &'a String) -> Self {
        Self::Key(key)
    }
}

impl<'a> From<&'a Query> for DeleteTarget<'a> {
    fn from(query: &'a Query) -> Self {
        Self::Query(query)
    }
}

struct StoreState {
    table: EntryTable,
    txn: Option<Transaction>,
}

/// Shared state behind every handle to one open store.
pub(crate) struct StoreCore {
    app_id: String,
    store_id: StoreId,
    options: Options,
    local_device_id: String,
    max_open_result_sets: usize,
    state: RwLock<StoreState>,
    open: AtomicBool,
    open_result_sets: AtomicUsize,
    next_txn: AtomicU64,
    dispatcher: Dispatcher,
    sync: Mutex<SyncSettings>,
    adapter: Option<Arc<dyn SyncAdapter>>,
    stats: StoreStats,
}

impl StoreCore {
    pub(crate) fn open(
        config: &ManagerConfig,
        store_id: StoreId,
        options: Options,
        table: EntryTable,
        adapter: Option<Arc<dyn SyncAdapter>>,
    ) -> Arc<Self> {
        let stats = StoreStats::new();
        stats.set_entry_count(table.len() as u64);
        tracing::debug!(
            app = %config.app_id,
            store = %store_id,
            kind = ?options.kv_store_type,
            entries = table.len(),
            "store opened"
        );
        Arc::new(Self {
            app_id: config.app_id.clone(),
            dispatcher: Dispatcher::new(store_id.as_str()),
            store_id,
            options,
            local_device_id: config.local_device_id.clone(),
            max_open_result_sets: config.max_open_result_sets,
            state: RwLock::new(StoreState { table, txn: None }),
            open: AtomicBool::new(true),
            open_result_sets: AtomicUsize::new(0),
            next_txn: AtomicU64::new(1),
            sync: Mutex::new(SyncSettings::default()),
            adapter,
            stats,
        })
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            tracing::warn!(store = %self.store_id, "operation on closed store");
            Err(CoreError::StoreClosed)
        }
    }

    /// Closes the store and hands back its entries. `None` when already
    /// closed.
    pub(crate) fn close(&self) -> Option<EntryTable> {
        let table = self.seal()?;
        self.stop_delivery();
        Some(table)
    }

    /// Rejects further operations and takes the entries out of the store.
    /// Observers may still be running afterwards; see
    /// [`StoreCore::stop_delivery`].
    pub(crate) fn seal(&self) -> Option<EntryTable> {
        let mut state = self.state.write();
        if !self.open.swap(false, Ordering::SeqCst) {
            return None;
        }
        if let Some(mut txn) = state.txn.take() {
            tracing::warn!(
                store = %self.store_id,
                txn = %txn.id(),
                "discarding active transaction on close"
            );
            if txn.rollback(&mut state.table).is_ok() {
                self.stats.record_transaction_rollback();
            }
        }
        Some(state.table.take())
    }

    /// Drains batches queued before [`StoreCore::seal`] and joins the
    /// delivery thread. Must not be called with manager locks held.
    pub(crate) fn stop_delivery(&self) {
        self.dispatcher.shutdown();
        tracing::debug!(store = %self.store_id, "store closed");
    }

    pub(crate) fn publish_service_death(&self) {
        if self.is_open() {
            self.dispatcher.publish_service_death();
        }
    }

    fn acquire_result_set(&self) -> CoreResult<()> {
        let max = self.max_open_result_sets;
        self.open_result_sets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .map(|_| ())
            .map_err(|_| CoreError::over_limit(format!("at most {max} result sets may be open")))
    }

    pub(crate) fn release_result_set(&self) {
        let _ = self
            .open_result_sets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Runs one mutation as an all-or-nothing unit.
    ///
    /// `f` records every key it touches in the change set before writing
    /// it. On error the touched keys are restored.
    fn mutate<T>(
        &self,
        origin: ChangeOrigin,
        device_id: &str,
        outside_txn: Option<&str>,
        f: impl FnOnce(&mut EntryTable, &mut ChangeSet) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut guard = self.state.write();
        self.ensure_open()?;
        let state = &mut *guard;
        if let (Some(what), Some(_)) = (outside_txn, &state.txn) {
            return Err(CoreError::invalid_operation(format!(
                "{what} cannot run during a transaction"
            )));
        }
        let mut changes = ChangeSet::new();
        let out = match f(&mut state.table, &mut changes) {
            Ok(out) => out,
            Err(e) => {
                changes.undo(&mut state.table);
                return Err(e);
            }
        };
        self.stats.set_entry_count(state.table.len() as u64);
        match state.txn.as_mut() {
            Some(txn) => txn.absorb(changes)?,
            None => {
                let net = changes.resolve(&state.table);
                self.dispatcher.publish_changes(net, device_id, origin);
            }
        }
        Ok(out)
    }

    fn local_mutate<T>(
        &self,
        f: impl FnOnce(&mut EntryTable, &mut ChangeSet) -> CoreResult<T>,
    ) -> CoreResult<T> {
        self.mutate(ChangeOrigin::Local, &self.local_device_id, None, f)
    }

    fn put_one(
        &self,
        table: &mut EntryTable,
        changes: &mut ChangeSet,
        key: String,
        value: TypedValue,
    ) {
        changes.record(table, &DeviceScope::Local, &key);
        self.stats.record_write(value.encoded_len() as u64);
        table.put(DeviceScope::Local, key, value, DeviceScope::Local);
    }

    fn delete_one(
        &self,
        table: &mut EntryTable,
        changes: &mut ChangeSet,
        scope: &DeviceScope,
        key: &str,
    ) {
        changes.record(table, scope, key);
        if table.remove(scope, key).is_some() {
            self.stats.record_delete();
        }
    }

    /// Scope addressed by an explicit device id.
    fn scope_of(&self, device_id: &str) -> CoreResult<DeviceScope> {
        check_device(device_id)?;
        if device_id == self.local_device_id {
            return Ok(DeviceScope::Local);
        }
        match self.options.kv_store_type {
            KvStoreType::DeviceCollaboration => Ok(DeviceScope::remote(device_id)),
            _ => Err(CoreError::invalid_argument(
                "single-version stores have no per-device scopes",
            )),
        }
    }

    fn origin_of(&self, device_id: &str) -> DeviceScope {
        if device_id == self.local_device_id {
            DeviceScope::Local
        } else {
            DeviceScope::remote(device_id)
        }
    }

    fn select(
        &self,
        table: &EntryTable,
        scope: &DeviceScope,
        selection: Selection<'_>,
    ) -> CoreResult<Vec<Entry>> {
        self.stats.record_query();
        let query = match selection {
            Selection::Prefix(prefix) => {
                return Ok(table.scan_prefix(scope, prefix).cloned().collect());
            }
            Selection::Query(query) => query.compile()?,
        };
        let (scope, origin) = self.query_scope(&query, scope);
        Ok(query.run(candidates(&query, table, &scope, origin.as_ref())))
    }

    /// Counts matching entries without cloning them.
    fn count(&self, table: &EntryTable, scope: &DeviceScope, query: &Query) -> CoreResult<usize> {
        self.stats.record_query();
        let query = query.compile()?;
        let (scope, origin) = self.query_scope(&query, scope);
        Ok(query.count(candidates(&query, table, &scope, origin.as_ref())))
    }

    /// Scope to scan for a query, plus the origin filter single-version
    /// stores apply for a device clause.
    fn query_scope(
        &self,
        query: &CompiledQuery,
        scope: &DeviceScope,
    ) -> (DeviceScope, Option<DeviceScope>) {
        match query.device_id() {
            None => (scope.clone(), None),
            Some(device) => match self.options.kv_store_type {
                KvStoreType::DeviceCollaboration => (self.origin_of(device), None),
                _ => (DeviceScope::Local, Some(self.origin_of(device))),
            },
        }
    }
}

fn candidates<'a>(
    query: &'a CompiledQuery,
    table: &'a EntryTable,
    scope: &DeviceScope,
    origin: Option<&'a DeviceScope>,
) -> impl Iterator<Item = &'a Entry> + 'a {
    table
        .scan_prefix(scope, query.scan_prefix())
        .filter(move |e| origin.map_or(true, |o| &e.origin == o))
}

fn check_device(device_id: &str) -> CoreResult<()> {
    if device_id.is_empty() || device_id.contains('^') {
        return Err(CoreError::invalid_argument(format!(
            "invalid device id {device_id:?}"
        )));
    }
    Ok(())
}

fn check_batch(len: usize) -> CoreResult<()> {
    if len > MAX_BATCH_SIZE {
        return Err(CoreError::over_limit(format!(
            "batch has {len} items, limit is {MAX_BATCH_SIZE}"
        )));
    }
    Ok(())
}

/// A handle to an open key-value store.
///
/// Handles are cheap to clone and share state. Once the store is closed
/// through its manager, every operation fails with `StoreClosed`.
#[derive(Clone)]
pub struct KvStore {
    core: Arc<StoreCore>,
}

impl KvStore {
    pub(crate) fn new(core: Arc<StoreCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<StoreCore> {
        &self.core
    }

    /// Application namespace of the store.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.core.app_id
    }

    /// Store identifier.
    #[must_use]
    pub fn store_id(&self) -> &StoreId {
        &self.core.store_id
    }

    /// Options the store was opened with.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.core.options
    }

    /// Id of this device.
    #[must_use]
    pub fn local_device_id(&self) -> &str {
        &self.core.local_device_id
    }

    /// Whether the store is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.core.is_open()
    }

    /// Security level the store was opened with.
    pub fn security_level(&self) -> CoreResult<SecurityLevel> {
        self.core.ensure_open()?;
        Ok(self.core.options.security_level)
    }

    // ========================================================================
    // Point operations
    // ========================================================================

    /// Writes a value under a local key.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty or over-long key, `OverLimit` for an
    /// over-long value, `StoreClosed` after close.
    pub fn put(&self, key: &str, value: impl Into<TypedValue>) -> CoreResult<()> {
        let value = value.into();
        validate_key(key)?;
        validate_value(&value)?;
        self.core.local_mutate(|table, changes| {
            self.core.put_one(table, changes, key.to_string(), value);
            Ok(())
        })
    }

    /// Reads a local key.
    ///
    /// # Errors
    ///
    /// `NotFound` when the key is absent.
    pub fn get(&self, key: &str) -> CoreResult<TypedValue> {
        self.read(&DeviceScope::Local, key)
    }

    /// Reads a local key, requiring a value type.
    ///
    /// `Integer` values read as `Double` when exactly representable and
    /// `Float` values always do.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the stored type cannot be read as `expected`.
    pub fn get_as(&self, key: &str, expected: ValueType) -> CoreResult<TypedValue> {
        let value = self.get(key)?;
        let actual = value.value_type();
        value.coerce_to(expected).ok_or_else(|| {
            CoreError::type_mismatch(format!("key {key} holds {actual}, requested {expected}"))
        })
    }

    /// Reads a key from a device's scope.
    ///
    /// # Errors
    ///
    /// `NotFound` when the device or key is unknown; `InvalidArgument` for a
    /// remote device on a single-version store.
    pub fn get_in(&self, device_id: &str, key: &str) -> CoreResult<TypedValue> {
        let scope = self.core.scope_of(device_id)?;
        self.read(&scope, key)
    }

    fn read(&self, scope: &DeviceScope, key: &str) -> CoreResult<TypedValue> {
        validate_key(key)?;
        let state = self.core.state.read();
        self.core.ensure_open()?;
        let entry = state.table.get(scope, key).ok_or_else(|| match scope {
            DeviceScope::Local => CoreError::not_found(key),
            DeviceScope::Remote(device) => {
                CoreError::not_found(format!("{key} on device {device}"))
            }
        })?;
        self.core.stats.record_read(entry.value.encoded_len() as u64);
        Ok(entry.value.clone())
    }

    /// Deletes a key, or every local entry matching a query.
    ///
    /// Deleting an absent key succeeds.
    pub fn delete<'a>(&self, target: impl Into<DeleteTarget<'a>>) -> CoreResult<()> {
        match target.into() {
            DeleteTarget::Key(key) => {
                validate_key(key)?;
                self.core.local_mutate(|table, changes| {
                    self.core.delete_one(table, changes, &DeviceScope::Local, key);
                    Ok(())
                })
            }
            DeleteTarget::Query(query) => {
                let compiled = query.compile()?;
                let origin = match compiled.device_id() {
                    None => None,
                    Some(device) => match self.core.options.kv_store_type {
                        KvStoreType::DeviceCollaboration
                            if device != self.core.local_device_id =>
                        {
                            return Err(CoreError::invalid_argument(
                                "only local entries can be deleted",
                            ));
                        }
                        KvStoreType::DeviceCollaboration => None,
                        _ => Some(self.core.origin_of(device)),
                    },
                };
                self.core.local_mutate(|table, changes| {
                    self.core.stats.record_query();
                    let doomed: Vec<String> =
                        candidates(&compiled, table, &DeviceScope::Local, origin.as_ref())
                            .filter(|e| compiled.matches(e))
                            .map(|e| e.key.clone())
                            .collect();
                    for key in doomed {
                        self.core.delete_one(table, changes, &DeviceScope::Local, &key);
                    }
                    Ok(())
                })
            }
        }
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Writes several entries as one unit with one notification.
    ///
    /// Every key and value is validated before anything is written. Later
    /// duplicates of a key win.
    ///
    /// # Errors
    ///
    /// `OverLimit` for more than [`MAX_BATCH_SIZE`] entries or an over-long
    /// value, `InvalidArgument` for an invalid key.
    pub fn put_batch<K, V>(&self, entries: impl IntoIterator<Item = (K, V)>) -> CoreResult<()>
    where
        K: Into<String>,
        V: Into<TypedValue>,
    {
        let entries: Vec<(String, TypedValue)> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        check_batch(entries.len())?;
        for (key, value) in &entries {
            validate_key(key)?;
            validate_value(value)?;
        }
        self.core.local_mutate(|table, changes| {
            for (key, value) in entries {
                self.core.put_one(table, changes, key, value);
            }
            Ok(())
        })
    }

    /// Deletes several keys as one unit with one notification.
    pub fn delete_batch<K>(&self, keys: impl IntoIterator<Item = K>) -> CoreResult<()>
    where
        K: AsRef<str>,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        check_batch(keys.len())?;
        for key in &keys {
            validate_key(key.as_ref())?;
        }
        self.core.local_mutate(|table, changes| {
            for key in &keys {
                self.core
                    .delete_one(table, changes, &DeviceScope::Local, key.as_ref());
            }
            Ok(())
        })
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Starts a transaction. Writes apply immediately; notifications wait
    /// for commit.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when a transaction is already active.
    pub fn start_transaction(&self) -> CoreResult<TransactionId> {
        let mut state = self.core.state.write();
        self.core.ensure_open()?;
        if let Some(txn) = &state.txn {
            return Err(CoreError::invalid_operation(format!(
                "transaction {} is already active",
                txn.id()
            )));
        }
        let id = TransactionId::new(self.core.next_txn.fetch_add(1, Ordering::SeqCst));
        state.txn = Some(Transaction::new(id));
        self.core.stats.record_transaction_start();
        tracing::debug!(store = %self.core.store_id, txn = %id, "transaction started");
        Ok(id)
    }

    /// Commits the active transaction, publishing its net changes as one
    /// batch.
    pub fn commit(&self) -> CoreResult<()> {
        let mut guard = self.core.state.write();
        self.core.ensure_open()?;
        let state = &mut *guard;
        let mut txn = state
            .txn
            .take()
            .ok_or_else(|| CoreError::invalid_operation("no active transaction"))?;
        let changes = txn.commit()?;
        let net = changes.resolve(&state.table);
        let sequence =
            self.core
                .dispatcher
                .publish_changes(net, &self.core.local_device_id, ChangeOrigin::Local);
        self.core.stats.record_transaction_commit();
        tracing::debug!(
            store = %self.core.store_id,
            txn = %txn.id(),
            ?sequence,
            "transaction committed"
        );
        Ok(())
    }

    /// Rolls back the active transaction, restoring every touched key.
    pub fn rollback(&self) -> CoreResult<()> {
        let mut guard = self.core.state.write();
        self.core.ensure_open()?;
        let state = &mut *guard;
        let mut txn = state
            .txn
            .take()
            .ok_or_else(|| CoreError::invalid_operation("no active transaction"))?;
        txn.rollback(&mut state.table)?;
        self.core.stats.set_entry_count(state.table.len() as u64);
        self.core.stats.record_transaction_rollback();
        tracing::debug!(store = %self.core.store_id, txn = %txn.id(), "transaction rolled back");
        Ok(())
    }

    /// Id of the active transaction, if any.
    pub fn active_transaction(&self) -> CoreResult<Option<TransactionId>> {
        let state = self.core.state.read();
        self.core.ensure_open()?;
        Ok(state.txn.as_ref().map(Transaction::id))
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Registers an observer. Registering the same observer again only
    /// updates its filter.
    ///
    /// # Errors
    ///
    /// `SubscriptionLimitExceeded` for a ninth data-change observer.
    pub fn on(&self, subscription: Subscription) -> CoreResult<()> {
        self.core.ensure_open()?;
        self.core.dispatcher.subscribe(subscription)
    }

    /// Removes one observer of `kind`, or all of them when `observer` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `observer` is not subscribed.
    pub fn off(&self, kind: SubscriptionKind, observer: Option<&Subscription>) -> CoreResult<()> {
        self.core.ensure_open()?;
        self.core.dispatcher.unsubscribe(kind, observer)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Local entries selected by a prefix or query.
    pub fn get_entries<'a>(&self, selection: impl Into<Selection<'a>>) -> CoreResult<Vec<Entry>> {
        self.entries(&DeviceScope::Local, selection.into())
    }

    /// Entries of a device's scope selected by a prefix or query.
    pub fn get_entries_in<'a>(
        &self,
        device_id: &str,
        selection: impl Into<Selection<'a>>,
    ) -> CoreResult<Vec<Entry>> {
        let scope = self.core.scope_of(device_id)?;
        self.entries(&scope, selection.into())
    }

    fn entries(&self, scope: &DeviceScope, selection: Selection<'_>) -> CoreResult<Vec<Entry>> {
        let state = self.core.state.read();
        self.core.ensure_open()?;
        self.core.select(&state.table, scope, selection)
    }

    /// Opens a cursor over local entries selected by a prefix or query.
    ///
    /// # Errors
    ///
    /// `OverLimit` when the store already has the maximum number of open
    /// result sets.
    pub fn get_result_set<'a>(
        &self,
        selection: impl Into<Selection<'a>>,
    ) -> CoreResult<KvResultSet> {
        self.result_set(&DeviceScope::Local, selection.into())
    }

    /// Opens a cursor over a device's entries.
    pub fn get_result_set_in<'a>(
        &self,
        device_id: &str,
        selection: impl Into<Selection<'a>>,
    ) -> CoreResult<KvResultSet> {
        let scope = self.core.scope_of(device_id)?;
        self.result_set(&scope, selection.into())
    }

    fn result_set(&self, scope: &DeviceScope, selection: Selection<'_>) -> CoreResult<KvResultSet> {
        let rows = self.entries(scope, selection)?;
        self.core.acquire_result_set()?;
        Ok(KvResultSet::new(Arc::clone(&self.core), rows))
    }

    /// Closes a result set obtained from this store.
    pub fn close_result_set(&self, result_set: &mut KvResultSet) -> CoreResult<()> {
        self.core.ensure_open()?;
        result_set.close()
    }

    /// Number of local entries matching a query, after its limit and
    /// offset.
    pub fn get_result_size(&self, query: &Query) -> CoreResult<usize> {
        self.result_size(&DeviceScope::Local, query)
    }

    /// Number of a device's entries matching a query.
    pub fn get_result_size_in(&self, device_id: &str, query: &Query) -> CoreResult<usize> {
        let scope = self.core.scope_of(device_id)?;
        self.result_size(&scope, query)
    }

    fn result_size(&self, scope: &DeviceScope, query: &Query) -> CoreResult<usize> {
        let state = self.core.state.read();
        self.core.ensure_open()?;
        self.core.count(&state.table, scope, query)
    }

    // ========================================================================
    // Device sync
    // ========================================================================

    /// Enables or disables sync for this store.
    pub fn enable_sync(&self, enabled: bool) -> CoreResult<()> {
        self.core.ensure_open()?;
        self.core.sync.lock().enabled = enabled;
        tracing::debug!(store = %self.core.store_id, enabled, "sync toggled");
        Ok(())
    }

    /// Restricts sync to the labels both sides share.
    pub fn set_sync_range(
        &self,
        local_labels: &[String],
        remote_labels: &[String],
    ) -> CoreResult<()> {
        self.core.ensure_open()?;
        self.core.sync.lock().labels = sync::negotiate_range(local_labels, remote_labels);
        Ok(())
    }

    /// Sets the allowed sync delay in milliseconds.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` outside `100..=86_400_000`.
    pub fn set_sync_param(&self, allowed_delay_ms: u32) -> CoreResult<()> {
        self.core.ensure_open()?;
        sync::check_delay(allowed_delay_ms)?;
        self.core.sync.lock().allowed_delay_ms = Some(allowed_delay_ms);
        Ok(())
    }

    /// Runs a sync round through the manager's adapter and notifies
    /// `SyncComplete` observers.
    ///
    /// # Errors
    ///
    /// `Unsupported` without an adapter, `InvalidOperation` when sync is
    /// disabled, `InvalidArgument` for an empty or invalid device list.
    pub fn sync(
        &self,
        devices: &[String],
        mode: SyncMode,
        query: Option<&Query>,
    ) -> CoreResult<Vec<(String, SyncStatus)>> {
        self.core.ensure_open()?;
        let adapter = self
            .core
            .adapter
            .as_ref()
            .ok_or_else(|| CoreError::unsupported("no sync adapter is configured"))?;
        let settings = self.core.sync.lock().clone();
        if !settings.enabled {
            return Err(CoreError::invalid_operation("sync is disabled for this store"));
        }
        if devices.is_empty() {
            return Err(CoreError::invalid_argument("sync needs at least one device"));
        }
        for device in devices {
            check_device(device)?;
        }
        let query_plan = match query {
            Some(q) => {
                q.compile()?;
                Some(q.sql_like())
            }
            None => None,
        };
        let request = SyncRequest {
            app_id: self.core.app_id.clone(),
            store_id: self.core.store_id.to_string(),
            devices: devices.to_vec(),
            mode,
            labels: settings.labels,
            allowed_delay_ms: settings.allowed_delay_ms,
            query_plan,
        };
        tracing::debug!(
            store = %self.core.store_id,
            devices = devices.len(),
            ?mode,
            "sync started"
        );
        let results = adapter.sync(&request)?;
        self.core.dispatcher.publish_sync_complete(results.clone());
        Ok(results)
    }

    /// Applies a batch received from a peer and notifies `Remote`/`All`
    /// observers.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` while a transaction is active; `InvalidArgument`
    /// for the local device id or an invalid key.
    pub fn apply_remote_changes(&self, device_id: &str, changes: RemoteChanges) -> CoreResult<()> {
        check_device(device_id)?;
        if device_id == self.core.local_device_id {
            return Err(CoreError::invalid_argument(
                "remote changes cannot come from the local device",
            ));
        }
        for (key, value) in &changes.puts {
            validate_key(key)?;
            validate_value(value)?;
        }
        for key in &changes.deletes {
            validate_key(key)?;
        }
        let origin = DeviceScope::remote(device_id);
        let scope = match self.core.options.kv_store_type {
            KvStoreType::DeviceCollaboration => origin.clone(),
            _ => DeviceScope::Local,
        };
        let guard = Some("applying remote changes");
        self.core.mutate(ChangeOrigin::Remote, device_id, guard, |table, log| {
            for (key, value) in changes.puts {
                log.record(table, &scope, &key);
                table.put(scope.clone(), key, value, origin.clone());
            }
            for key in &changes.deletes {
                log.record(table, &scope, key);
                table.remove(&scope, key);
            }
            Ok(())
        })?;
        self.core.stats.record_remote_batch();
        Ok(())
    }

    /// Removes every entry a peer device contributed.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for the local device id.
    pub fn remove_device_data(&self, device_id: &str) -> CoreResult<()> {
        check_device(device_id)?;
        if device_id == self.core.local_device_id {
            return Err(CoreError::invalid_argument(
                "local data cannot be removed as device data",
            ));
        }
        let origin = DeviceScope::remote(device_id);
        let collaborative = self.core.options.kv_store_type == KvStoreType::DeviceCollaboration;
        self.core.local_mutate(|table, changes| {
            let doomed: Vec<(DeviceScope, String)> = if collaborative {
                table.scan(&origin).map(|e| (e.scope.clone(), e.key.clone())).collect()
            } else {
                table
                    .scan(&DeviceScope::Local)
                    .filter(|e| e.origin == origin)
                    .map(|e| (e.scope.clone(), e.key.clone()))
                    .collect()
            };
            for (scope, key) in &doomed {
                self.core.delete_one(table, changes, scope, key);
            }
            tracing::debug!(device = device_id, removed = doomed.len(), "device data removed");
            Ok(())
        })
    }

    /// Devices with entries in this store.
    pub fn remote_devices(&self) -> CoreResult<BTreeSet<String>> {
        let state = self.core.state.read();
        self.core.ensure_open()?;
        Ok(state.table.remote_devices())
    }

    // ========================================================================
    // Backup and Restore
    // ========================================================================

    /// Creates a backup of the local entries.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when the store was opened with backups disabled.
    pub fn backup(&self) -> CoreResult<Vec<u8>> {
        let state = self.core.state.read();
        self.core.ensure_open()?;
        if !self.core.options.backup {
            return Err(CoreError::invalid_operation("backups are disabled for this store"));
        }
        let entries = state.table.scan(&DeviceScope::Local).cloned().collect();
        backup::create(self.core.store_id.as_str(), state.table.clock(), entries)
    }

    /// Replaces the local entries with a backup's contents.
    ///
    /// The backup is fully validated before anything changes. Observers see
    /// one batch with the net difference.
    ///
    /// # Errors
    ///
    /// `Backup` for malformed data, `InvalidOperation` while a transaction
    /// is active.
    pub fn restore(&self, data: &[u8]) -> CoreResult<RestoreStats> {
        let (metadata, entries) = backup::read(data)?;
        let local = self.core.local_device_id.as_str();
        let guard = Some("restoring a backup");
        let restored = self.core.mutate(ChangeOrigin::Local, local, guard, |table, changes| {
            let current: Vec<String> = table
                .scan(&DeviceScope::Local)
                .map(|e| e.key.clone())
                .collect();
            for key in &current {
                self.core.delete_one(table, changes, &DeviceScope::Local, key);
            }
            let count = entries.len();
            for entry in entries {
                self.core.put_one(table, changes, entry.key, entry.value);
            }
            Ok(RestoreStats {
                entries_restored: count,
                entries_replaced: current.len(),
                backup_timestamp: metadata.timestamp,
            })
        })?;
        tracing::debug!(
            store = %self.core.store_id,
            entries = restored.entries_restored,
            "backup restored"
        );
        Ok(restored)
    }

    /// Validates a backup without restoring it.
    pub fn validate_backup(&self, data: &[u8]) -> CoreResult<BackupMetadata> {
        backup::read(data).map(|(metadata, _)| metadata)
    }

    /// Snapshot of the store's counters.
    pub fn stats(&self) -> CoreResult<StatsSnapshot> {
        self.core.ensure_open()?;
        Ok(self.core.stats.snapshot())
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("app_id", &self.core.app_id)
            .field("store_id", &self.core.store_id)
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::KvManager;
    use crate::notification::{ChangeNotification, SubscribeType};
    use crate::sync::MockSyncAdapter;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(100);

    fn manager() -> KvManager {
        KvManager::new(ManagerConfig::new("app").local_device_id("local"))
    }

    fn open(m: &KvManager) -> KvStore {
        m.get_kv_store("store", Options::default()).unwrap()
    }

    fn single(m: &KvManager) -> KvStore {
        m.get_kv_store(
            "single",
            Options::new().kv_store_type(KvStoreType::SingleVersion),
        )
        .unwrap()
    }

    fn observe(store: &KvStore, filter: SubscribeType) -> Receiver<ChangeNotification> {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        store
            .on(Subscription::data_change(filter, move |n| {
                let _ = tx.lock().send(n.clone());
            }))
            .unwrap();
        rx
    }

    fn keys(rows: &[Entry]) -> Vec<&str> {
        rows.iter().map(|e| e.key.as_str()).collect()
    }

    // === Point Operation Tests ===

    #[test]
    fn put_get_overwrite() {
        let m = manager();
        let store = open(&m);
        store.put("k", "v1").unwrap();
        store.put("k", 2i64).unwrap();
        assert_eq!(store.get("k").unwrap(), TypedValue::Integer(2));
        let rows = store.get_entries("k").unwrap();
        assert_eq!(rows[0].version, 2);
    }

    #[test]
    fn get_missing_is_not_found() {
        let m = manager();
        let err = open(&m).get("nope").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert_eq!(err.code(), crate::error::codes::NOT_FOUND);
    }

    #[test]
    fn key_and_value_limits() {
        let m = manager();
        let store = open(&m);
        assert!(store.put("", 1i64).unwrap_err().is_invalid_argument());
        assert!(store.put(&"k".repeat(1025), 1i64).unwrap_err().is_invalid_argument());
        let huge = vec![0u8; distkv_codec::MAX_VALUE_LENGTH];
        assert!(store.put("k", huge).unwrap_err().is_over_limit());
        assert!(store.get_entries("").unwrap().is_empty());
    }

    #[test]
    fn typed_reads() {
        let m = manager();
        let store = open(&m);
        store.put("i", 5i64).unwrap();
        store.put("f", 1.5f32).unwrap();
        store.put("s", "x").unwrap();
        assert_eq!(store.get_as("i", ValueType::Double).unwrap(), TypedValue::Double(5.0));
        assert_eq!(store.get_as("f", ValueType::Double).unwrap(), TypedValue::Double(1.5));
        let err = store.get_as("s", ValueType::Integer).unwrap_err();
        assert_eq!(err.code(), crate::error::codes::INVALID_ARGUMENT);
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
        assert!(err.is_type_mismatch());

        let mut rows = store.get_result_set("s").unwrap();
        rows.move_to_first().unwrap();
        let column = rows.get_long(1).unwrap_err();
        assert!(matches!(column, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn boundary_values_roundtrip() {
        let m = manager();
        let store = open(&m);
        let largest = vec![7u8; distkv_codec::MAX_VALUE_LENGTH - 1];
        store.put("k", largest.clone()).unwrap();
        store.put("e", "").unwrap();
        store.put("min", i64::MIN).unwrap();
        store.put("max", i64::MAX).unwrap();

        assert_eq!(store.get("k").unwrap(), TypedValue::ByteArray(largest));
        assert_eq!(store.get("e").unwrap(), TypedValue::String(String::new()));
        assert_eq!(store.get("min").unwrap(), TypedValue::Integer(i64::MIN));
        assert_eq!(store.get("max").unwrap(), TypedValue::Integer(i64::MAX));
    }

    #[test]
    fn delete_key_and_query() {
        let m = manager();
        let store = open(&m);
        store.delete("absent").unwrap();
        store
            .put_batch([("a_1", 1i64), ("a_2", 2i64), ("b_1", 3i64)])
            .unwrap();
        store.delete("b_1").unwrap();

        let mut q = Query::new();
        q.greater_than(crate::query::VALUE_FIELD, 1i64).unwrap();
        store.delete(&q).unwrap();
        assert_eq!(keys(&store.get_entries("").unwrap()), vec!["a_1"]);
    }

    // === Batch Tests ===

    #[test]
    fn batch_emits_one_notification() {
        let m = manager();
        let store = open(&m);
        let rx = observe(&store, SubscribeType::Local);
        store.put("a", 0i64).unwrap();
        store
            .put_batch([("a", 1i64), ("b", 2i64), ("c", 3i64)])
            .unwrap();

        let first = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(first.inserted.len(), 1);
        let batch = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(batch.inserted.len(), 2);
        assert_eq!(batch.updated.len(), 1);
        assert_eq!(batch.device_id, "local");
        assert!(rx.recv_timeout(QUIET).is_err());

        store.delete_batch(["a", "b", "zz"]).unwrap();
        let deleted = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(deleted.deleted.len(), 2);
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let m = manager();
        let store = open(&m);
        let err = store.put_batch([("ok", 1i64), ("", 2i64)]).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(store.get("ok").is_err());

        let too_many: Vec<(String, i64)> =
            (0..=MAX_BATCH_SIZE as i64).map(|i| (format!("k{i}"), i)).collect();
        assert!(store.put_batch(too_many).unwrap_err().is_over_limit());
        assert!(store.get_entries("").unwrap().is_empty());
    }

    // === Transaction Tests ===

    #[test]
    fn transaction_commit_emits_net_batch() {
        let m = manager();
        let store = open(&m);
        let rx = observe(&store, SubscribeType::All);
        store.start_transaction().unwrap();
        store.put_batch([("a", 1i64), ("b", 2i64), ("c", 3i64)]).unwrap();
        store.delete("b").unwrap();
        assert_eq!(store.get("a").unwrap(), TypedValue::Integer(1));
        assert!(rx.recv_timeout(QUIET).is_err());

        store.commit().unwrap();
        let batch = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(keys(&batch.inserted), vec!["a", "c"]);
        assert!(batch.deleted.is_empty());
        assert!(rx.recv_timeout(QUIET).is_err());
        assert_eq!(store.active_transaction().unwrap(), None);
    }

    #[test]
    fn transaction_rollback_restores() {
        let m = manager();
        let store = open(&m);
        store.put("a", 1i64).unwrap();
        let rx = observe(&store, SubscribeType::All);

        store.start_transaction().unwrap();
        store.put("a", 9i64).unwrap();
        store.put("b", 2i64).unwrap();
        store.delete("a").unwrap();
        store.rollback().unwrap();

        assert_eq!(store.get("a").unwrap(), TypedValue::Integer(1));
        assert!(store.get("b").is_err());
        assert!(rx.recv_timeout(QUIET).is_err());
        assert_eq!(store.get_entries("a").unwrap()[0].version, 1);
    }

    #[test]
    fn transaction_state_errors() {
        let m = manager();
        let store = open(&m);
        assert!(matches!(store.commit(), Err(CoreError::InvalidOperation { .. })));
        assert!(store.rollback().is_err());
        let id = store.start_transaction().unwrap();
        assert_eq!(store.active_transaction().unwrap(), Some(id));
        assert!(store.start_transaction().is_err());
        store.commit().unwrap();
        assert!(store.commit().is_err());
        let next = store.start_transaction().unwrap();
        assert!(next > id);
    }

    #[test]
    fn close_discards_active_transaction() {
        let m = manager();
        let store = open(&m);
        store.put("a", 1i64).unwrap();
        store.start_transaction().unwrap();
        store.put("a", 2i64).unwrap();
        m.close_kv_store("app", "store").unwrap();

        let reopened = open(&m);
        assert_eq!(reopened.get("a").unwrap(), TypedValue::Integer(1));
        assert_eq!(reopened.active_transaction().unwrap(), None);
    }

    // === Closed Store Tests ===

    #[test]
    fn closed_store_rejects_everything() {
        let m = manager();
        let store = open(&m);
        m.close_kv_store("app", "store").unwrap();
        assert!(matches!(store.put("k", 1i64), Err(CoreError::StoreClosed)));
        assert!(matches!(store.get("k"), Err(CoreError::StoreClosed)));
        assert!(matches!(store.delete("k"), Err(CoreError::StoreClosed)));
        assert!(matches!(store.start_transaction(), Err(CoreError::StoreClosed)));
        let sub = Subscription::data_change(SubscribeType::All, |_| {});
        assert!(matches!(store.on(sub), Err(CoreError::StoreClosed)));
        assert!(matches!(store.get_entries(""), Err(CoreError::StoreClosed)));
        assert_eq!(
            store.stats().unwrap_err().code(),
            crate::error::codes::ALREADY_CLOSED
        );
    }

    // === Device Scope Tests ===

    #[test]
    fn remote_changes_land_in_device_scope() {
        let m = manager();
        let store = open(&m);
        let local_rx = observe(&store, SubscribeType::Local);
        let remote_rx = observe(&store, SubscribeType::Remote);

        store
            .apply_remote_changes("peer", RemoteChanges::new().put("k", "theirs"))
            .unwrap();
        store.put("k", "mine").unwrap();

        assert_eq!(store.get("k").unwrap(), TypedValue::from("mine"));
        assert_eq!(store.get_in("peer", "k").unwrap(), TypedValue::from("theirs"));
        assert_eq!(store.get_in("local", "k").unwrap(), TypedValue::from("mine"));
        assert!(matches!(store.get_in("ghost", "k"), Err(CoreError::NotFound { .. })));

        let remote = remote_rx.recv_timeout(WAIT).unwrap();
        assert_eq!(remote.origin, ChangeOrigin::Remote);
        assert_eq!(remote.device_id, "peer");
        let local = local_rx.recv_timeout(WAIT).unwrap();
        assert_eq!(local.origin, ChangeOrigin::Local);
        assert!(local_rx.recv_timeout(QUIET).is_err());

        let mut q = Query::new();
        q.device_id("peer").unwrap();
        assert_eq!(store.get_result_size(&q).unwrap(), 1);
        assert_eq!(store.remote_devices().unwrap().len(), 1);
    }

    #[test]
    fn remote_changes_rejected_during_transaction() {
        let m = manager();
        let store = open(&m);
        store.start_transaction().unwrap();
        let err = store
            .apply_remote_changes("peer", RemoteChanges::new().put("k", 1i64))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
        assert!(store.apply_remote_changes("local", RemoteChanges::new()).is_err());
    }

    #[test]
    fn remove_device_data_clears_scope() {
        let m = manager();
        let store = open(&m);
        store
            .apply_remote_changes("peer", RemoteChanges::new().put("a", 1i64).put("b", 2i64))
            .unwrap();
        store.put("a", 0i64).unwrap();
        store.remove_device_data("peer").unwrap();
        assert!(store.get_entries_in("peer", "").unwrap().is_empty());
        assert_eq!(store.get("a").unwrap(), TypedValue::Integer(0));
        assert!(store.remove_device_data("local").is_err());
    }

    #[test]
    fn single_version_tracks_origin() {
        let m = manager();
        let store = single(&m);
        store.put("mine", 1i64).unwrap();
        store
            .apply_remote_changes("peer", RemoteChanges::new().put("theirs", 2i64))
            .unwrap();

        assert_eq!(store.get("theirs").unwrap(), TypedValue::Integer(2));
        assert!(store.get_in("peer", "theirs").unwrap_err().is_invalid_argument());

        let mut q = Query::new();
        q.device_id("peer").unwrap();
        assert_eq!(keys(&store.get_entries(&q).unwrap()), vec!["theirs"]);

        store.remove_device_data("peer").unwrap();
        assert_eq!(keys(&store.get_entries("").unwrap()), vec!["mine"]);
    }

    // === Sync Tests ===

    #[test]
    fn sync_without_adapter_unsupported() {
        let m = manager();
        let err = open(&m)
            .sync(&["peer".to_string()], SyncMode::PushPull, None)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::codes::NOT_SUPPORTED);
    }

    #[test]
    fn sync_through_adapter() {
        let adapter = Arc::new(MockSyncAdapter::new());
        let m = KvManager::new(ManagerConfig::new("app").local_device_id("local"))
            .with_sync_adapter(adapter.clone());
        let store = open(&m);
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        store
            .on(Subscription::sync_complete(move |results| {
                let _ = tx.lock().send(results.to_vec());
            }))
            .unwrap();

        let labels = |xs: &[&str]| xs.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        store
            .set_sync_range(&labels(&["a", "b"]), &labels(&["b", "c"]))
            .unwrap();
        store.set_sync_param(500).unwrap();
        assert!(store.set_sync_param(50).is_err());

        let mut q = Query::new();
        q.prefix_key("user_").unwrap();
        let results = store.sync(&labels(&["p1", "p2"]), SyncMode::Push, Some(&q)).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), results);

        let request = &adapter.requests()[0];
        assert_eq!(request.labels, labels(&["b"]));
        assert_eq!(request.allowed_delay_ms, Some(500));
        assert_eq!(request.query_plan.as_deref(), Some(" ^KEY_PREFIX user_"));

        assert!(store.sync(&[], SyncMode::Pull, None).unwrap_err().is_invalid_argument());
        store.enable_sync(false).unwrap();
        assert!(matches!(
            store.sync(&labels(&["p1"]), SyncMode::Pull, None),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    // === Backup Tests ===

    #[test]
    fn backup_and_restore() {
        let m = manager();
        let store = open(&m);
        store.put_batch([("a", 1i64), ("b", 2i64)]).unwrap();
        store
            .apply_remote_changes("peer", RemoteChanges::new().put("r", 3i64))
            .unwrap();
        let data = store.backup().unwrap();
        assert_eq!(store.validate_backup(&data).unwrap().entry_count, 2);

        store.delete("a").unwrap();
        store.put("c", 4i64).unwrap();
        let rx = observe(&store, SubscribeType::Local);
        let stats = store.restore(&data).unwrap();
        assert_eq!(stats.entries_restored, 2);
        assert_eq!(stats.entries_replaced, 2);

        assert_eq!(keys(&store.get_entries("").unwrap()), vec!["a", "b"]);
        assert_eq!(store.get_in("peer", "r").unwrap(), TypedValue::Integer(3));
        let batch = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(keys(&batch.inserted), vec!["a"]);
        assert_eq!(keys(&batch.deleted), vec!["c"]);
    }

    #[test]
    fn restore_rejects_garbage() {
        let m = manager();
        let store = open(&m);
        store.put("a", 1i64).unwrap();
        assert!(matches!(store.restore(b"nonsense"), Err(CoreError::Backup { .. })));
        assert_eq!(store.get("a").unwrap(), TypedValue::Integer(1));
    }

    #[test]
    fn backup_disabled_by_options() {
        let m = manager();
        let store = m
            .get_kv_store("nobackup", Options::new().backup(false))
            .unwrap();
        assert!(matches!(store.backup(), Err(CoreError::InvalidOperation { .. })));
    }

    // === Result Set Tests ===

    #[test]
    fn result_set_bound() {
        let m = manager();
        let store = open(&m);
        let mut open_sets: Vec<KvResultSet> = (0..crate::config::DEFAULT_MAX_OPEN_RESULT_SETS)
            .map(|_| store.get_result_set("").unwrap())
            .collect();
        assert!(store.get_result_set("").unwrap_err().is_over_limit());

        store.close_result_set(&mut open_sets[0]).unwrap();
        let _again = store.get_result_set("").unwrap();
        open_sets.pop();
        let _and_again = store.get_result_set("").unwrap();
    }

    #[test]
    fn stats_track_operations() {
        let m = manager();
        let store = open(&m);
        store.put_batch([("a", 1i64), ("b", 2i64)]).unwrap();
        store.get("a").unwrap();
        store.delete("b").unwrap();
        store.get_entries("").unwrap();
        store.start_transaction().unwrap();
        store.commit().unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.transactions_committed, 1);
        assert_eq!(stats.entry_count, 1);
    }
}
