//! Store lifecycle.
//!
//! The manager owns one slot per `(app_id, store_id)`. Opening a store that
//! is already open hands out another handle to the same shared state and
//! bumps the slot's reference count; the last close shuts the state down.
//! Entries of a closed store stay in its slot and come back on re-open,
//! while handles from before the close keep failing with `StoreClosed`.

use crate::config::{KvStoreType, ManagerConfig, Options};
use crate::entry::EntryTable;
use crate::error::{CoreError, CoreResult};
use crate::notification::DeathObserver;
use crate::store::{KvStore, StoreCore};
use crate::sync::SyncAdapter;
use crate::types::StoreId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

type SlotKey = (String, String);

struct StoreSlot {
    options: Options,
    refs: usize,
    core: Option<Arc<StoreCore>>,
    saved: EntryTable,
}

/// Opens, closes and deletes stores of one application.
pub struct KvManager {
    config: ManagerConfig,
    slots: Mutex<HashMap<SlotKey, StoreSlot>>,
    adapter: Option<Arc<dyn SyncAdapter>>,
    death_observers: RwLock<Vec<DeathObserver>>,
}

impl KvManager {
    /// Creates a manager without a sync adapter.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        tracing::debug!(app = %config.app_id, device = %config.local_device_id, "manager created");
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
            adapter: None,
            death_observers: RwLock::new(Vec::new()),
        }
    }

    /// Routes `sync` calls of stores opened afterwards through `adapter`.
    #[must_use]
    pub fn with_sync_adapter(mut self, adapter: Arc<dyn SyncAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Returns the manager configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Opens a store, creating it when allowed.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a malformed store id
    /// - `Unsupported` for multi-version stores
    /// - `OptionsMismatch` when the store exists with a different type,
    ///   security level or encryption flag
    /// - `StoreNotFound` for an unknown store with `create_if_missing` off
    pub fn get_kv_store(&self, store_id: &str, options: Options) -> CoreResult<KvStore> {
        let id = StoreId::new(store_id)?;
        if options.kv_store_type == KvStoreType::MultiVersion {
            return Err(CoreError::unsupported("multi-version stores are not supported"));
        }
        let key = (self.config.app_id.clone(), id.as_str().to_string());
        let mut slots = self.slots.lock();
        match slots.get(&key) {
            Some(slot) => {
                if let Some(reason) = slot.options.conflict_with(&options) {
                    return Err(CoreError::options_mismatch(format!(
                        "store {id} is open with a different {reason}"
                    )));
                }
            }
            None if !options.create_if_missing => {
                return Err(CoreError::store_not_found(id.as_str()));
            }
            None => {}
        }
        let slot = slots.entry(key).or_insert_with(|| StoreSlot {
            options,
            refs: 0,
            core: None,
            saved: EntryTable::new(),
        });
        let core = match &slot.core {
            Some(core) => Arc::clone(core),
            None => {
                let core = StoreCore::open(
                    &self.config,
                    id,
                    slot.options,
                    slot.saved.take(),
                    self.adapter.clone(),
                );
                slot.core = Some(Arc::clone(&core));
                core
            }
        };
        slot.refs += 1;
        Ok(KvStore::new(core))
    }

    /// Releases one reference to an open store; the last one closes it.
    ///
    /// # Errors
    ///
    /// `StoreNotFound` when the store is not open.
    pub fn close_kv_store(&self, app_id: &str, store_id: &str) -> CoreResult<()> {
        let closing = {
            let mut slots = self.slots.lock();
            let slot = slots
                .get_mut(&(app_id.to_string(), store_id.to_string()))
                .filter(|slot| slot.core.is_some())
                .ok_or_else(|| CoreError::store_not_found(store_id))?;
            slot.refs = slot.refs.saturating_sub(1);
            if slot.refs > 0 {
                return Ok(());
            }
            let core = slot.core.take();
            if let Some(table) = core.as_ref().and_then(|core| core.seal()) {
                slot.saved = table;
            }
            core
        };
        // Joined without the slot lock: draining observers may call back in.
        if let Some(core) = closing {
            core.stop_delivery();
        }
        Ok(())
    }

    /// Deletes a store and its entries, closing it first when open.
    ///
    /// # Errors
    ///
    /// `StoreNotFound` for an unknown store.
    pub fn delete_kv_store(&self, app_id: &str, store_id: &str) -> CoreResult<()> {
        let slot = self
            .slots
            .lock()
            .remove(&(app_id.to_string(), store_id.to_string()))
            .ok_or_else(|| CoreError::store_not_found(store_id))?;
        if let Some(core) = slot.core {
            core.close();
        }
        tracing::debug!(app = app_id, store = store_id, "store deleted");
        Ok(())
    }

    /// Ids of the currently open stores of `app_id`, sorted.
    #[must_use]
    pub fn get_all_kv_store_ids(&self, app_id: &str) -> Vec<String> {
        let slots = self.slots.lock();
        let mut ids: Vec<String> = slots
            .iter()
            .filter(|((app, _), slot)| app == app_id && slot.core.is_some())
            .map(|((_, id), _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Registers an observer of backing-service loss. Re-registering the
    /// same observer is a no-op.
    pub fn on_service_death(&self, observer: DeathObserver) {
        let mut observers = self.death_observers.write();
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    /// Removes one service-death observer, or all of them with `None`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `observer` is not registered.
    pub fn off_service_death(&self, observer: Option<&DeathObserver>) -> CoreResult<()> {
        let mut observers = self.death_observers.write();
        match observer {
            None => observers.clear(),
            Some(target) => {
                let before = observers.len();
                observers.retain(|o| !Arc::ptr_eq(o, target));
                if observers.len() == before {
                    return Err(CoreError::invalid_argument(
                        "observer is not registered for service death",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Signals loss of the backing service to manager observers and to the
    /// `ServiceDie` observers of every open store.
    pub fn notify_service_death(&self) {
        tracing::warn!(app = %self.config.app_id, "backing service died");
        let observers = self.death_observers.read().clone();
        for observer in observers {
            observer();
        }
        let cores: Vec<Arc<StoreCore>> = self
            .slots
            .lock()
            .values()
            .filter_map(|slot| slot.core.clone())
            .collect();
        for core in cores {
            core.publish_service_death();
        }
    }
}

impl std::fmt::Debug for KvManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvManager")
            .field("app_id", &self.config.app_id)
            .field("open_stores", &self.get_all_kv_store_ids(&self.config.app_id))
            .finish_non_exhaustive()
    }
}

impl Drop for KvManager {
    fn drop(&mut self) {
        for slot in self.slots.get_mut().values_mut() {
            if let Some(core) = slot.core.take() {
                core.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityLevel;
    use distkv_codec::TypedValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> KvManager {
        KvManager::new(ManagerConfig::new("app").local_device_id("local"))
    }

    #[test]
    fn open_is_idempotent_and_shared() {
        let m = manager();
        let a = m.get_kv_store("s", Options::default()).unwrap();
        let b = m.get_kv_store("s", Options::default()).unwrap();
        a.put("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap(), TypedValue::from("v"));
        assert_eq!(m.get_all_kv_store_ids("app"), vec!["s".to_string()]);
    }

    #[test]
    fn invalid_store_ids_rejected() {
        let m = manager();
        assert!(m.get_kv_store("", Options::default()).unwrap_err().is_invalid_argument());
        assert!(m.get_kv_store("a-b", Options::default()).is_err());
        assert!(m.get_kv_store(&"x".repeat(129), Options::default()).is_err());
        assert!(m.get_kv_store(&"x".repeat(128), Options::default()).is_ok());
    }

    #[test]
    fn multi_version_unsupported() {
        let m = manager();
        let err = m
            .get_kv_store("s", Options::new().kv_store_type(KvStoreType::MultiVersion))
            .unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { .. }));
    }

    #[test]
    fn reopen_with_conflicting_options() {
        let m = manager();
        m.get_kv_store("s", Options::default()).unwrap();
        let err = m
            .get_kv_store("s", Options::new().security_level(SecurityLevel::S3))
            .unwrap_err();
        assert!(matches!(err, CoreError::OptionsMismatch { .. }));
        let err = m
            .get_kv_store("s", Options::new().kv_store_type(KvStoreType::SingleVersion))
            .unwrap_err();
        assert_eq!(err.code(), crate::error::codes::OPTIONS_MISMATCH);
    }

    #[test]
    fn missing_store_without_create() {
        let m = manager();
        let err = m
            .get_kv_store("s", Options::new().create_if_missing(false))
            .unwrap_err();
        assert!(matches!(err, CoreError::StoreNotFound { .. }));
    }

    #[test]
    fn close_is_reference_counted() {
        let m = manager();
        let a = m.get_kv_store("s", Options::default()).unwrap();
        let _b = m.get_kv_store("s", Options::default()).unwrap();

        m.close_kv_store("app", "s").unwrap();
        assert!(a.is_open());
        m.close_kv_store("app", "s").unwrap();
        assert!(!a.is_open());
        assert!(matches!(a.get("k"), Err(CoreError::StoreClosed)));
        assert!(m.get_all_kv_store_ids("app").is_empty());
        assert!(m.close_kv_store("app", "s").is_err());
    }

    #[test]
    fn observer_may_call_manager_while_store_closes() {
        use crate::notification::{SubscribeType, Subscription};
        use std::sync::mpsc;
        use std::time::Duration;

        let m = Arc::new(manager());
        let store = m.get_kv_store("s", Options::default()).unwrap();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (seen_tx, seen_rx) = mpsc::channel();
        let gate = parking_lot::Mutex::new(gate_rx);
        let seen = parking_lot::Mutex::new(seen_tx);
        let observed = Arc::clone(&m);
        store
            .on(Subscription::data_change(SubscribeType::All, move |_| {
                let _ = gate.lock().recv_timeout(Duration::from_secs(5));
                let _ = seen.lock().send(observed.get_all_kv_store_ids("app"));
            }))
            .unwrap();
        store.put("k", 1i64).unwrap();

        let closer = Arc::clone(&m);
        let (done_tx, done_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = done_tx.send(closer.close_kv_store("app", "s"));
        });
        while !m.get_all_kv_store_ids("app").is_empty() {
            std::thread::sleep(Duration::from_millis(5));
        }
        gate_tx.send(()).unwrap();

        let ids = seen_rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert!(ids.is_empty());
        done_rx.recv_timeout(Duration::from_secs(3)).unwrap().unwrap();
        assert!(!store.is_open());

        let reopened = m
            .get_kv_store("s", Options::new().create_if_missing(false))
            .unwrap();
        assert_eq!(reopened.get("k").unwrap(), TypedValue::Integer(1));
    }

    #[test]
    fn data_survives_close() {
        let m = manager();
        let a = m.get_kv_store("s", Options::default()).unwrap();
        a.put("k", 7i64).unwrap();
        m.close_kv_store("app", "s").unwrap();

        let b = m
            .get_kv_store("s", Options::new().create_if_missing(false))
            .unwrap();
        assert_eq!(b.get("k").unwrap(), TypedValue::Integer(7));
        assert!(matches!(a.get("k"), Err(CoreError::StoreClosed)));
    }

    #[test]
    fn delete_removes_data() {
        let m = manager();
        let a = m.get_kv_store("s", Options::default()).unwrap();
        a.put("k", 1i64).unwrap();
        m.delete_kv_store("app", "s").unwrap();
        assert!(!a.is_open());
        assert!(m.delete_kv_store("app", "s").is_err());

        let b = m.get_kv_store("s", Options::default()).unwrap();
        assert!(matches!(b.get("k"), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn unknown_app_is_not_found() {
        let m = manager();
        m.get_kv_store("s", Options::default()).unwrap();
        assert!(m.close_kv_store("other", "s").is_err());
        assert!(m.get_all_kv_store_ids("other").is_empty());
    }

    #[test]
    fn service_death_observers() {
        let m = manager();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let observer: DeathObserver = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        m.on_service_death(observer.clone());
        m.on_service_death(observer.clone());
        m.notify_service_death();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        m.off_service_death(Some(&observer)).unwrap();
        assert!(m.off_service_death(Some(&observer)).is_err());
        m.notify_service_death();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
