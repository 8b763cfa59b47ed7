//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up managers and stores and
//! for observing the notifications they publish.

use distkv_core::{
    ChangeNotification, KvManager, KvStore, KvStoreType, ManagerConfig, Options, SubscribeType,
    Subscription, SubscriptionKind,
};
use distkv_core::sync::MockSyncAdapter;
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Once};
use std::time::Duration;

/// How long to wait for an expected notification.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait before concluding that nothing was delivered.
pub const QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Installs a `tracing` subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A manager wired to a mock sync adapter, with a fixed device id.
pub struct TestManager {
    /// The manager instance.
    pub manager: KvManager,
    /// The adapter every sync call goes through.
    pub adapter: Arc<MockSyncAdapter>,
}

impl TestManager {
    /// Application id used by every test manager.
    pub const APP_ID: &'static str = "test_app";
    /// Local device id used by every test manager.
    pub const DEVICE_ID: &'static str = "local_device";

    /// Creates a new test manager.
    pub fn new() -> Self {
        init_tracing();
        let adapter = Arc::new(MockSyncAdapter::new());
        let manager =
            KvManager::new(ManagerConfig::new(Self::APP_ID).local_device_id(Self::DEVICE_ID))
                .with_sync_adapter(adapter.clone());
        Self { manager, adapter }
    }

    /// Opens a device-collaboration store with default options.
    pub fn store(&self, store_id: &str) -> KvStore {
        self.store_with(store_id, Options::default())
    }

    /// Opens a single-version store.
    pub fn single_version_store(&self, store_id: &str) -> KvStore {
        self.store_with(
            store_id,
            Options::new().kv_store_type(KvStoreType::SingleVersion),
        )
    }

    /// Opens a store with explicit options.
    pub fn store_with(&self, store_id: &str, options: Options) -> KvStore {
        self.manager
            .get_kv_store(store_id, options)
            .expect("Failed to open store")
    }

    /// Closes one reference to a store.
    pub fn close(&self, store_id: &str) {
        self.manager
            .close_kv_store(Self::APP_ID, store_id)
            .expect("Failed to close store");
    }
}

impl Default for TestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestManager {
    type Target = KvManager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

/// Runs a test with a fresh device-collaboration store.
///
/// # Example
///
/// ```rust,ignore
/// use distkv_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         store.put("k", "v").unwrap();
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&KvStore) -> R,
{
    let manager = TestManager::new();
    let store = manager.store("temp");
    f(&store)
}

/// Collects the notifications a store delivers to one observer.
pub struct RecordingObserver {
    subscription: Subscription,
    rx: Receiver<ChangeNotification>,
}

impl RecordingObserver {
    /// Subscribes a new recorder to `store`.
    pub fn attach(store: &KvStore, filter: SubscribeType) -> Self {
        let observer = Self::detached(filter);
        store
            .on(observer.subscription.clone())
            .expect("Failed to subscribe");
        observer
    }

    /// Creates a recorder without subscribing it.
    pub fn detached(filter: SubscribeType) -> Self {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let subscription = Subscription::data_change(filter, move |batch| {
            let _ = tx.lock().send(batch.clone());
        });
        Self { subscription, rx }
    }

    /// The subscription, for passing to `on` or `off`.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Unsubscribes this recorder from `store`.
    pub fn detach(&self, store: &KvStore) {
        store
            .off(SubscriptionKind::DataChange, Some(&self.subscription))
            .expect("Failed to unsubscribe");
    }

    /// Waits for the next batch.
    pub fn next(&self, timeout: Duration) -> Option<ChangeNotification> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Waits for the next batch, failing the test when none arrives.
    pub fn expect_batch(&self) -> ChangeNotification {
        self.next(DELIVERY_TIMEOUT)
            .expect("Expected a change notification")
    }

    /// Asserts that nothing is delivered within the quiet period.
    pub fn assert_quiet(&self) {
        if let Some(batch) = self.next(QUIET_PERIOD) {
            panic!("Unexpected change notification: {batch:?}");
        }
    }

    /// Returns every batch delivered within the quiet period.
    pub fn drain(&self) -> Vec<ChangeNotification> {
        std::iter::from_fn(|| self.next(QUIET_PERIOD)).collect()
    }
}

impl std::fmt::Debug for RecordingObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingObserver").finish_non_exhaustive()
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// JSON document stored by [`populated_store`].
    pub fn user_json(id: usize, name: &str, age: i64) -> String {
        format!(r#"{{"id":{id},"name":"{name}","age":{age}}}"#)
    }

    /// Key of the `i`th user written by [`populated_store`].
    pub fn user_key(i: usize) -> String {
        format!("user_{i:03}")
    }

    /// Opens `store_id` and writes `count` JSON users in one batch each
    /// of at most 128 entries.
    pub fn populated_store(manager: &TestManager, store_id: &str, count: usize) -> KvStore {
        let store = manager.store(store_id);
        let users: Vec<(String, String)> = (0..count)
            .map(|i| (user_key(i), user_json(i, &format!("name_{i}"), 20 + (i % 50) as i64)))
            .collect();
        for chunk in users.chunks(distkv_core::MAX_BATCH_SIZE) {
            store
                .put_batch(chunk.iter().cloned())
                .expect("Failed to populate store");
        }
        store
    }
}
