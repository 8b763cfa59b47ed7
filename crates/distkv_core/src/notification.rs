//! Change notifications and subscriptions.
//!
//! Each store owns a [`Dispatcher`]. Mutations publish their net changes
//! while still holding the store's write lock, so batches enter the
//! delivery channel in commit order. A dedicated thread drains the channel
//! and invokes observers, which therefore never run on the caller's stack.
//!
//! Observers are captured when a batch is published: a subscriber
//! registered afterwards does not see it.

use crate::entry::{Entry, NetChanges};
use crate::error::{CoreError, CoreResult};
use crate::sync::SyncStatus;
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// Maximum number of data-change subscriptions per store.
pub const MAX_DATA_CHANGE_SUBSCRIPTIONS: usize = 8;

/// Where a batch of changes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written through this store.
    Local,
    /// Received from another device.
    Remote,
}

/// One committed batch of changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    /// Entries that did not exist before the batch.
    pub inserted: Vec<Entry>,
    /// Entries that existed and were overwritten.
    pub updated: Vec<Entry>,
    /// Entries removed by the batch, with their last value.
    pub deleted: Vec<Entry>,
    /// Device that produced the batch.
    pub device_id: String,
    /// Local or remote.
    pub origin: ChangeOrigin,
    /// Per-store publication counter, starting at 1.
    pub sequence: u64,
}

impl ChangeNotification {
    /// Total number of changed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which data changes a subscriber wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeType {
    /// Changes written locally.
    Local,
    /// Changes received from peers.
    Remote,
    /// Both.
    All,
}

impl SubscribeType {
    fn accepts(self, origin: ChangeOrigin) -> bool {
        match self {
            Self::All => true,
            Self::Local => origin == ChangeOrigin::Local,
            Self::Remote => origin == ChangeOrigin::Remote,
        }
    }
}

/// Observer of data changes.
pub type DataObserver = Arc<dyn Fn(&ChangeNotification) + Send + Sync>;
/// Observer of finished sync rounds.
pub type SyncObserver = Arc<dyn Fn(&[(String, SyncStatus)]) + Send + Sync>;
/// Observer of backing-service loss.
pub type DeathObserver = Arc<dyn Fn() + Send + Sync>;

/// Kind of subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Data changes.
    DataChange,
    /// Sync completion.
    SyncComplete,
    /// Service death.
    ServiceDie,
}

/// An observer together with what it observes.
#[derive(Clone)]
pub enum Subscription {
    /// Data changes matching a filter.
    DataChange(SubscribeType, DataObserver),
    /// Finished sync rounds.
    SyncComplete(SyncObserver),
    /// Loss of the backing service.
    ServiceDie(DeathObserver),
}

impl Subscription {
    /// Subscribes `f` to data changes.
    pub fn data_change(
        filter: SubscribeType,
        f: impl Fn(&ChangeNotification) + Send + Sync + 'static,
    ) -> Self {
        Self::DataChange(filter, Arc::new(f))
    }

    /// Subscribes `f` to sync completion.
    pub fn sync_complete(f: impl Fn(&[(String, SyncStatus)]) + Send + Sync + 'static) -> Self {
        Self::SyncComplete(Arc::new(f))
    }

    /// Subscribes `f` to service death.
    pub fn service_die(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::ServiceDie(Arc::new(f))
    }

    /// The kind of this subscription.
    #[must_use]
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            Self::DataChange(..) => SubscriptionKind::DataChange,
            Self::SyncComplete(_) => SubscriptionKind::SyncComplete,
            Self::ServiceDie(_) => SubscriptionKind::ServiceDie,
        }
    }

    /// Whether both subscriptions carry the same observer.
    fn same_observer(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::DataChange(_, a), Self::DataChange(_, b)) => Arc::ptr_eq(a, b),
            (Self::SyncComplete(a), Self::SyncComplete(b)) => Arc::ptr_eq(a, b),
            (Self::ServiceDie(a), Self::ServiceDie(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataChange(filter, _) => write!(f, "DataChange({filter:?})"),
            Self::SyncComplete(_) => f.write_str("SyncComplete"),
            Self::ServiceDie(_) => f.write_str("ServiceDie"),
        }
    }
}

/// Registered subscriptions of one store.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    subscriptions: Vec<Subscription>,
}

impl Registry {
    fn count(&self, kind: SubscriptionKind) -> usize {
        self.subscriptions.iter().filter(|s| s.kind() == kind).count()
    }

    /// Registers a subscription. Registering an observer again replaces
    /// its data-change filter.
    pub(crate) fn add(&mut self, subscription: Subscription) -> CoreResult<()> {
        if let Some(existing) = self
            .subscriptions
            .iter_mut()
            .find(|s| s.same_observer(&subscription))
        {
            *existing = subscription;
            return Ok(());
        }
        if subscription.kind() == SubscriptionKind::DataChange
            && self.count(SubscriptionKind::DataChange) >= MAX_DATA_CHANGE_SUBSCRIPTIONS
        {
            return Err(CoreError::SubscriptionLimitExceeded {
                limit: MAX_DATA_CHANGE_SUBSCRIPTIONS,
            });
        }
        self.subscriptions.push(subscription);
        Ok(())
    }

    pub(crate) fn remove(
        &mut self,
        kind: SubscriptionKind,
        observer: Option<&Subscription>,
    ) -> CoreResult<()> {
        match observer {
            None => {
                self.subscriptions.retain(|s| s.kind() != kind);
                Ok(())
            }
            Some(target) => {
                let before = self.subscriptions.len();
                self.subscriptions
                    .retain(|s| s.kind() != kind || !s.same_observer(target));
                if self.subscriptions.len() == before {
                    Err(CoreError::invalid_argument(format!(
                        "observer is not subscribed to {kind:?}"
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn data_observers(&self, origin: ChangeOrigin) -> Vec<DataObserver> {
        self.subscriptions
            .iter()
            .filter_map(|s| match s {
                Subscription::DataChange(filter, f) if filter.accepts(origin) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    fn sync_observers(&self) -> Vec<SyncObserver> {
        self.subscriptions
            .iter()
            .filter_map(|s| match s {
                Subscription::SyncComplete(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    fn death_observers(&self) -> Vec<DeathObserver> {
        self.subscriptions
            .iter()
            .filter_map(|s| match s {
                Subscription::ServiceDie(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }
}

enum Delivery {
    Changes(ChangeNotification, Vec<DataObserver>),
    SyncComplete(Vec<(String, SyncStatus)>, Vec<SyncObserver>),
    ServiceDie(Vec<DeathObserver>),
    Shutdown,
}

/// Fans published events out to observers on a delivery thread.
pub(crate) struct Dispatcher {
    registry: RwLock<Registry>,
    sender: Mutex<Option<Sender<Delivery>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Option<ThreadId>,
    sequence: AtomicU64,
}

impl Dispatcher {
    pub(crate) fn new(name: &str) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(format!("distkv-notify-{name}"))
            .spawn(move || deliver(&rx))
            .map_err(|e| tracing::warn!(error = %e, "failed to spawn notification thread"))
            .ok();
        let worker_id = worker.as_ref().map(|h| h.thread().id());
        Self {
            registry: RwLock::new(Registry::default()),
            sender: Mutex::new(worker.as_ref().map(|_| tx)),
            worker: Mutex::new(worker),
            worker_id,
            sequence: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe(&self, subscription: Subscription) -> CoreResult<()> {
        let kind = subscription.kind();
        self.registry.write().add(subscription)?;
        tracing::debug!(?kind, "subscribed");
        Ok(())
    }

    pub(crate) fn unsubscribe(
        &self,
        kind: SubscriptionKind,
        observer: Option<&Subscription>,
    ) -> CoreResult<()> {
        self.registry.write().remove(kind, observer)?;
        tracing::debug!(?kind, all = observer.is_none(), "unsubscribed");
        Ok(())
    }

    /// Publishes a batch of net changes. Empty batches are dropped.
    pub(crate) fn publish_changes(
        &self,
        changes: NetChanges,
        device_id: &str,
        origin: ChangeOrigin,
    ) -> Option<u64> {
        if changes.is_empty() {
            return None;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let notification = ChangeNotification {
            inserted: changes.inserted,
            updated: changes.updated,
            deleted: changes.deleted,
            device_id: device_id.to_string(),
            origin,
            sequence,
        };
        let observers = self.registry.read().data_observers(origin);
        if !observers.is_empty() {
            self.send(Delivery::Changes(notification, observers));
        }
        Some(sequence)
    }

    pub(crate) fn publish_sync_complete(&self, results: Vec<(String, SyncStatus)>) {
        let observers = self.registry.read().sync_observers();
        if !observers.is_empty() {
            self.send(Delivery::SyncComplete(results, observers));
        }
    }

    pub(crate) fn publish_service_death(&self) {
        let observers = self.registry.read().death_observers();
        if !observers.is_empty() {
            self.send(Delivery::ServiceDie(observers));
        }
    }

    fn send(&self, delivery: Delivery) {
        if let Some(tx) = self.sender.lock().as_ref() {
            if tx.send(delivery).is_err() {
                tracing::warn!("notification thread is gone, dropping delivery");
            }
        }
    }

    /// Number of batches published so far.
    #[cfg(test)]
    pub(crate) fn published(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Stops accepting events and drains what was already queued.
    pub(crate) fn shutdown(&self) {
        if let Some(tx) = self.sender.lock().take() {
            let _ = tx.send(Delivery::Shutdown);
        }
        self.registry.write().subscriptions.clear();
        if Some(thread::current().id()) == self.worker_id {
            return;
        }
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("notification thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn deliver(rx: &Receiver<Delivery>) {
    while let Ok(delivery) = rx.recv() {
        match delivery {
            Delivery::Changes(notification, observers) => {
                tracing::trace!(
                    sequence = notification.sequence,
                    changes = notification.len(),
                    observers = observers.len(),
                    "delivering changes"
                );
                for observer in observers {
                    guarded("data change", || observer(&notification));
                }
            }
            Delivery::SyncComplete(results, observers) => {
                for observer in observers {
                    guarded("sync complete", || observer(&results));
                }
            }
            Delivery::ServiceDie(observers) => {
                for observer in observers {
                    guarded("service death", || observer());
                }
            }
            Delivery::Shutdown => break,
        }
    }
}

/// Runs one observer. A panicking observer only loses its own delivery.
fn guarded(kind: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(kind, "an observer panicked, skipping it for this event");
    }
}
