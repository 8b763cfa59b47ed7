//! Device synchronization boundary.
//!
//! The store never talks to other devices itself. A [`SyncAdapter`] owns the
//! transport; the store only validates the request, scopes it with the
//! negotiated label range and fans the per-device results out to
//! `SyncComplete` subscribers. Data received from peers comes back in
//! through [`crate::KvStore::apply_remote_changes`].

use crate::error::{CoreError, CoreResult};
use distkv_codec::TypedValue;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Smallest accepted sync delay in milliseconds.
pub const MIN_SYNC_DELAY_MS: u32 = 100;
/// Largest accepted sync delay in milliseconds.
pub const MAX_SYNC_DELAY_MS: u32 = 86_400_000;

/// Direction of a sync round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// Fetch remote changes only.
    Pull,
    /// Send local changes only.
    Push,
    /// Send, then fetch.
    PushPull,
}

/// Outcome of a sync round for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The round finished.
    Success,
    /// The device could not be reached.
    DeviceUnavailable,
    /// The round did not finish in time.
    Timeout,
    /// The round failed for another reason.
    Failed(String),
}

/// A sync round handed to the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    /// Application namespace of the store.
    pub app_id: String,
    /// Store being synchronized.
    pub store_id: String,
    /// Target devices.
    pub devices: Vec<String>,
    /// Direction.
    pub mode: SyncMode,
    /// Negotiated label range; empty means unrestricted.
    pub labels: Vec<String>,
    /// Allowed delay set through `set_sync_param`.
    pub allowed_delay_ms: Option<u32>,
    /// Plan of the query restricting the synced keys.
    pub query_plan: Option<String>,
}

/// Transport boundary for device synchronization.
pub trait SyncAdapter: Send + Sync {
    /// Runs one sync round and reports a status per device.
    fn sync(&self, request: &SyncRequest) -> CoreResult<Vec<(String, SyncStatus)>>;
}

/// Changes received from a remote device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteChanges {
    /// Entries written on the remote device.
    pub puts: Vec<(String, TypedValue)>,
    /// Keys deleted on the remote device.
    pub deletes: Vec<String>,
}

impl RemoteChanges {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a remote write.
    #[must_use]
    pub fn put(mut self, key: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.puts.push((key.into(), value.into()));
        self
    }

    /// Adds a remote delete.
    #[must_use]
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.deletes.push(key.into());
        self
    }

    /// Whether there is nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// Intersection of local and remote labels, deduplicated, in local order.
#[must_use]
pub fn negotiate_range(local: &[String], remote: &[String]) -> Vec<String> {
    let remote: HashSet<&str> = remote.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    local
        .iter()
        .filter(|label| remote.contains(label.as_str()) && seen.insert(label.as_str()))
        .cloned()
        .collect()
}

pub(crate) fn check_delay(allowed_delay_ms: u32) -> CoreResult<()> {
    if (MIN_SYNC_DELAY_MS..=MAX_SYNC_DELAY_MS).contains(&allowed_delay_ms) {
        Ok(())
    } else {
        Err(CoreError::invalid_argument(format!(
            "sync delay must be within {MIN_SYNC_DELAY_MS}..={MAX_SYNC_DELAY_MS} ms, got {allowed_delay_ms}"
        )))
    }
}

/// Per-store sync settings.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyncSettings {
    pub(crate) enabled: bool,
    pub(crate) labels: Vec<String>,
    pub(crate) allowed_delay_ms: Option<u32>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            labels: Vec::new(),
            allowed_delay_ms: None,
        }
    }
}

/// An adapter that records requests and replies with a canned status.
#[derive(Debug, Default)]
pub struct MockSyncAdapter {
    requests: Mutex<Vec<SyncRequest>>,
    status: Mutex<Option<SyncStatus>>,
}

impl MockSyncAdapter {
    /// Creates an adapter that reports success for every device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status reported for every device.
    pub fn set_status(&self, status: SyncStatus) {
        *self.status.lock() = Some(status);
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().clone()
    }
}

impl SyncAdapter for MockSyncAdapter {
    fn sync(&self, request: &SyncRequest) -> CoreResult<Vec<(String, SyncStatus)>> {
        self.requests.lock().push(request.clone());
        let status = self.status.lock().clone().unwrap_or(SyncStatus::Success);
        Ok(request
            .devices
            .iter()
            .map(|device| (device.clone(), status.clone()))
            .collect())
    }
}
