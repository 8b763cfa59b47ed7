//! Stored entries and the keyed entry table.

mod change_set;
mod table;

pub(crate) use change_set::{ChangeSet, NetChanges};
pub(crate) use table::EntryTable;

use crate::types::{DeviceScope, LogicalTimestamp};
use distkv_codec::TypedValue;
use serde::{Deserialize, Serialize};

/// A key/value pair in a device scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Scope the entry belongs to.
    pub scope: DeviceScope,
    /// Key, unique within the scope.
    pub key: String,
    /// Stored value.
    pub value: TypedValue,
    /// Starts at 1, incremented on every overwrite.
    pub version: u64,
    /// Logical time of the last write.
    pub updated_at: LogicalTimestamp,
    /// Device that produced the current value.
    pub origin: DeviceScope,
}
