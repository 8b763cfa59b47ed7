//! Backup and restore of a store's local entries.
//!
//! ## Backup Format
//!
//! ```text
//! | magic (4) | version (2, LE) | CBOR snapshot |
//! ```
//!
//! The snapshot carries the store id, creation time, the store clock and
//! every local entry. Remote scopes are not backed up.

use crate::entry::Entry;
use crate::error::{CoreError, CoreResult};
use crate::types::LogicalTimestamp;
use distkv_codec::{validate_key, validate_value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Magic bytes of a backup.
const BACKUP_MAGIC: [u8; 4] = *b"DKVB";
/// Current backup format version.
const BACKUP_VERSION: u16 = 1;
const HEADER_SIZE: usize = 6;

/// Metadata about a backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupMetadata {
    /// Store the backup was taken from.
    pub store_id: String,
    /// Creation time, Unix milliseconds.
    pub timestamp: u64,
    /// Store clock when the backup was taken.
    pub clock: LogicalTimestamp,
    /// Number of entries.
    pub entry_count: usize,
    /// Size of the backup in bytes.
    pub size: usize,
}

/// Statistics from a restore operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreStats {
    /// Entries written from the backup.
    pub entries_restored: usize,
    /// Local entries present before the restore.
    pub entries_replaced: usize,
    /// When the backup was created (Unix millis).
    pub backup_timestamp: u64,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    store_id: String,
    timestamp: u64,
    clock: LogicalTimestamp,
    entries: Vec<Entry>,
}

/// Serializes local entries into a backup blob.
pub(crate) fn create(
    store_id: &str,
    clock: LogicalTimestamp,
    entries: Vec<Entry>,
) -> CoreResult<Vec<u8>> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
    let snapshot = Snapshot {
        store_id: store_id.to_string(),
        timestamp,
        clock,
        entries,
    };
    let mut data = Vec::with_capacity(HEADER_SIZE + 64 * snapshot.entries.len());
    data.extend_from_slice(&BACKUP_MAGIC);
    data.extend_from_slice(&BACKUP_VERSION.to_le_bytes());
    ciborium::into_writer(&snapshot, &mut data)
        .map_err(|e| CoreError::backup(format!("failed to encode snapshot: {e}")))?;
    Ok(data)
}

/// Parses and validates a backup blob.
pub(crate) fn read(data: &[u8]) -> CoreResult<(BackupMetadata, Vec<Entry>)> {
    if data.len() < HEADER_SIZE {
        return Err(CoreError::backup("backup data too small"));
    }
    if data[0..4] != BACKUP_MAGIC {
        return Err(CoreError::backup("invalid backup magic"));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != BACKUP_VERSION {
        return Err(CoreError::backup(format!(
            "unsupported backup version: {version}"
        )));
    }
    let snapshot: Snapshot = ciborium::from_reader(&data[HEADER_SIZE..])
        .map_err(|e| CoreError::backup(format!("failed to decode snapshot: {e}")))?;

    let mut keys = HashSet::new();
    for entry in &snapshot.entries {
        if !entry.scope.is_local() {
            return Err(CoreError::backup(format!(
                "entry {:?} belongs to {}",
                entry.key, entry.scope
            )));
        }
        validate_key(&entry.key)
            .and_then(|()| validate_value(&entry.value))
            .map_err(|e| CoreError::backup(format!("entry {:?}: {e}", entry.key)))?;
        if !keys.insert(entry.key.as_str()) {
            return Err(CoreError::backup(format!("duplicate key {:?}", entry.key)));
        }
    }

    let metadata = BackupMetadata {
        store_id: snapshot.store_id,
        timestamp: snapshot.timestamp,
        clock: snapshot.clock,
        entry_count: snapshot.entries.len(),
        size: data.len(),
    };
    Ok((metadata, snapshot.entries))
}
