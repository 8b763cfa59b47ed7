//! # distkv Core
//!
//! Embedded, device-aware key-value store.
//!
//! This crate provides:
//! - A store manager that opens stores by `(app_id, store_id)` identity
//! - Typed point reads and writes, batches and explicit transactions
//! - Change notifications delivered per commit on a background thread
//! - A fluent query builder with a canonical plan string and cursors
//! - Sync scoping, remote ingress, and backup/restore
//!
//! ## Usage
//!
//! ```
//! use distkv_core::{KvManager, ManagerConfig, Options, Query};
//!
//! let manager = KvManager::new(ManagerConfig::new("com.example.app"));
//! let store = manager.get_kv_store("profiles", Options::default()).unwrap();
//!
//! store.put("user_1", r#"{"name":"Ada","age":36}"#).unwrap();
//! store.put("user_2", r#"{"name":"Alan","age":41}"#).unwrap();
//!
//! let mut query = Query::new();
//! query.greater_than("$.age", 40).unwrap().order_by_asc("$.name").unwrap();
//! assert_eq!(query.sql_like(), " ^GREATER INTEGER $.age 40 ^ASC $.name");
//!
//! let rows = store.get_entries(&query).unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].key, "user_2");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(feature = "async")]
mod async_store;
mod backup;
mod config;
mod entry;
mod error;
mod manager;
mod notification;
pub mod query;
mod result_set;
mod stats;
mod store;
pub mod sync;
mod transaction;
mod types;

#[cfg(feature = "async")]
pub use async_store::AsyncKvStore;
pub use backup::{BackupMetadata, RestoreStats};
pub use config::{
    KvStoreType, ManagerConfig, Options, SecurityLevel, DEFAULT_MAX_OPEN_RESULT_SETS,
};
pub use entry::Entry;
pub use error::{codes, CoreError, CoreResult};
pub use manager::KvManager;
pub use notification::{
    ChangeNotification, ChangeOrigin, DataObserver, DeathObserver, SubscribeType, Subscription,
    SubscriptionKind, SyncObserver, MAX_DATA_CHANGE_SUBSCRIPTIONS,
};
pub use query::{Literal, NumberList, NumericArray, Query, QueryArg};
pub use result_set::{KvResultSet, KEY_COLUMN, VALUE_COLUMN};
pub use stats::{StatsSnapshot, StoreStats};
pub use store::{DeleteTarget, KvStore, Selection, MAX_BATCH_SIZE};
pub use sync::{RemoteChanges, SyncAdapter, SyncMode, SyncStatus};
pub use transaction::{Transaction, TransactionState};
pub use types::{DeviceScope, LogicalTimestamp, StoreId, TransactionId, MAX_STORE_ID_LENGTH};

pub use distkv_codec::{TypedValue, ValueType};
