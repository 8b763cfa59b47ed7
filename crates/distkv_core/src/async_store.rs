//! Async facade over [`KvStore`].
//!
//! Each call runs the blocking store operation on tokio's blocking pool and
//! resolves to the same `CoreResult` the synchronous call returns.

use crate::backup::RestoreStats;
use crate::entry::Entry;
use crate::error::{CoreError, CoreResult};
use crate::query::Query;
use crate::store::KvStore;
use crate::sync::{SyncMode, SyncStatus};
use crate::types::TransactionId;
use distkv_codec::TypedValue;

/// An async handle to a store.
#[derive(Debug, Clone)]
pub struct AsyncKvStore {
    store: KvStore,
}

impl AsyncKvStore {
    /// Wraps a store handle.
    #[must_use]
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// The wrapped synchronous handle.
    #[must_use]
    pub fn inner(&self) -> &KvStore {
        &self.store
    }

    async fn run<T, F>(&self, f: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&KvStore) -> CoreResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| CoreError::invalid_operation(format!("store task failed: {e}")))?
    }

    /// See [`KvStore::put`].
    pub async fn put(&self, key: impl Into<String>, value: impl Into<TypedValue>) -> CoreResult<()> {
        let (key, value) = (key.into(), value.into());
        self.run(move |s| s.put(&key, value)).await
    }

    /// See [`KvStore::get`].
    pub async fn get(&self, key: impl Into<String>) -> CoreResult<TypedValue> {
        let key = key.into();
        self.run(move |s| s.get(&key)).await
    }

    /// See [`KvStore::delete`]; deletes one key.
    pub async fn delete(&self, key: impl Into<String>) -> CoreResult<()> {
        let key = key.into();
        self.run(move |s| s.delete(key.as_str())).await
    }

    /// See [`KvStore::put_batch`].
    pub async fn put_batch(&self, entries: Vec<(String, TypedValue)>) -> CoreResult<()> {
        self.run(move |s| s.put_batch(entries)).await
    }

    /// See [`KvStore::delete_batch`].
    pub async fn delete_batch(&self, keys: Vec<String>) -> CoreResult<()> {
        self.run(move |s| s.delete_batch(keys)).await
    }

    /// See [`KvStore::get_entries`].
    pub async fn get_entries(&self, query: Query) -> CoreResult<Vec<Entry>> {
        self.run(move |s| s.get_entries(&query)).await
    }

    /// See [`KvStore::get_result_size`].
    pub async fn get_result_size(&self, query: Query) -> CoreResult<usize> {
        self.run(move |s| s.get_result_size(&query)).await
    }

    /// See [`KvStore::start_transaction`].
    pub async fn start_transaction(&self) -> CoreResult<TransactionId> {
        self.run(KvStore::start_transaction).await
    }

    /// See [`KvStore::commit`].
    pub async fn commit(&self) -> CoreResult<()> {
        self.run(KvStore::commit).await
    }

    /// See [`KvStore::rollback`].
    pub async fn rollback(&self) -> CoreResult<()> {
        self.run(KvStore::rollback).await
    }

    /// See [`KvStore::sync`].
    pub async fn sync(
        &self,
        devices: Vec<String>,
        mode: SyncMode,
        query: Option<Query>,
    ) -> CoreResult<Vec<(String, SyncStatus)>> {
        self.run(move |s| s.sync(&devices, mode, query.as_ref())).await
    }

    /// See [`KvStore::backup`].
    pub async fn backup(&self) -> CoreResult<Vec<u8>> {
        self.run(KvStore::backup).await
    }

    /// See [`KvStore::restore`].
    pub async fn restore(&self, data: Vec<u8>) -> CoreResult<RestoreStats> {
        self.run(move |s| s.restore(&data)).await
    }
}

impl From<KvStore> for AsyncKvStore {
    fn from(store: KvStore) -> Self {
        Self::new(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ManagerConfig, Options};
    use crate::manager::KvManager;

    fn open() -> (KvManager, AsyncKvStore) {
        let manager = KvManager::new(ManagerConfig::new("app"));
        let store = manager.get_kv_store("async_store", Options::default()).unwrap();
        (manager, AsyncKvStore::new(store))
    }

    #[tokio::test]
    async fn put_get_delete() {
        let (_m, store) = open();
        store.put("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), TypedValue::from("v"));
        store.delete("k").await.unwrap();
        assert!(matches!(store.get("k").await, Err(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn transaction_roundtrip() {
        let (_m, store) = open();
        store.start_transaction().await.unwrap();
        store
            .put_batch(vec![("a".to_string(), TypedValue::Integer(1))])
            .await
            .unwrap();
        store.rollback().await.unwrap();
        assert!(store.get("a").await.is_err());
        assert!(store.commit().await.is_err());
    }

    #[tokio::test]
    async fn errors_surface_through_futures() {
        let (m, store) = open();
        m.close_kv_store("app", "async_store").unwrap();
        assert!(matches!(store.put("k", 1i64).await, Err(CoreError::StoreClosed)));
    }

    #[tokio::test]
    async fn query_results() {
        let (_m, store) = open();
        store
            .put_batch(vec![
                ("user_1".to_string(), TypedValue::from(r#"{"age":30}"#)),
                ("user_2".to_string(), TypedValue::from(r#"{"age":15}"#)),
            ])
            .await
            .unwrap();
        let mut query = Query::new();
        query.greater_than("$.age", 18).unwrap();
        let rows = store.get_entries(query.clone()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "user_1");
        assert_eq!(store.get_result_size(query).await.unwrap(), 1);
    }
}
