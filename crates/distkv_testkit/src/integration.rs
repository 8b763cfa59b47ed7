//! Model-based integration helpers.
//!
//! Tracks the expected contents of a store in a shadow map and checks the
//! store against it.

use crate::fixtures::TestManager;
use crate::generators::StoreOperation;
use distkv_core::{CoreError, KvStore, TypedValue};
use std::collections::BTreeMap;

/// A store paired with the contents it should hold.
pub struct IntegrationHarness {
    /// Keeps the store's manager alive.
    pub manager: TestManager,
    /// The store under test.
    pub store: KvStore,
    expected: BTreeMap<String, TypedValue>,
}

impl IntegrationHarness {
    /// Creates a harness over a fresh store.
    pub fn new() -> Self {
        let manager = TestManager::new();
        let store = manager.store("harness");
        Self {
            manager,
            store,
            expected: BTreeMap::new(),
        }
    }

    /// Applies an operation to the store and, when it succeeds, to the model.
    pub fn apply(&mut self, op: &StoreOperation) -> Result<(), CoreError> {
        op.apply(&self.store)?;
        Self::apply_to_model(&mut self.expected, op);
        Ok(())
    }

    /// Applies an operation to a model map only.
    pub fn apply_to_model(model: &mut BTreeMap<String, TypedValue>, op: &StoreOperation) {
        match op {
            StoreOperation::Put { key, value } => {
                model.insert(key.clone(), value.clone());
            }
            StoreOperation::Delete { key } => {
                model.remove(key);
            }
            StoreOperation::PutBatch(entries) => {
                for (key, value) in entries {
                    model.insert(key.clone(), value.clone());
                }
            }
            StoreOperation::DeleteBatch(keys) => {
                for key in keys {
                    model.remove(key);
                }
            }
        }
    }

    /// Returns a copy of the current model.
    pub fn snapshot(&self) -> BTreeMap<String, TypedValue> {
        self.expected.clone()
    }

    /// Replaces the model, e.g. after a rollback.
    pub fn reset_model(&mut self, expected: BTreeMap<String, TypedValue>) {
        self.expected = expected;
    }

    /// Verifies the store holds exactly the modelled entries.
    pub fn verify_all(&self) {
        let actual: BTreeMap<String, TypedValue> = self
            .store
            .get_entries("")
            .expect("Failed to read entries")
            .into_iter()
            .map(|e| (e.key, e.value))
            .collect();
        assert_eq!(actual, self.expected, "Store contents diverged from model");
    }

    /// Returns the count of modelled entries.
    pub fn tracked_count(&self) -> usize {
        self.expected.len()
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}
