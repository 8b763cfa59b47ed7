//! Transaction state.

use crate::entry::{ChangeSet, EntryTable};
use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and accepts writes.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// A transaction on one store.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    /// First observed prior state of every touched key.
    undo: ChangeSet,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            undo: ChangeSet::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Ensures the transaction is active.
    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::invalid_operation(format!(
                "transaction {} is {:?}",
                self.id, self.state
            )))
        }
    }

    /// Folds the changes of one call into the undo log.
    pub(crate) fn absorb(&mut self, changes: ChangeSet) -> CoreResult<()> {
        self.ensure_active()?;
        self.undo.absorb(changes);
        Ok(())
    }

    /// Marks the transaction committed and hands back its change set.
    pub(crate) fn commit(&mut self) -> CoreResult<ChangeSet> {
        self.ensure_active()?;
        self.state = TransactionState::Committed;
        Ok(std::mem::take(&mut self.undo))
    }

    /// Restores every touched key and marks the transaction rolled back.
    pub(crate) fn rollback(&mut self, table: &mut EntryTable) -> CoreResult<()> {
        self.ensure_active()?;
        self.state = TransactionState::RolledBack;
        std::mem::take(&mut self.undo).undo(table);
        Ok(())
    }
}
