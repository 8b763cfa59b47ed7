//! Explicit transactions.
//!
//! Writes made inside a transaction apply to the entry table at once, so
//! later reads through the same store see them. Their change notifications
//! are held back: `commit` emits the net effect as a single batch, while
//! `rollback` replays the undo log and emits nothing.

mod state;

pub use state::{Transaction, TransactionState};
