//! Cursor over query results.
//!
//! A result set is a snapshot: writes made after it was opened are not
//! reflected. Each open result set counts against its store's bound and
//! releases its slot when closed or dropped.

use crate::entry::Entry;
use crate::error::{CoreError, CoreResult};
use crate::store::StoreCore;
use distkv_codec::{TypedValue, ValueType};
use std::sync::Arc;

/// Column holding the entry key.
pub const KEY_COLUMN: usize = 0;
/// Column holding the entry value.
pub const VALUE_COLUMN: usize = 1;

/// A positionable cursor over matching entries.
///
/// The position starts before the first row (`-1`) and moves within
/// `-1..=count`.
pub struct KvResultSet {
    store: Arc<StoreCore>,
    rows: Vec<Entry>,
    position: isize,
    closed: bool,
}

impl KvResultSet {
    pub(crate) fn new(store: Arc<StoreCore>, rows: Vec<Entry>) -> Self {
        Self {
            store,
            rows,
            position: -1,
            closed: false,
        }
    }

    fn ensure_usable(&self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::ResultSetClosed);
        }
        if !self.store.is_open() {
            return Err(CoreError::StoreClosed);
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_wrap)]
    fn len(&self) -> isize {
        self.rows.len() as isize
    }

    /// Number of rows.
    pub fn count(&self) -> CoreResult<usize> {
        self.ensure_usable()?;
        Ok(self.rows.len())
    }

    /// Current position; `-1` before the first row, `count` after the last.
    pub fn position(&self) -> CoreResult<isize> {
        self.ensure_usable()?;
        Ok(self.position)
    }

    /// Moves to `position`, clamping to `-1..=count`. Returns whether the
    /// cursor is on a row.
    pub fn move_to_position(&mut self, position: isize) -> CoreResult<bool> {
        self.ensure_usable()?;
        self.position = position.clamp(-1, self.len());
        Ok(self.on_row())
    }

    /// Moves by `offset` rows.
    pub fn move_by(&mut self, offset: isize) -> CoreResult<bool> {
        let target = self.position.saturating_add(offset);
        self.move_to_position(target)
    }

    /// Moves to the first row.
    pub fn move_to_first(&mut self) -> CoreResult<bool> {
        self.move_to_position(0)
    }

    /// Moves to the last row.
    pub fn move_to_last(&mut self) -> CoreResult<bool> {
        let last = self.len() - 1;
        self.move_to_position(last)
    }

    /// Moves to the next row.
    pub fn move_to_next(&mut self) -> CoreResult<bool> {
        self.move_by(1)
    }

    /// Moves to the previous row.
    pub fn move_to_previous(&mut self) -> CoreResult<bool> {
        self.move_by(-1)
    }

    fn on_row(&self) -> bool {
        (0..self.len()).contains(&self.position)
    }

    /// Whether the cursor is on the first row.
    pub fn is_first(&self) -> CoreResult<bool> {
        self.ensure_usable()?;
        Ok(!self.rows.is_empty() && self.position == 0)
    }

    /// Whether the cursor is on the last row.
    pub fn is_last(&self) -> CoreResult<bool> {
        self.ensure_usable()?;
        Ok(!self.rows.is_empty() && self.position == self.len() - 1)
    }

    /// Whether the cursor is before the first row. Always true when empty.
    pub fn is_before_first(&self) -> CoreResult<bool> {
        self.ensure_usable()?;
        Ok(self.rows.is_empty() || self.position == -1)
    }

    /// Whether the cursor is after the last row. Always true when empty.
    pub fn is_after_last(&self) -> CoreResult<bool> {
        self.ensure_usable()?;
        Ok(self.rows.is_empty() || self.position == self.len())
    }

    fn current(&self) -> CoreResult<&Entry> {
        self.ensure_usable()?;
        usize::try_from(self.position)
            .ok()
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| {
                CoreError::invalid_operation(format!(
                    "cursor at {} is not on a row",
                    self.position
                ))
            })
    }

    /// The entry at the current position.
    pub fn entry(&self) -> CoreResult<Entry> {
        self.current().cloned()
    }

    fn column(&self, column: usize, expected: ValueType) -> CoreResult<TypedValue> {
        let entry = self.current()?;
        let value = match column {
            KEY_COLUMN => TypedValue::String(entry.key.clone()),
            VALUE_COLUMN => entry.value.clone(),
            other => {
                return Err(CoreError::invalid_argument(format!(
                    "column {other} does not exist"
                )))
            }
        };
        let actual = value.value_type();
        value.coerce_to(expected).ok_or_else(|| {
            CoreError::type_mismatch(format!(
                "column {column} holds {actual}, requested {expected}"
            ))
        })
    }

    /// Reads an integer column.
    pub fn get_long(&self, column: usize) -> CoreResult<i64> {
        match self.column(column, ValueType::Integer)? {
            TypedValue::Integer(v) => Ok(v),
            other => Err(mismatch(&other, ValueType::Integer)),
        }
    }

    /// Reads a string column.
    pub fn get_string(&self, column: usize) -> CoreResult<String> {
        match self.column(column, ValueType::String)? {
            TypedValue::String(v) => Ok(v),
            other => Err(mismatch(&other, ValueType::String)),
        }
    }

    /// Reads a double column; floats and exactly representable integers widen.
    pub fn get_double(&self, column: usize) -> CoreResult<f64> {
        match self.column(column, ValueType::Double)? {
            TypedValue::Double(v) => Ok(v),
            other => Err(mismatch(&other, ValueType::Double)),
        }
    }

    /// Reads a byte-array column.
    pub fn get_blob(&self, column: usize) -> CoreResult<Vec<u8>> {
        match self.column(column, ValueType::ByteArray)? {
            TypedValue::ByteArray(v) => Ok(v),
            other => Err(mismatch(&other, ValueType::ByteArray)),
        }
    }

    /// Whether the result set has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the result set and releases its slot.
    ///
    /// # Errors
    ///
    /// Returns `ResultSetClosed` when already closed.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::ResultSetClosed);
        }
        self.closed = true;
        self.rows = Vec::new();
        self.store.release_result_set();
        Ok(())
    }
}

fn mismatch(value: &TypedValue, expected: ValueType) -> CoreError {
    CoreError::type_mismatch(format!(
        "value is {}, requested {expected}",
        value.value_type()
    ))
}

impl std::fmt::Debug for KvResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvResultSet")
            .field("count", &self.rows.len())
            .field("position", &self.position)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Drop for KvResultSet {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.store.release_result_set();
        }
    }
}
