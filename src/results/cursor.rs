use std::sync::Arc;

use super::row::{Columns, Row};
use crate::error::SqlRegistryError;
use crate::types::SqlValue;

/// Forward-only view over the rows a statement produced.
///
/// The statement is stepped to completion and finalized before the cursor is handed out, so a
/// cursor never holds the connection; rows are materialised into [`Row`]s one at a time as
/// the cursor is read. [`ResultCursor::rewind`] restarts from the first row.
///
/// Besides iteration, the cursor exposes the *current* row's fields directly:
/// ```rust
/// # use sql_registry::prelude::*;
/// # fn demo(session: &Session) -> Result<(), SqlRegistryError> {
/// let mut cursor = session.query("SELECT 1 AS `one`, 'x' AS `label`", &[])?;
/// assert_eq!(cursor.get("one")?, &SqlValue::Int(1));
/// cursor.advance();
/// assert!(cursor.is_exhausted());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResultCursor {
    columns: Arc<Columns>,
    rows: Vec<Vec<SqlValue>>,
    position: usize,
    last_insert_id: i64,
}

impl ResultCursor {
    pub(crate) fn new(columns: Arc<Columns>, rows: Vec<Vec<SqlValue>>, last_insert_id: i64) -> Self {
        Self {
            columns,
            rows,
            position: 0,
            last_insert_id,
        }
    }

    /// Number of rows in the result.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    /// Connection's last insert id at the moment the statement ran.
    #[must_use]
    pub fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    /// Zero-based index of the current row.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// True once the cursor has moved past the last row (or the result is empty).
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.rows.len()
    }

    /// Move to the next row. A no-op once exhausted.
    pub fn advance(&mut self) {
        if !self.is_exhausted() {
            self.position += 1;
        }
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// The current row, or `None` at end of sequence.
    #[must_use]
    pub fn current(&self) -> Option<Row> {
        self.rows
            .get(self.position)
            .map(|values| Row::new(Arc::clone(&self.columns), values.clone()))
    }

    /// Read a named field of the current row.
    ///
    /// # Errors
    ///
    /// Returns `SqlRegistryError::UnknownField` if the result has no such column and
    /// `SqlRegistryError::NoCurrentRow` once the cursor is exhausted.
    pub fn get(&self, field: &str) -> Result<&SqlValue, SqlRegistryError> {
        let idx = self
            .columns
            .position(field)
            .ok_or_else(|| SqlRegistryError::UnknownField(field.to_string()))?;
        let values = self
            .rows
            .get(self.position)
            .ok_or(SqlRegistryError::NoCurrentRow)?;
        values
            .get(idx)
            .ok_or_else(|| SqlRegistryError::UnknownField(field.to_string()))
    }

    /// Cursors are read-only.
    ///
    /// # Errors
    ///
    /// Always returns `SqlRegistryError::OperationNotSupported`.
    pub fn set(&mut self, field: &str, _value: SqlValue) -> Result<(), SqlRegistryError> {
        Err(SqlRegistryError::OperationNotSupported(format!(
            "cannot set field `{field}` on a result cursor"
        )))
    }

    /// Cursors are read-only.
    ///
    /// # Errors
    ///
    /// Always returns `SqlRegistryError::OperationNotSupported`.
    pub fn unset(&mut self, field: &str) -> Result<(), SqlRegistryError> {
        Err(SqlRegistryError::OperationNotSupported(format!(
            "cannot unset field `{field}` on a result cursor"
        )))
    }

    /// Eagerly collect every remaining row, leaving the cursor exhausted.
    pub fn fetch_all(&mut self) -> Vec<Row> {
        let remaining = self
            .rows
            .get(self.position..)
            .unwrap_or_default()
            .iter()
            .map(|values| Row::new(Arc::clone(&self.columns), values.clone()))
            .collect();
        self.position = self.rows.len();
        remaining
    }

    /// Collect the first column of every remaining row, leaving the cursor exhausted.
    pub fn fetch_column(&mut self) -> Vec<SqlValue> {
        let remaining = self
            .rows
            .get(self.position..)
            .unwrap_or_default()
            .iter()
            .filter_map(|values| values.first().cloned())
            .collect();
        self.position = self.rows.len();
        remaining
    }

    /// Release the buffered rows now rather than at end of scope.
    pub fn free(self) {
        drop(self);
    }
}

impl Iterator for ResultCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.current()?;
        self.position += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.rows.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}
