use super::cursor::ResultCursor;
use crate::error::SqlRegistryError;

/// What a statement produced.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The statement returned rows.
    Rows(ResultCursor),
    /// Inserted id for INSERTs, otherwise the affected-row count.
    Count(i64),
}

impl ExecutionOutcome {
    #[must_use]
    pub fn count(&self) -> Option<i64> {
        match self {
            ExecutionOutcome::Count(n) => Some(*n),
            ExecutionOutcome::Rows(_) => None,
        }
    }

    /// # Errors
    ///
    /// Returns `SqlRegistryError::OperationNotSupported` if the statement did not return rows.
    pub fn into_cursor(self) -> Result<ResultCursor, SqlRegistryError> {
        match self {
            ExecutionOutcome::Rows(cursor) => Ok(cursor),
            ExecutionOutcome::Count(_) => Err(SqlRegistryError::OperationNotSupported(
                "statement did not produce a row-set".into(),
            )),
        }
    }

    /// # Errors
    ///
    /// Returns `SqlRegistryError::OperationNotSupported` if the statement returned rows.
    pub fn into_count(self) -> Result<i64, SqlRegistryError> {
        match self {
            ExecutionOutcome::Count(n) => Ok(n),
            ExecutionOutcome::Rows(_) => Err(SqlRegistryError::OperationNotSupported(
                "statement produced a row-set, not a count".into(),
            )),
        }
    }
}
