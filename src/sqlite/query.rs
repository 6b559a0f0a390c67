use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Connection, Statement};

use crate::conversion::Params;
use crate::results::{Columns, ExecutionOutcome, ResultCursor};
use crate::types::SqlValue;

use super::params::bind_params;

/// Extract a `SqlValue` from a `SQLite` row.
///
/// # Errors
///
/// Returns the engine error if the column cannot be read.
pub fn extract_value(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<SqlValue> {
    let value: Value = row.get(idx)?;
    Ok(SqlValue::from(value))
}

/// Bind, run and classify a prepared statement.
///
/// Statements with output columns are stepped to completion into a [`ResultCursor`], which
/// records the connection's last insert id at that point. Anything else yields a count: the
/// id inserted by this statement when there is one, otherwise the affected-row count.
///
/// # Errors
///
/// Returns the engine error from binding or stepping.
pub fn run_statement(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    params: &Params,
) -> rusqlite::Result<ExecutionOutcome> {
    bind_params(stmt, params)?;

    if stmt.column_count() > 0 {
        let names = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let columns = Arc::new(Columns::new(names));
        let mut buffered = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(extract_value(row, idx)?);
            }
            buffered.push(values);
        }
        drop(rows);
        return Ok(ExecutionOutcome::Rows(ResultCursor::new(
            columns,
            buffered,
            conn.last_insert_rowid(),
        )));
    }

    let before = conn.last_insert_rowid();
    let affected = stmt.raw_execute()?;
    let after = conn.last_insert_rowid();
    Ok(ExecutionOutcome::Count(mutation_count(before, after, affected)))
}

/// `last_insert_rowid()` is sticky across statements, so only an id that moved during this
/// statement counts as inserted by it. An INSERT that writes the same explicit rowid as the
/// previous insert leaves the id unchanged and reports its affected rows instead.
fn mutation_count(before: i64, after: i64, affected: usize) -> i64 {
    if after != 0 && after != before {
        after
    } else {
        i64::try_from(affected).unwrap_or(i64::MAX)
    }
}
