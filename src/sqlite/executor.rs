use crate::conversion::{Params, coerce_all};
use crate::error::SqlRegistryError;
use crate::expansion::expand_placeholders;
use crate::logging::{EXECUTOR, describe_params, truncate_sql};
use crate::results::{ExecutionOutcome, ResultCursor, Row};
use crate::types::{Arg, SqlValue};

use super::connection::Session;
use super::query::run_statement;

/// Whether a batch runs inside its own transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// All-or-nothing: any failure rolls back the whole batch.
    #[default]
    Transaction,
    /// Statements commit one by one; those before a failure stay applied.
    Autocommit,
}

impl Session {
    /// Expand, coerce, prepare, bind and run one statement.
    ///
    /// ```rust
    /// use sql_registry::prelude::*;
    ///
    /// let session = Session::open_in_memory()?;
    /// session.execute_batch("CREATE TABLE `t` (`id` INTEGER PRIMARY KEY, `a` TEXT, `b` INT)", BatchMode::Transaction)?;
    /// let id = session.execute_dml(
    ///     "INSERT INTO `t` (`??`) VALUES ('??')",
    ///     &[Arg::list(["a", "b"]), Arg::map([("a", Param::from("x")), ("b", Param::from(2))])],
    /// )?;
    /// assert_eq!(id, 1);
    /// let changed = session.execute_dml("UPDATE `t` SET ?? WHERE `id` = ?", &[Arg::map([("b", 3)]), Arg::from(id)])?;
    /// assert_eq!(changed, 1);
    /// # Ok::<(), SqlRegistryError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// `ArgumentError`/`TypeError` from expansion and coercion (nothing is sent to the engine),
    /// `PrepareError` if the SQL does not compile, `ExecutionError` if binding or stepping
    /// fails. Engine failures are logged with the SQL and parameters before being returned.
    pub fn execute(
        &self,
        template: &str,
        args: &[Arg],
    ) -> Result<ExecutionOutcome, SqlRegistryError> {
        let expanded = expand_placeholders(template, args)?;
        let params = coerce_all(&expanded.params)?;
        self.execute_prepared(&expanded.sql, &params)
    }

    /// Run a statement that must return rows.
    ///
    /// # Errors
    ///
    /// As [`Session::execute`], plus `OperationNotSupported` if the statement returned no
    /// row-set.
    pub fn query(&self, template: &str, args: &[Arg]) -> Result<ResultCursor, SqlRegistryError> {
        self.execute(template, args)?.into_cursor()
    }

    /// First row of a query, if any.
    ///
    /// # Errors
    ///
    /// As [`Session::query`].
    pub fn query_row(&self, template: &str, args: &[Arg]) -> Result<Option<Row>, SqlRegistryError> {
        Ok(self.query(template, args)?.next())
    }

    /// First column of the first row, if any.
    ///
    /// # Errors
    ///
    /// As [`Session::query`].
    pub fn query_value(
        &self,
        template: &str,
        args: &[Arg],
    ) -> Result<Option<SqlValue>, SqlRegistryError> {
        Ok(self
            .query(template, args)?
            .fetch_column()
            .into_iter()
            .next())
    }

    /// Run a statement that must not return rows; yields the inserted id or affected rows.
    ///
    /// # Errors
    ///
    /// As [`Session::execute`], plus `OperationNotSupported` if the statement returned rows.
    pub fn execute_dml(&self, template: &str, args: &[Arg]) -> Result<i64, SqlRegistryError> {
        self.execute(template, args)?.into_count()
    }

    /// Run already-expanded SQL with coerced parameters. The statement is finalized before
    /// this returns, on every path.
    ///
    /// # Errors
    ///
    /// `PrepareError` or `ExecutionError`, logged before being returned.
    pub fn execute_prepared(
        &self,
        sql: &str,
        params: &Params,
    ) -> Result<ExecutionOutcome, SqlRegistryError> {
        let mut stmt = self.conn.prepare(sql).map_err(|source| {
            tracing::error!(
                target: EXECUTOR,
                sql = %truncate_sql(sql),
                params = %describe_params(params.as_values()),
                error = %source,
                "failed to prepare statement"
            );
            SqlRegistryError::PrepareError {
                sql: truncate_sql(sql),
                source,
            }
        })?;

        let outcome = run_statement(&self.conn, &mut stmt, params).map_err(|source| {
            tracing::error!(
                target: EXECUTOR,
                sql = %truncate_sql(sql),
                params = %describe_params(params.as_values()),
                error = %source,
                "statement failed"
            );
            SqlRegistryError::ExecutionError {
                sql: truncate_sql(sql),
                source,
            }
        })?;
        drop(stmt);

        tracing::trace!(
            target: EXECUTOR,
            sql = %truncate_sql(sql),
            params = %describe_params(params.as_values()),
            count = ?outcome.count(),
            "statement executed"
        );
        Ok(outcome)
    }

    /// Execute semicolon-separated statements without parameters.
    ///
    /// In [`BatchMode::Transaction`] a failure rolls the whole batch back; any rows the
    /// statements produce are discarded. If a transaction is already open on the connection
    /// the batch runs under a savepoint inside it, so a failure undoes only the batch's own
    /// statements and the outer transaction stays open.
    ///
    /// # Errors
    ///
    /// `ExecutionError` for the first failing statement, logged before being returned.
    pub fn execute_batch(&self, sql: &str, mode: BatchMode) -> Result<(), SqlRegistryError> {
        let result = match mode {
            BatchMode::Autocommit => self.conn.execute_batch(sql),
            BatchMode::Transaction if self.conn.is_autocommit() => {
                self.conn.unchecked_transaction().and_then(|tx| {
                    match tx.execute_batch(sql) {
                        Ok(()) => tx.commit(),
                        Err(err) => {
                            log_failed_undo(tx.rollback());
                            Err(err)
                        }
                    }
                })
            }
            BatchMode::Transaction => self.savepoint_batch(sql),
        };

        result.map_err(|source| {
            tracing::error!(
                target: EXECUTOR,
                sql = %truncate_sql(sql),
                mode = ?mode,
                error = %source,
                "batch failed"
            );
            SqlRegistryError::ExecutionError {
                sql: truncate_sql(sql),
                source,
            }
        })
    }

    /// Nested batch: `ROLLBACK TO` undoes the batch, `RELEASE` folds it into the outer
    /// transaction either way.
    fn savepoint_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch("SAVEPOINT sql_registry_batch")?;
        match self.conn.execute_batch(sql) {
            Ok(()) => self.conn.execute_batch("RELEASE sql_registry_batch"),
            Err(err) => {
                let undo = "ROLLBACK TO sql_registry_batch; RELEASE sql_registry_batch";
                log_failed_undo(self.conn.execute_batch(undo));
                Err(err)
            }
        }
    }
}

fn log_failed_undo(undo: rusqlite::Result<()>) {
    if let Err(rollback_err) = undo {
        tracing::warn!(
            target: EXECUTOR,
            error = %rollback_err,
            "rollback after failed batch also failed"
        );
    }
}
