use std::fmt;

use rusqlite::Connection;

use super::config::SessionOptions;
use super::locks;
use crate::error::SqlRegistryError;

/// One database session: exclusively owns its connection.
///
/// Everything above the engine (executor, registry, counters, locks) borrows a `Session`;
/// nothing reaches the connection any other way. Named locks taken through the session are
/// released when it is dropped.
pub struct Session {
    pub(crate) conn: Connection,
    options: SessionOptions,
}

impl Session {
    /// Open a session and register the lock functions on its connection.
    ///
    /// # Errors
    /// Returns `SqlRegistryError::ConnectionError` if the database cannot be opened or
    /// initialised. Not retried.
    pub fn open(options: &SessionOptions) -> Result<Self, SqlRegistryError> {
        let conn = Connection::open(&options.database).map_err(|e| {
            SqlRegistryError::ConnectionError(format!(
                "failed to open database {:?}: {e}",
                options.database
            ))
        })?;
        init_connection(&conn, options).map_err(|e| {
            SqlRegistryError::ConnectionError(format!(
                "failed to initialise database {:?}: {e}",
                options.database
            ))
        })?;
        tracing::debug!(
            target: crate::logging::EXECUTOR,
            database = %options.database,
            wal = options.wal,
            "session opened"
        );
        Ok(Self {
            conn,
            options: options.clone(),
        })
    }

    /// Private in-memory database, mostly for tests.
    ///
    /// # Errors
    /// See [`Session::open`].
    pub fn open_in_memory() -> Result<Self, SqlRegistryError> {
        Self::open(&SessionOptions::in_memory())
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Connection-wide last insert id.
    #[must_use]
    pub fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Whether the connection is outside an explicit transaction.
    #[must_use]
    pub fn is_autocommit(&self) -> bool {
        self.conn.is_autocommit()
    }

    /// Close the connection now, surfacing any close error.
    ///
    /// # Errors
    /// Returns `SqlRegistryError::ConnectionError` if the engine refuses to close.
    pub fn close(self) -> Result<(), SqlRegistryError> {
        self.conn.close().map_err(|(_, e)| {
            SqlRegistryError::ConnectionError(format!("failed to close connection: {e}"))
        })
    }
}

fn init_connection(conn: &Connection, options: &SessionOptions) -> rusqlite::Result<()> {
    conn.busy_timeout(options.busy_timeout)?;
    if options.wal && !options.is_in_memory() {
        // the pragma answers with the mode now in effect
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::trace!(target: crate::logging::EXECUTOR, journal_mode = %mode, "journal mode set");
    }
    locks::register(conn, options.resolved_lock_dir())
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("database", &self.options.database)
            .field("autocommit", &self.conn.is_autocommit())
            .finish()
    }
}
