//! Named advisory locks exposed to SQL.
//!
//! `GET_LOCK(name, timeout)`, `RELEASE_LOCK(name)`, `IS_FREE_LOCK(name)` and
//! `RELEASE_ALL_LOCKS()` are registered on every session connection. Each held name is a
//! small SQLite file under the lock directory kept in an open `BEGIN EXCLUSIVE` transaction;
//! the file lock belongs to the holding connection and the OS drops it when that connection
//! closes or the process exits. Lock files are never deleted, since a waiter may already have
//! the path open.
//!
//! `GET_LOCK` answers 1 for a fresh hold, 2 when the session already held the name and 0 on
//! timeout. Holder checks only take a shared lock on the file for the length of one read.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::{Connection, ErrorCode, OpenFlags};
use sha1::{Digest, Sha1};

/// Stand-in for "wait forever" when a negative timeout is passed to `GET_LOCK`.
const FOREVER: Duration = Duration::from_millis(i32::MAX as u64);

/// Shortest busy wait when taking a lock file. A holder check from another session keeps its
/// shared lock for microseconds; a zero-timeout acquire waits this long so it does not read
/// that check as a holder.
const CHECK_GRACE: Duration = Duration::from_millis(25);

/// What `GET_LOCK` did, as returned to SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Grant {
    TimedOut = 0,
    Acquired = 1,
    Reentered = 2,
}

impl Grant {
    pub(crate) fn from_code(code: i64) -> Self {
        match code {
            1 => Grant::Acquired,
            2 => Grant::Reentered,
            _ => Grant::TimedOut,
        }
    }
}

struct HeldLock {
    conn: Connection,
    count: u32,
}

/// Locks held by one session connection.
pub(crate) struct LockTable {
    dir: PathBuf,
    held: HashMap<String, HeldLock>,
}

impl LockTable {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            held: HashMap::new(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        lock_path(&self.dir, name)
    }

    /// `Reentered` at once when this session already holds `name`, otherwise `Acquired` or
    /// `TimedOut` once `timeout` elapsed.
    pub(crate) fn acquire(&mut self, name: &str, timeout: Duration) -> rusqlite::Result<Grant> {
        if let Some(held) = self.held.get_mut(name) {
            held.count += 1;
            return Ok(Grant::Reentered);
        }

        fs::create_dir_all(&self.dir).map_err(user_error)?;
        let conn = Connection::open(self.path_for(name))?;
        conn.busy_timeout(timeout.max(CHECK_GRACE))?;
        match conn.execute_batch("BEGIN EXCLUSIVE") {
            Ok(()) => {
                self.held
                    .insert(name.to_string(), HeldLock { conn, count: 1 });
                Ok(Grant::Acquired)
            }
            Err(err) if is_busy(&err) => Ok(Grant::TimedOut),
            Err(err) => Err(err),
        }
    }

    /// `Some(true)` released (or one hold dropped), `Some(false)` held by someone else,
    /// `None` not held by anyone.
    pub(crate) fn release(&mut self, name: &str) -> rusqlite::Result<Option<bool>> {
        if let Some(held) = self.held.get_mut(name) {
            held.count -= 1;
            if held.count == 0 {
                if let Some(held) = self.held.remove(name) {
                    held.conn.execute_batch("ROLLBACK")?;
                }
            }
            return Ok(Some(true));
        }
        Ok(if self.held_elsewhere(name)? {
            Some(false)
        } else {
            None
        })
    }

    pub(crate) fn is_free(&self, name: &str) -> rusqlite::Result<bool> {
        if self.held.contains_key(name) {
            return Ok(false);
        }
        Ok(!self.held_elsewhere(name)?)
    }

    pub(crate) fn release_all(&mut self) -> rusqlite::Result<i64> {
        let mut released = 0i64;
        for (_, held) in self.held.drain() {
            released += i64::from(held.count);
            held.conn.execute_batch("ROLLBACK")?;
        }
        Ok(released)
    }

    /// A holder keeps the file under an exclusive lock, so a read that cannot get a shared
    /// lock right now means another session holds it. Two checks never block each other.
    fn held_elsewhere(&self, name: &str) -> rusqlite::Result<bool> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(false);
        }
        let check = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        check.busy_timeout(Duration::ZERO)?;
        match check.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0)) {
            Ok(_) => Ok(false),
            Err(err) if is_busy(&err) => Ok(true),
            Err(err) => Err(err),
        }
    }
}

/// File backing `name` inside `dir`; names are hashed so any string is a valid lock name.
pub(crate) fn lock_path(dir: &Path, name: &str) -> PathBuf {
    let digest = Sha1::digest(name.as_bytes());
    dir.join(format!("{}.lock", hex::encode(digest)))
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

fn user_error<E>(err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::UserFunctionError(Box::new(err))
}

fn poisoned() -> rusqlite::Error {
    rusqlite::Error::UserFunctionError("lock table poisoned".into())
}

fn timeout_arg(ctx: &Context<'_>, idx: usize) -> rusqlite::Result<Duration> {
    let secs: f64 = ctx.get(idx)?;
    if secs < 0.0 || !secs.is_finite() || secs >= FOREVER.as_secs_f64() {
        return Ok(FOREVER);
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Register the lock functions on `conn`. The table lives as long as the connection.
pub(crate) fn register(conn: &Connection, dir: PathBuf) -> rusqlite::Result<()> {
    let table = Arc::new(Mutex::new(LockTable::new(dir)));
    let flags = FunctionFlags::SQLITE_UTF8;

    let get = Arc::clone(&table);
    conn.create_scalar_function("GET_LOCK", 2, flags, move |ctx| {
        let name: String = ctx.get(0)?;
        let timeout = timeout_arg(ctx, 1)?;
        let mut table = get.lock().map_err(|_| poisoned())?;
        table.acquire(&name, timeout).map(|grant| grant as i64)
    })?;

    let release = Arc::clone(&table);
    conn.create_scalar_function("RELEASE_LOCK", 1, flags, move |ctx| {
        let name: String = ctx.get(0)?;
        let mut table = release.lock().map_err(|_| poisoned())?;
        table.release(&name).map(|state| state.map(i64::from))
    })?;

    let free = Arc::clone(&table);
    conn.create_scalar_function("IS_FREE_LOCK", 1, flags, move |ctx| {
        let name: String = ctx.get(0)?;
        let table = free.lock().map_err(|_| poisoned())?;
        table.is_free(&name).map(i64::from)
    })?;

    conn.create_scalar_function("RELEASE_ALL_LOCKS", 0, flags, move |_ctx| {
        let mut table = table.lock().map_err(|_| poisoned())?;
        table.release_all()
    })?;

    Ok(())
}
