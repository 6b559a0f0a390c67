#![allow(dead_code)]

use std::error::Error;

use sql_registry::prelude::*;
use tempfile::TempDir;

/// A file database in its own temp dir, with lock files kept beside it.
pub struct TestDb {
    pub dir: TempDir,
    pub options: SessionOptions,
}

impl TestDb {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let options = SessionOptions::builder(dir.path().join("registry.db").to_string_lossy())
            .lock_dir(dir.path().join("locks"))
            .finish();
        Ok(Self { dir, options })
    }

    pub fn open(&self) -> Result<Session, Box<dyn Error>> {
        Ok(Session::open(&self.options)?)
    }

    /// Open a session and install the registry schema on it.
    pub fn installed(&self) -> Result<Session, Box<dyn Error>> {
        let session = self.open()?;
        Installer::new(&session).install_schema()?;
        Ok(session)
    }
}

pub fn memory_session() -> Result<Session, Box<dyn Error>> {
    Ok(Session::open_in_memory()?)
}

pub fn count_rows(session: &Session, table: &str) -> Result<i64, Box<dyn Error>> {
    let value = session.query_value(&format!("SELECT COUNT(*) FROM `{table}`"), &[])?;
    Ok(value.and_then(|v| v.as_int()).unwrap_or(-1))
}
