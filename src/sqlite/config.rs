use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SqlRegistryError;

/// Default busy timeout applied to the session connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub const ENV_DATABASE: &str = "SQL_REGISTRY_DATABASE";
pub const ENV_LOCK_DIR: &str = "SQL_REGISTRY_LOCK_DIR";
pub const ENV_BUSY_TIMEOUT: &str = "SQL_REGISTRY_BUSY_TIMEOUT";

const IN_MEMORY: &str = ":memory:";

/// Options for opening a [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Database file path, or `:memory:`.
    pub database: String,
    pub busy_timeout: Duration,
    /// Apply `PRAGMA journal_mode = WAL` on open.
    pub wal: bool,
    /// Directory holding named-lock files. See [`SessionOptions::resolved_lock_dir`].
    pub lock_dir: Option<PathBuf>,
}

impl SessionOptions {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            wal: true,
            lock_dir: None,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    #[must_use]
    pub fn builder(database: impl Into<String>) -> SessionOptionsBuilder {
        SessionOptionsBuilder::new(database)
    }

    /// Read options from the environment.
    ///
    /// # Errors
    /// Returns `SqlRegistryError::ConfigError` if `SQL_REGISTRY_DATABASE` is unset or empty, or
    /// if `SQL_REGISTRY_BUSY_TIMEOUT` is not a duration such as `5s` or `500ms`.
    pub fn from_env() -> Result<Self, SqlRegistryError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionOptions::from_env`] but reading through `lookup`.
    ///
    /// # Errors
    /// See [`SessionOptions::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SqlRegistryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = lookup(ENV_DATABASE)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                SqlRegistryError::ConfigError(format!("{ENV_DATABASE} must be set"))
            })?;

        let mut builder = SessionOptionsBuilder::new(database);
        if let Some(dir) = lookup(ENV_LOCK_DIR).filter(|value| !value.trim().is_empty()) {
            builder = builder.lock_dir(dir);
        }
        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT) {
            let timeout = humantime::parse_duration(raw.trim()).map_err(|e| {
                SqlRegistryError::ConfigError(format!("{ENV_BUSY_TIMEOUT}={raw:?}: {e}"))
            })?;
            builder = builder.busy_timeout(timeout);
        }
        Ok(builder.finish())
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY || self.database.starts_with("file::memory:")
    }

    /// Where lock files live: the configured directory, `<database>.locks` beside a file
    /// database, or a shared directory under the OS temp dir for in-memory databases.
    #[must_use]
    pub fn resolved_lock_dir(&self) -> PathBuf {
        if let Some(dir) = &self.lock_dir {
            return dir.clone();
        }
        if self.is_in_memory() {
            return std::env::temp_dir().join("sql-registry-locks");
        }
        let db = Path::new(&self.database);
        let mut name = db
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".locks");
        db.with_file_name(name)
    }
}

/// Fluent builder for [`SessionOptions`].
#[derive(Debug, Clone)]
pub struct SessionOptionsBuilder {
    opts: SessionOptions,
}

impl SessionOptionsBuilder {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            opts: SessionOptions::new(database),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.opts.lock_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> SessionOptions {
        self.opts
    }

    /// Open a session with these options.
    ///
    /// # Errors
    ///
    /// Returns `SqlRegistryError::ConnectionError` if the database cannot be opened.
    pub fn open(self) -> Result<crate::Session, SqlRegistryError> {
        crate::Session::open(&self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_database_fails_fast() {
        let err = SessionOptions::from_lookup(lookup(&[])).unwrap_err();
        assert!(
            matches!(err, SqlRegistryError::ConfigError(ref m) if m.contains(ENV_DATABASE)),
            "{err}"
        );
    }

    #[test]
    fn reads_optional_settings() {
        let opts = SessionOptions::from_lookup(lookup(&[
            (ENV_DATABASE, "/tmp/app.db"),
            (ENV_LOCK_DIR, "/var/lock/app"),
            (ENV_BUSY_TIMEOUT, "250ms"),
        ]))
        .unwrap();
        assert_eq!(opts.database, "/tmp/app.db");
        assert_eq!(opts.busy_timeout, Duration::from_millis(250));
        assert_eq!(opts.resolved_lock_dir(), PathBuf::from("/var/lock/app"));
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let err = SessionOptions::from_lookup(lookup(&[
            (ENV_DATABASE, "a.db"),
            (ENV_BUSY_TIMEOUT, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, SqlRegistryError::ConfigError(_)));
    }

    #[test]
    fn lock_dir_defaults_next_to_database() {
        let opts = SessionOptions::new("/data/app.db");
        assert_eq!(opts.resolved_lock_dir(), PathBuf::from("/data/app.db.locks"));
        assert!(SessionOptions::in_memory().is_in_memory());
    }
}
