use std::time::Duration;

use super::Registry;
use crate::error::SqlRegistryError;
use crate::logging::REGISTRY;
use crate::sqlite::locks::Grant;
use crate::types::{Arg, SqlValue};

/// Outcome of [`Registry::lock`]. Contention is an expected result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAttempt {
    Acquired,
    /// Already held by this session; the hold count went up.
    Reentered,
    NotAcquired,
}

impl LockAttempt {
    #[must_use]
    pub fn is_acquired(self) -> bool {
        !matches!(self, LockAttempt::NotAcquired)
    }
}

/// How long [`Registry::lock`] may block.
///
/// Either seconds, or a relative time expression such as `"+30s"` or `"2min"`.
/// Zero never blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum LockWait {
    Seconds(f64),
    Relative(String),
}

impl LockWait {
    /// Resolve to whole or fractional seconds.
    ///
    /// # Errors
    /// `ArgumentError` for negative or non-finite seconds and unparseable expressions.
    pub fn as_secs(&self) -> Result<f64, SqlRegistryError> {
        match self {
            LockWait::Seconds(secs) if secs.is_finite() && *secs >= 0.0 => Ok(*secs),
            LockWait::Seconds(secs) => Err(SqlRegistryError::ArgumentError(format!(
                "lock timeout must be a non-negative number of seconds, got {secs}"
            ))),
            LockWait::Relative(expr) => {
                let trimmed = expr.trim();
                let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed).trim_start();
                humantime::parse_duration(trimmed)
                    .map(|d| d.as_secs_f64())
                    .map_err(|e| {
                        SqlRegistryError::ArgumentError(format!(
                            "invalid lock timeout {expr:?}: {e}"
                        ))
                    })
            }
        }
    }
}

impl From<u32> for LockWait {
    fn from(secs: u32) -> Self {
        LockWait::Seconds(f64::from(secs))
    }
}

impl From<f64> for LockWait {
    fn from(secs: f64) -> Self {
        LockWait::Seconds(secs)
    }
}

impl From<Duration> for LockWait {
    fn from(wait: Duration) -> Self {
        LockWait::Seconds(wait.as_secs_f64())
    }
}

impl From<&str> for LockWait {
    fn from(expr: &str) -> Self {
        LockWait::Relative(expr.to_string())
    }
}

impl From<String> for LockWait {
    fn from(expr: String) -> Self {
        LockWait::Relative(expr)
    }
}

impl Registry<'_> {
    /// Take the named lock for this session, waiting up to `wait`.
    ///
    /// Names are prefixed with the installation identifier. Taking a name this session
    /// already holds returns `Reentered` at once; each hold needs its own [`Registry::unlock`].
    /// All holds end when the session's connection closes.
    ///
    /// # Errors
    /// `ArgumentError` for a bad timeout, `ValidationError` before install, engine failures.
    pub fn lock(
        &self,
        name: &str,
        wait: impl Into<LockWait>,
    ) -> Result<LockAttempt, SqlRegistryError> {
        let secs = wait.into().as_secs()?;
        let full = self.lock_name(name)?;

        let granted = self.session.query_value(
            "SELECT GET_LOCK(?, ?)",
            &[Arg::from(full.as_str()), Arg::from(secs)],
        )?;
        let grant = granted
            .as_ref()
            .and_then(SqlValue::as_int)
            .map_or(Grant::TimedOut, Grant::from_code);
        let attempt = match grant {
            Grant::Acquired => LockAttempt::Acquired,
            Grant::Reentered => LockAttempt::Reentered,
            Grant::TimedOut => LockAttempt::NotAcquired,
        };

        tracing::debug!(target: REGISTRY, lock = %full, timeout = secs, ?attempt, "lock attempt");
        Ok(attempt)
    }

    /// Drop one hold on `name`. Returns `false` if this session did not hold it.
    ///
    /// # Errors
    /// `ValidationError` before install, engine failures.
    pub fn unlock(&self, name: &str) -> Result<bool, SqlRegistryError> {
        let full = self.lock_name(name)?;
        let released = self
            .session
            .query_value("SELECT RELEASE_LOCK(?)", &[Arg::from(full.as_str())])?;
        let released = released.as_ref().and_then(SqlValue::as_int) == Some(1);
        tracing::debug!(target: REGISTRY, lock = %full, released, "lock release");
        Ok(released)
    }

    /// Whether nobody, this session included, holds `name`.
    ///
    /// # Errors
    /// `ValidationError` before install, engine failures.
    pub fn is_free(&self, name: &str) -> Result<bool, SqlRegistryError> {
        let full = self.lock_name(name)?;
        let free = self
            .session
            .query_value("SELECT IS_FREE_LOCK(?)", &[Arg::from(full.as_str())])?;
        Ok(free.as_ref().and_then(SqlValue::as_int) == Some(1))
    }

    /// Release every lock the session holds. Returns the number of holds dropped.
    ///
    /// # Errors
    /// Engine failures.
    pub fn release_all(&self) -> Result<i64, SqlRegistryError> {
        let released = self
            .session
            .query_value("SELECT RELEASE_ALL_LOCKS()", &[])?
            .as_ref()
            .and_then(SqlValue::as_int)
            .unwrap_or(0);
        tracing::debug!(target: REGISTRY, released, "all locks released");
        Ok(released)
    }

    fn lock_name(&self, name: &str) -> Result<String, SqlRegistryError> {
        Ok(format!("{}:{name}", self.installation_id()?))
    }
}
