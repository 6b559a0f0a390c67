//! Schema installation and `.sql` script runner.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::error::SqlRegistryError;
use crate::logging::INSTALLER;
use crate::registry::{SYSTEM_ID, name_hash};
use crate::sqlite::{BatchMode, Session};
use crate::types::{Arg, Param, SqlValue};

/// Registry table and maintenance trigger.
pub const REGISTRY_SCHEMA: &str = include_str!("../sql/registry.sql");

/// Result of running one script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub script: PathBuf,
    pub ok: bool,
    pub error: Option<String>,
}

pub struct Installer<'s> {
    session: &'s Session,
}

impl<'s> Installer<'s> {
    #[must_use]
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Create the registry schema and seed `system:id`. Safe to run repeatedly; an existing
    /// installation identifier is kept. Returns the installation identifier.
    ///
    /// # Errors
    /// `ExecutionError` if the schema cannot be applied; the schema batch is rolled back.
    pub fn install_schema(&self) -> Result<String, SqlRegistryError> {
        self.session
            .execute_batch(REGISTRY_SCHEMA, BatchMode::Transaction)?;

        let candidate = Uuid::new_v4().to_string();
        self.session.execute_dml(
            "INSERT INTO `registry` (`??`) VALUES ('??') ON CONFLICT(`hash`) DO NOTHING",
            &[
                Arg::list(["hash", "name", "json"]),
                Arg::list([
                    Param::Blob(name_hash(SYSTEM_ID)),
                    Param::from(SYSTEM_ID),
                    Param::Text(serde_json::to_string(&candidate)?),
                ]),
            ],
        )?;

        let stored = self
            .session
            .query_value(
                "SELECT `json` FROM `registry` WHERE `hash` = ?",
                &[Arg::from(name_hash(SYSTEM_ID))],
            )?
            .and_then(|value| match value {
                SqlValue::Text(json) => Some(json),
                _ => None,
            })
            .ok_or_else(|| {
                SqlRegistryError::ValidationError(format!("`{SYSTEM_ID}` was not seeded"))
            })?;
        let id: String = serde_json::from_str(&stored)?;

        tracing::info!(target: INSTALLER, installation_id = %id, "registry schema installed");
        Ok(id)
    }

    /// Run a `.sql` file through the batch interface and report how it went. Failures are
    /// reported, not returned.
    pub fn run_script(&self, path: impl AsRef<Path>, mode: BatchMode) -> InstallReport {
        let script = path.as_ref().to_path_buf();
        let outcome = fs::read_to_string(&script)
            .map_err(SqlRegistryError::from)
            .and_then(|sql| self.session.execute_batch(&sql, mode));

        match outcome {
            Ok(()) => {
                tracing::info!(target: INSTALLER, script = %script.display(), ?mode, "script applied");
                InstallReport {
                    script,
                    ok: true,
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!(target: INSTALLER, script = %script.display(), ?mode, error = %err, "script failed");
                InstallReport {
                    script,
                    ok: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
