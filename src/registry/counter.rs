use serde_json::Value as JsonValue;

use super::{Registry, SYSTEM_ID, mismatch, name_hash, validate_name};
use crate::error::SqlRegistryError;
use crate::logging::REGISTRY;
use crate::types::{Arg, Param, SqlValue};

/// Insert `start_from`, or add one to an integer value, in one statement. The guarded
/// `DO UPDATE` returns no row when the stored value is not an integer or is already at
/// `i64::MAX`.
const INCREMENT: &str = "INSERT INTO `registry` (`??`) VALUES ('??') \
     ON CONFLICT(`hash`) DO UPDATE SET `json` = CAST(`registry`.`json` AS INTEGER) + 1 \
     WHERE json_valid(`registry`.`json`) AND json_type(`registry`.`json`) = 'integer' \
     AND CAST(`registry`.`json` AS INTEGER) < 9223372036854775807 \
     RETURNING `json`";

impl Registry<'_> {
    /// Atomically increment the counter `name` and return its new value.
    ///
    /// The first call for a name stores and returns `start_from` itself. Concurrent callers on
    /// other sessions each observe a distinct value.
    ///
    /// # Errors
    /// `ValidationError` for `system:id` or an over-long name; `TypeMismatch` (nothing
    /// written) when the stored value is not a JSON integer.
    pub fn increment(&self, name: &str, start_from: i64) -> Result<i64, SqlRegistryError> {
        if name == SYSTEM_ID {
            return Err(SqlRegistryError::ValidationError(format!(
                "`{SYSTEM_ID}` is read-only"
            )));
        }
        validate_name(name)?;

        let returned = self.session.query_value(
            INCREMENT,
            &[
                Arg::list(["hash", "name", "json"]),
                Arg::list([
                    Param::Blob(name_hash(name)),
                    Param::from(name),
                    Param::Text(start_from.to_string()),
                ]),
            ],
        )?;

        let value = match returned {
            Some(SqlValue::Int(value)) => Some(value),
            Some(SqlValue::Text(text)) => text.parse::<i64>().ok(),
            Some(_) => None,
            // guard rejected the update; report what is stored
            None => {
                let stored = self.fetch(name)?.unwrap_or(JsonValue::Null);
                if stored.is_i64() {
                    return Err(SqlRegistryError::ValidationError(format!(
                        "counter `{name}` would overflow"
                    )));
                }
                return Err(mismatch(name, "integer", &stored));
            }
        };
        let value = value.ok_or_else(|| {
            SqlRegistryError::ValidationError(format!("counter `{name}` returned a non-integer"))
        })?;

        tracing::debug!(target: REGISTRY, name, value, "counter incremented");
        Ok(value)
    }
}
