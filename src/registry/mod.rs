//! Key-value registry stored in the `registry` table.
//!
//! Every lookup and write keys on `sha1(name)`; the `name` column is there for people reading
//! the table. Values are JSON text. The `system:id` entry is written once by the installer and
//! is read-only afterwards.

use std::cell::OnceCell;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use sha1::{Digest, Sha1};

use crate::error::SqlRegistryError;
use crate::logging::REGISTRY;
use crate::sqlite::Session;
use crate::types::{Arg, Param, SqlValue};

mod counter;
mod lock;

pub use lock::{LockAttempt, LockWait};

/// Reserved entry holding the installation identifier.
pub const SYSTEM_ID: &str = "system:id";

/// Longest accepted entry name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

const UPSERT: &str = "INSERT INTO `registry` (`??`) VALUES ('??') \
     ON CONFLICT(`hash`) DO UPDATE SET `json` = excluded.`json`";

/// A stored entry with its bookkeeping columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryEntry {
    pub id: i64,
    pub name: String,
    pub value: JsonValue,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Registry view over one session.
///
/// Lock holds taken through [`Registry::lock`] belong to the session's connection, so every
/// registry over the same session sees the same holds.
pub struct Registry<'s> {
    session: &'s Session,
    installation_id: OnceCell<String>,
}

impl<'s> Registry<'s> {
    #[must_use]
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            installation_id: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Stored value for `name`, or `default` when absent.
    ///
    /// # Errors
    /// Engine failures, or `JsonError` if the stored text is not valid JSON.
    pub fn get(&self, name: &str, default: JsonValue) -> Result<JsonValue, SqlRegistryError> {
        Ok(self.lookup(name)?.unwrap_or(default))
    }

    /// Store `value` under `name` and return it. A `null` value removes the entry.
    ///
    /// # Errors
    /// `ValidationError` for `system:id` or a name longer than 255 bytes, checked before
    /// any write. Engine failures otherwise.
    pub fn set(&self, name: &str, value: JsonValue) -> Result<JsonValue, SqlRegistryError> {
        validate_writable(name)?;
        if value.is_null() {
            self.delete(name)?;
            return Ok(JsonValue::Null);
        }

        let json = serde_json::to_string(&value)?;
        self.session.execute_dml(
            UPSERT,
            &[
                Arg::list(["hash", "name", "json"]),
                Arg::list([
                    Param::Blob(name_hash(name)),
                    Param::from(name),
                    Param::Text(json),
                ]),
            ],
        )?;
        tracing::debug!(target: REGISTRY, name, "registry value stored");
        Ok(value)
    }

    /// Remove `name`. Returns whether an entry existed.
    ///
    /// # Errors
    /// `ValidationError` for `system:id`; engine failures otherwise.
    pub fn unset(&self, name: &str) -> Result<bool, SqlRegistryError> {
        validate_writable(name)?;
        self.delete(name)
    }

    /// # Errors
    /// `TypeMismatch` if the stored value is not a JSON string.
    pub fn get_string(&self, name: &str, default: &str) -> Result<String, SqlRegistryError> {
        match self.lookup(name)? {
            None => Ok(default.to_string()),
            Some(JsonValue::String(s)) => Ok(s),
            Some(other) => Err(mismatch(name, "string", &other)),
        }
    }

    /// # Errors
    /// `TypeMismatch` if the stored value is not a JSON integer that fits in `i64`.
    pub fn get_int(&self, name: &str, default: i64) -> Result<i64, SqlRegistryError> {
        match self.lookup(name)? {
            None => Ok(default),
            Some(value) => value.as_i64().ok_or_else(|| mismatch(name, "integer", &value)),
        }
    }

    /// Integers are accepted and widened.
    ///
    /// # Errors
    /// `TypeMismatch` if the stored value is not a JSON number.
    pub fn get_float(&self, name: &str, default: f64) -> Result<f64, SqlRegistryError> {
        match self.lookup(name)? {
            None => Ok(default),
            Some(value) => value.as_f64().ok_or_else(|| mismatch(name, "number", &value)),
        }
    }

    /// # Errors
    /// `TypeMismatch` if the stored value is not a JSON array.
    pub fn get_array(
        &self,
        name: &str,
        default: Vec<JsonValue>,
    ) -> Result<Vec<JsonValue>, SqlRegistryError> {
        match self.lookup(name)? {
            None => Ok(default),
            Some(JsonValue::Array(items)) => Ok(items),
            Some(other) => Err(mismatch(name, "array", &other)),
        }
    }

    /// # Errors
    /// `TypeMismatch` if the stored value is not a JSON object.
    pub fn get_map(
        &self,
        name: &str,
        default: Map<String, JsonValue>,
    ) -> Result<Map<String, JsonValue>, SqlRegistryError> {
        match self.lookup(name)? {
            None => Ok(default),
            Some(JsonValue::Object(map)) => Ok(map),
            Some(other) => Err(mismatch(name, "object", &other)),
        }
    }

    /// Decode the stored value into `T`.
    ///
    /// # Errors
    /// `JsonError` if the value does not deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, SqlRegistryError> {
        self.lookup(name)?
            .map(|value| serde_json::from_value(value).map_err(SqlRegistryError::from))
            .transpose()
    }

    /// Encode `value` and store it. Values that serialize to `null` remove the entry.
    ///
    /// # Errors
    /// As [`Registry::set`], plus `JsonError` if `value` cannot be serialized.
    pub fn set_as<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<JsonValue, SqlRegistryError> {
        self.set(name, serde_json::to_value(value)?)
    }

    /// Full row for `name`, including its timestamps.
    ///
    /// # Errors
    /// Engine failures, invalid stored JSON or an out-of-range timestamp.
    pub fn entry(&self, name: &str) -> Result<Option<RegistryEntry>, SqlRegistryError> {
        let row = self.session.query_row(
            "SELECT `id`, `name`, `json`, `created`, `modified` FROM `registry` WHERE `hash` = ?",
            &[Arg::from(name_hash(name))],
        )?;
        let Some(row) = row else {
            return Ok(None);
        };

        let int = |column: &str| {
            row.get(column)
                .and_then(SqlValue::as_int)
                .ok_or_else(|| corrupt(name, column))
        };
        let json = row
            .get("json")
            .and_then(SqlValue::as_text)
            .ok_or_else(|| corrupt(name, "json"))?;

        Ok(Some(RegistryEntry {
            id: int("id")?,
            name: row
                .get("name")
                .and_then(SqlValue::as_text)
                .unwrap_or(name)
                .to_string(),
            value: serde_json::from_str(json)?,
            created: timestamp(name, int("created")?)?,
            modified: timestamp(name, int("modified")?)?,
        }))
    }

    /// The installation identifier, read once from `system:id` and cached.
    ///
    /// # Errors
    /// `ValidationError` if the schema has not been installed.
    pub fn installation_id(&self) -> Result<String, SqlRegistryError> {
        if let Some(id) = self.installation_id.get() {
            return Ok(id.clone());
        }
        let id = match self.fetch(SYSTEM_ID)? {
            Some(JsonValue::String(id)) => id,
            Some(other) => return Err(mismatch(SYSTEM_ID, "string", &other)),
            None => {
                return Err(SqlRegistryError::ValidationError(format!(
                    "`{SYSTEM_ID}` is missing; install the registry schema first"
                )));
            }
        };
        let _ = self.installation_id.set(id.clone());
        Ok(id)
    }

    /// `system:id` answers from the cache once it has been read.
    fn lookup(&self, name: &str) -> Result<Option<JsonValue>, SqlRegistryError> {
        if name == SYSTEM_ID {
            if let Some(id) = self.installation_id.get() {
                return Ok(Some(JsonValue::String(id.clone())));
            }
        }
        self.fetch(name)
    }

    fn fetch(&self, name: &str) -> Result<Option<JsonValue>, SqlRegistryError> {
        let stored = self.session.query_value(
            "SELECT `json` FROM `registry` WHERE `hash` = ?",
            &[Arg::from(name_hash(name))],
        )?;
        match stored {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Text(json)) => Ok(Some(serde_json::from_str(&json)?)),
            Some(_) => Err(corrupt(name, "json")),
        }
    }

    fn delete(&self, name: &str) -> Result<bool, SqlRegistryError> {
        let removed = self.session.execute_dml(
            "DELETE FROM `registry` WHERE `hash` = ?",
            &[Arg::from(name_hash(name))],
        )?;
        tracing::debug!(target: REGISTRY, name, removed, "registry value removed");
        Ok(removed > 0)
    }
}

/// The 20-byte key every registry statement matches on.
#[must_use]
pub fn name_hash(name: &str) -> Vec<u8> {
    Sha1::digest(name.as_bytes()).to_vec()
}

pub(crate) fn validate_name(name: &str) -> Result<(), SqlRegistryError> {
    if name.len() > MAX_NAME_LEN {
        return Err(SqlRegistryError::ValidationError(format!(
            "registry name is {} bytes, the limit is {MAX_NAME_LEN}",
            name.len()
        )));
    }
    Ok(())
}

fn validate_writable(name: &str) -> Result<(), SqlRegistryError> {
    if name == SYSTEM_ID {
        return Err(SqlRegistryError::ValidationError(format!(
            "`{SYSTEM_ID}` is read-only"
        )));
    }
    validate_name(name)
}

/// JSON shape name used in `TypeMismatch` errors.
pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_i64() => "integer",
        JsonValue::Number(n) if n.is_u64() => "unsigned integer",
        JsonValue::Number(_) => "float",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

pub(crate) fn mismatch(name: &str, expected: &'static str, found: &JsonValue) -> SqlRegistryError {
    SqlRegistryError::TypeMismatch {
        name: name.to_string(),
        expected,
        found: json_kind(found),
    }
}

fn corrupt(name: &str, column: &str) -> SqlRegistryError {
    SqlRegistryError::ValidationError(format!(
        "registry row `{name}` has an unexpected `{column}` column"
    ))
}

fn timestamp(name: &str, secs: i64) -> Result<DateTime<Utc>, SqlRegistryError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        SqlRegistryError::ValidationError(format!(
            "registry row `{name}` has an out-of-range timestamp {secs}"
        ))
    })
}
