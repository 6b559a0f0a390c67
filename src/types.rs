use std::fmt;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Engine-native scalar: what gets bound to a statement and what comes back in a row.
///
/// Booleans have no storage class of their own and are bound as `Int`.
/// ```rust
/// use sql_registry::prelude::*;
///
/// let values = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Null,
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// NULL value
    Null,
    /// Binary data
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let SqlValue::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.as_int() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Render as a JSON scalar. Blobs become lowercase hex strings.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Int(i) => JsonValue::from(*i),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(JsonValue::Null, JsonValue::Number),
            SqlValue::Text(s) => JsonValue::String(s.clone()),
            SqlValue::Null => JsonValue::Null,
            SqlValue::Blob(bytes) => JsonValue::String(hex::encode(bytes)),
        }
    }
}

impl From<rusqlite::types::Value> for SqlValue {
    fn from(value: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value;
        match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Int(i),
            Value::Real(f) => SqlValue::Float(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Blob(b),
        }
    }
}

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};
        Ok(match self {
            SqlValue::Int(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Float(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Scalar associated with an enumeration variant.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumBacking {
    Int(i64),
    Text(String),
}

/// Implemented by enumerations that can be passed as query parameters.
///
/// Variants with a backing scalar bind that scalar; the rest bind their name.
pub trait SqlEnum {
    fn variant_name(&self) -> &str;

    fn backing(&self) -> Option<EnumBacking> {
        None
    }
}

/// A scalar-like query input before coercion.
///
/// Everything the caller can hand to a `?` marker. [`crate::conversion::coerce`]
/// turns it into exactly one [`SqlValue`] or rejects it.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
    Blob(Vec<u8>),
    /// Rendered as `YYYY-MM-DD HH:MM:SS[.fff]`.
    Timestamp(NaiveDateTime),
    /// Any value that renders itself to text, captured at construction time.
    Stringable(String),
    Enum {
        name: String,
        backing: Option<EnumBacking>,
    },
    /// Only JSON scalars are accepted; arrays and objects are rejected.
    Json(JsonValue),
}

impl Param {
    /// Capture anything implementing `Display` as a stringable input.
    pub fn display(value: impl fmt::Display) -> Self {
        Param::Stringable(value.to_string())
    }

    pub fn from_enum<E: SqlEnum + ?Sized>(value: &E) -> Self {
        Param::Enum {
            name: value.variant_name().to_string(),
            backing: value.backing(),
        }
    }

    /// Short name of the input kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Param::Int(_) => "integer",
            Param::Float(_) => "float",
            Param::Text(_) => "string",
            Param::Bool(_) => "boolean",
            Param::Null => "null",
            Param::Blob(_) => "blob",
            Param::Timestamp(_) => "timestamp",
            Param::Stringable(_) => "stringable",
            Param::Enum { .. } => "enum",
            Param::Json(_) => "json",
        }
    }
}

macro_rules! param_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::$variant(value.into())
                }
            }
        )*
    };
}

param_from! {
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    bool => Bool,
    String => Text,
    &str => Text,
    Vec<u8> => Blob,
    NaiveDateTime => Timestamp,
    JsonValue => Json,
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Null, Into::into)
    }
}

/// Key of a mapping argument. Only `Str` keys are accepted by the bare `??` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int(i) => write!(f, "{i}"),
            MapKey::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        MapKey::Str(value.to_string())
    }
}

impl From<String> for MapKey {
    fn from(value: String) -> Self {
        MapKey::Str(value)
    }
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        MapKey::Int(value)
    }
}

/// One positional argument for a query template.
///
/// `?` markers take a `Value`; `??` markers take a `List` or `Map`.
/// ```rust
/// use sql_registry::prelude::*;
///
/// let args = [
///     Arg::map([("name", "alice"), ("role", "admin")]),
///     Arg::from(7),
/// ];
/// # let _ = args;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Param),
    List(Vec<Param>),
    /// Insertion-ordered mapping.
    Map(Vec<(MapKey, Param)>),
}

impl Arg {
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Param>,
    {
        Arg::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<MapKey>,
        V: Into<Param>,
    {
        Arg::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Arg::Value(_) => "scalar",
            Arg::List(_) => "list",
            Arg::Map(_) => "map",
        }
    }
}

impl From<Param> for Arg {
    fn from(value: Param) -> Self {
        Arg::Value(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        Arg::Value(value.into())
    }
}

macro_rules! arg_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Value(Param::from(value))
                }
            }
        )*
    };
}

arg_from_scalar!(i64, i32, u32, f64, bool, String, &str, Vec<u8>, NaiveDateTime, JsonValue);
