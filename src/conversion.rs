//! Parameter coercion.
//!
//! Every value that reaches a prepared statement passes through [`coerce`], which maps a
//! caller-facing [`Param`] onto exactly one engine-native [`SqlValue`] or rejects it.

use serde_json::Value as JsonValue;

use crate::error::SqlRegistryError;
use crate::types::{EnumBacking, Param, SqlValue};

/// Coerce a single input into its bind value.
///
/// # Errors
///
/// Returns `SqlRegistryError::TypeError` for inputs that would lose information on the way
/// to the engine: non-finite floats and JSON arrays/objects.
///
/// # Example
///
/// ```rust
/// use sql_registry::prelude::*;
/// use sql_registry::conversion::coerce;
///
/// assert_eq!(coerce(&Param::Bool(true))?, SqlValue::Int(1));
/// assert_eq!(coerce(&Param::display(42u8))?, SqlValue::Text("42".into()));
/// # Ok::<(), SqlRegistryError>(())
/// ```
pub fn coerce(param: &Param) -> Result<SqlValue, SqlRegistryError> {
    match param {
        Param::Int(i) => Ok(SqlValue::Int(*i)),
        Param::Float(f) => coerce_float(*f),
        Param::Text(s) | Param::Stringable(s) => Ok(SqlValue::Text(s.clone())),
        Param::Bool(b) => Ok(SqlValue::Int(i64::from(*b))),
        Param::Null => Ok(SqlValue::Null),
        Param::Blob(bytes) => Ok(SqlValue::Blob(bytes.clone())),
        Param::Timestamp(dt) => Ok(SqlValue::Text(dt.format("%F %T%.f").to_string())),
        Param::Enum { name, backing } => Ok(match backing {
            Some(EnumBacking::Int(i)) => SqlValue::Int(*i),
            Some(EnumBacking::Text(s)) => SqlValue::Text(s.clone()),
            None => SqlValue::Text(name.clone()),
        }),
        Param::Json(value) => coerce_json(value),
    }
}

/// Coerce a flattened parameter list, preserving order.
///
/// # Errors
///
/// Returns the first coercion failure, tagged with its 1-based position.
pub fn coerce_all(params: &[Param]) -> Result<Params, SqlRegistryError> {
    let mut values = Vec::with_capacity(params.len());
    for (idx, param) in params.iter().enumerate() {
        let value = coerce(param).map_err(|err| match err {
            SqlRegistryError::TypeError(msg) => {
                SqlRegistryError::TypeError(format!("parameter {}: {msg}", idx + 1))
            }
            other => other,
        })?;
        values.push(value);
    }
    Ok(Params(values))
}

fn coerce_float(f: f64) -> Result<SqlValue, SqlRegistryError> {
    if f.is_finite() {
        Ok(SqlValue::Float(f))
    } else {
        Err(SqlRegistryError::TypeError(format!(
            "non-finite float {f} cannot be bound"
        )))
    }
}

fn coerce_json(value: &JsonValue) -> Result<SqlValue, SqlRegistryError> {
    match value {
        JsonValue::Null => Ok(SqlValue::Null),
        JsonValue::Bool(b) => Ok(SqlValue::Int(i64::from(*b))),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                coerce_float(f)
            } else {
                Err(SqlRegistryError::TypeError(format!(
                    "JSON number {n} does not fit a 64-bit bind value"
                )))
            }
        }
        JsonValue::String(s) => Ok(SqlValue::Text(s.clone())),
        JsonValue::Array(_) => Err(SqlRegistryError::TypeError(
            "JSON array cannot be bound to a scalar placeholder".into(),
        )),
        JsonValue::Object(_) => Err(SqlRegistryError::TypeError(
            "JSON object cannot be bound to a scalar placeholder".into(),
        )),
    }
}

/// Coerced parameters, ready to bind positionally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(pub Vec<SqlValue>);

impl Params {
    /// Borrow the underlying values.
    #[must_use]
    pub fn as_values(&self) -> &[SqlValue] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlEnum;
    use chrono::NaiveDate;
    use serde_json::json;

    enum Suit {
        Hearts,
        Spades,
    }

    impl SqlEnum for Suit {
        fn variant_name(&self) -> &str {
            match self {
                Suit::Hearts => "Hearts",
                Suit::Spades => "Spades",
            }
        }
    }

    enum Status {
        Active,
    }

    impl SqlEnum for Status {
        fn variant_name(&self) -> &str {
            "Active"
        }

        fn backing(&self) -> Option<EnumBacking> {
            match self {
                Status::Active => Some(EnumBacking::Int(3)),
            }
        }
    }

    #[test]
    fn scalars_keep_their_tag() {
        assert_eq!(coerce(&Param::Int(5)).unwrap(), SqlValue::Int(5));
        assert_eq!(coerce(&Param::Float(1.5)).unwrap(), SqlValue::Float(1.5));
        assert_eq!(coerce(&"x".into()).unwrap(), SqlValue::Text("x".into()));
        assert_eq!(coerce(&Param::Bool(false)).unwrap(), SqlValue::Int(0));
        assert_eq!(coerce(&Param::Null).unwrap(), SqlValue::Null);
    }

    #[test]
    fn enums_use_backing_or_name() {
        assert_eq!(
            coerce(&Param::from_enum(&Suit::Spades)).unwrap(),
            SqlValue::Text("Spades".into())
        );
        assert_eq!(
            coerce(&Param::from_enum(&Suit::Hearts)).unwrap(),
            SqlValue::Text("Hearts".into())
        );
        assert_eq!(
            coerce(&Param::from_enum(&Status::Active)).unwrap(),
            SqlValue::Int(3)
        );
    }

    #[test]
    fn timestamps_render_as_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(13, 5, 9)
            .unwrap();
        assert_eq!(
            coerce(&Param::Timestamp(dt)).unwrap(),
            SqlValue::Text("2024-02-29 13:05:09".into())
        );
    }

    #[test]
    fn lossy_inputs_are_rejected() {
        assert!(matches!(
            coerce(&Param::Float(f64::NAN)),
            Err(SqlRegistryError::TypeError(_))
        ));
        assert!(matches!(
            coerce(&Param::Json(json!([1, 2]))),
            Err(SqlRegistryError::TypeError(_))
        ));
        assert!(matches!(
            coerce(&Param::Json(json!({"a": 1}))),
            Err(SqlRegistryError::TypeError(_))
        ));
    }

    #[test]
    fn coerce_all_reports_position() {
        let err = coerce_all(&[Param::Int(1), Param::Json(json!({}))]).unwrap_err();
        assert!(err.to_string().contains("parameter 2"), "{err}");
    }
}
