use crate::conversion::coerce;
use crate::error::SqlRegistryError;
use crate::types::{Param, SqlValue};

/// Quote an identifier with backticks, doubling any embedded backtick.
pub(crate) fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for ch in name.chars() {
        if ch == '`' {
            out.push('`');
        }
        out.push(ch);
    }
    out.push('`');
    out
}

/// Identifiers cannot be bound, so the value is rendered into the SQL text.
pub(super) fn identifier_from_param(param: &Param) -> Result<String, SqlRegistryError> {
    match coerce(param)? {
        SqlValue::Text(s) => Ok(quote_identifier(&s)),
        SqlValue::Int(i) => Ok(quote_identifier(&i.to_string())),
        SqlValue::Float(f) => Ok(quote_identifier(&f.to_string())),
        SqlValue::Null | SqlValue::Blob(_) => Err(SqlRegistryError::ArgumentError(format!(
            "{} cannot be used as an identifier",
            param.kind()
        ))),
    }
}

/// `?, ?, ?` with `count` markers.
pub(super) fn marker_list(count: usize) -> String {
    let mut out = String::with_capacity(count * 3);
    for idx in 0..count {
        if idx > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}
