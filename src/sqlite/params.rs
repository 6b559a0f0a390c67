use rusqlite::Statement;

use crate::conversion::Params;

/// Bind coerced values positionally (1-based) to a prepared statement.
///
/// # Errors
///
/// Returns `rusqlite::Error::InvalidParameterCount` when the statement's marker count differs
/// from `params`, or the engine's error if a bind fails.
pub fn bind_params(stmt: &mut Statement<'_>, params: &Params) -> rusqlite::Result<()> {
    let expected = stmt.parameter_count();
    if expected != params.len() {
        return Err(rusqlite::Error::InvalidParameterCount(params.len(), expected));
    }
    for (idx, value) in params.as_values().iter().enumerate() {
        stmt.raw_bind_parameter(idx + 1, value)?;
    }
    Ok(())
}
