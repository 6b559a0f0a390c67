//! Log-field helpers shared by the executor, registry and installer.
//!
//! Logging goes through `tracing`; the channel is the event target and the structured context
//! rides in event fields.

use crate::types::SqlValue;

pub(crate) const EXECUTOR: &str = "sql_registry::executor";
pub(crate) const REGISTRY: &str = "sql_registry::registry";
pub(crate) const INSTALLER: &str = "sql_registry::installer";

/// SQL longer than this is cut in log output.
pub(crate) const MAX_LOGGED_SQL: usize = 256;

/// Truncate `sql` to at most `MAX_LOGGED_SQL` characters, marking the cut.
pub(crate) fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(MAX_LOGGED_SQL) {
        Some((cut, _)) => format!("{}…", &sql[..cut]),
        None => sql.to_string(),
    }
}

/// Render bound parameters compactly for a log field.
pub(crate) fn describe_params(params: &[SqlValue]) -> String {
    let rendered: Vec<String> = params
        .iter()
        .map(|value| match value {
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => format!("{s:?}"),
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Blob(b) => format!("x'{}'", hex::encode(b)),
        })
        .collect();
    format!("[{}]", rendered.join(", "))
}
