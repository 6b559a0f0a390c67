use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlRegistryError {
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Failed to prepare statement `{sql}`: {source}")]
    PrepareError {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQL execution error in `{sql}`: {source}")]
    ExecutionError {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Argument error: {0}")]
    ArgumentError(String),

    #[error("Parameter type error: {0}")]
    TypeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Registry value `{name}` is {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Field `{0}` is not part of the result")]
    UnknownField(String),

    #[error("Cursor has no current row")]
    NoCurrentRow,

    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),
}
