//! Blocking SQLite access layer with a small placeholder mini-language, plus a key-value
//! registry, atomic counters and named locks built on top of it.
//!
//! A caller writes a template with `?` (scalar) and `??` (list/map) markers. The template is
//! expanded to plain `?` markers, every value is coerced to an engine-native type, and the
//! statement runs on the session's connection. Row-producing statements come back as a
//! [`ResultCursor`]; everything else as an inserted id or affected-row count.
//!
//! ```rust
//! use sql_registry::prelude::*;
//!
//! let session = Session::open_in_memory()?;
//! Installer::new(&session).install_schema()?;
//!
//! let registry = Registry::new(&session);
//! registry.set("mail.from", serde_json::json!({"name": "ops"}))?;
//! assert_eq!(registry.get_int("mail.retries", 3)?, 3);
//! assert_eq!(registry.increment("jobs.seq", 1)?, 1);
//! assert_eq!(registry.increment("jobs.seq", 1)?, 2);
//! # Ok::<(), SqlRegistryError>(())
//! ```

pub mod conversion;
pub mod error;
pub mod expansion;
pub mod installer;
pub(crate) mod logging;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod sqlite;
pub mod types;

pub use error::SqlRegistryError;
pub use expansion::{ExpandedQuery, expand_placeholders};
pub use installer::{InstallReport, Installer};
pub use registry::{LockAttempt, LockWait, Registry, RegistryEntry};
pub use results::{ExecutionOutcome, ResultCursor, Row};
pub use sqlite::{BatchMode, Session, SessionOptions, SessionOptionsBuilder};
pub use types::{Arg, EnumBacking, MapKey, Param, SqlEnum, SqlValue};
