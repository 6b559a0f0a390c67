//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::error::SqlRegistryError;
pub use crate::expansion::{ExpandedQuery, expand_placeholders};
pub use crate::installer::{InstallReport, Installer};
pub use crate::registry::{LockAttempt, LockWait, Registry, RegistryEntry};
pub use crate::results::{ExecutionOutcome, ResultCursor, Row};
pub use crate::sqlite::{BatchMode, Session, SessionOptions, SessionOptionsBuilder};
pub use crate::types::{Arg, EnumBacking, MapKey, Param, SqlEnum, SqlValue};
