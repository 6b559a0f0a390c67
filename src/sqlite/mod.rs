// SQLite module - the engine binding behind a `Session`
//
// - config: session options, builder and environment loading
// - connection: opening the connection and applying pragmas
// - executor: statement execution and batches
// - params: positional binding of coerced values
// - query: classifying results and buffering row-sets
// - locks: GET_LOCK / RELEASE_LOCK SQL functions backed by lock files

pub mod config;
pub mod connection;
pub mod executor;
pub(crate) mod locks;
pub mod params;
pub mod query;

pub use config::{SessionOptions, SessionOptionsBuilder};
pub use connection::Session;
pub use executor::BatchMode;
