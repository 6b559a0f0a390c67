mod cursor;
mod outcome;
mod row;

pub use cursor::ResultCursor;
pub use outcome::ExecutionOutcome;
pub use row::{Columns, Row};
