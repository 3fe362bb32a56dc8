//! Execution Module - read-only query execution against SQLite files

pub mod executor;
pub mod result;

pub use executor::{QueryExecutor, READ_ONLY_VIOLATION};
pub use result::{QueryResult, Row, NO_RESULT_SET_MESSAGE};
