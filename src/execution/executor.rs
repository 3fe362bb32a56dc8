//! SQLite Query Executor
//!
//! Runs validated SQL against a read-only connection and materializes the
//! full result set.

use crate::error::{AgentError, Result};
use crate::execution::result::{QueryResult, Row, NO_RESULT_SET_MESSAGE};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use serde_json::{Number, Value};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const READ_ONLY_VIOLATION: &str =
    "Database is in Read-Only mode. Write operations are forbidden.";

#[derive(Debug, Clone)]
pub struct QueryExecutor {
    busy_timeout: Duration,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl QueryExecutor {
    pub fn new(busy_timeout: Duration) -> Self {
        Self { busy_timeout }
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    /// Execute `sql` against the database at `db_path`.
    ///
    /// Engine failures come back as `AgentError::Execution` carrying SQLite's
    /// message, except write attempts, which become `SecurityViolation`.
    pub fn execute(&self, sql: &str, db_path: &Path) -> Result<QueryResult> {
        if db_path.as_os_str().is_empty() || !db_path.exists() {
            return Err(AgentError::Execution(format!(
                "Database file not found at {}",
                db_path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(map_sqlite_error)?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(map_sqlite_error)?;

        if sql.trim().is_empty() {
            debug!("Empty SQL received, returning empty result");
            return Ok(QueryResult::empty());
        }

        let start = Instant::now();
        let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;

        if stmt.column_count() == 0 {
            stmt.execute([]).map_err(map_sqlite_error)?;
            return Ok(QueryResult::informational(NO_RESULT_SET_MESSAGE));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = Vec::new();
        let mut cursor = stmt.query([]).map_err(map_sqlite_error)?;
        while let Some(row) = cursor.next().map_err(map_sqlite_error)? {
            let mut record = Row::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                let value = row.get_ref(idx).map_err(map_sqlite_error)?;
                record.insert(name.clone(), to_json(value));
            }
            rows.push(record);
        }

        info!(
            "Query returned {} rows x {} columns in {}ms",
            rows.len(),
            columns.len(),
            start.elapsed().as_millis()
        );
        Ok(QueryResult::new(columns, rows))
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
    }
}

fn map_sqlite_error(err: rusqlite::Error) -> AgentError {
    let read_only = err.sqlite_error_code() == Some(ErrorCode::ReadOnly)
        || err.to_string().contains("attempt to write a readonly database");
    if read_only {
        AgentError::SecurityViolation(READ_ONLY_VIOLATION.to_string())
    } else {
        AgentError::Execution(err.to_string())
    }
}
