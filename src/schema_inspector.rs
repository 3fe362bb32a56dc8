//! Schema Inspector
//!
//! Reads the structure of a SQLite database into the text block embedded in
//! the SQL generation prompt.

use crate::error::{AgentError, Result};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const EMPTY_SCHEMA_TEXT: &str = "Database is empty (no tables found).";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub tables: Vec<TableSchema>,
}

impl SchemaDescription {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Render as prompt text: one block per table, or the empty marker
    pub fn to_prompt_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SchemaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tables.is_empty() {
            return write!(f, "{}", EMPTY_SCHEMA_TEXT);
        }
        for table in &self.tables {
            writeln!(f, "Table '{}':", table.name)?;
            for column in &table.columns {
                let pk = if column.primary_key { " (PRIMARY KEY)" } else { "" };
                writeln!(f, "  - {}: {}{}", column.name, column.data_type, pk)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Describe every table of the database at `db_path`.
///
/// A missing or unreadable database is reported as `SchemaUnavailable`; an
/// empty database is a successful, empty description.
pub fn describe(db_path: impl AsRef<Path>) -> Result<SchemaDescription> {
    let db_path = db_path.as_ref();
    if db_path.as_os_str().is_empty() || !db_path.exists() {
        return Err(AgentError::SchemaUnavailable(format!(
            "Database file not found at {}",
            db_path.display()
        )));
    }

    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(unavailable)?;

    let table_names = {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .map_err(unavailable)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(unavailable)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(unavailable)?;
        names
    };

    let mut column_stmt = conn
        .prepare("SELECT name, type, pk FROM pragma_table_info(?1)")
        .map_err(unavailable)?;
    let mut tables = Vec::with_capacity(table_names.len());
    for name in table_names {
        let columns = column_stmt
            .query_map([&name], |row| {
                Ok(ColumnSchema {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                    primary_key: row.get::<_, i64>(2)? > 0,
                })
            })
            .map_err(unavailable)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(unavailable)?;
        debug!("Inspected table '{}' ({} columns)", name, columns.len());
        tables.push(TableSchema { name, columns });
    }

    Ok(SchemaDescription { tables })
}

fn unavailable(err: rusqlite::Error) -> AgentError {
    AgentError::SchemaUnavailable(format!("Error inspecting schema: {}", err))
}
