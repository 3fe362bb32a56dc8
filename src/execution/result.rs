//! Query Result - rows materialized from a read-only execution

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row: column name -> scalar value, in column order
pub type Row = Map<String, Value>;

pub const NO_RESULT_SET_MESSAGE: &str = "Query executed successfully (no data returned).";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in select-list order
    pub columns: Vec<String>,

    #[serde(alias = "data")]
    pub rows: Vec<Row>,

    /// Explanation or informational note attached after execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            message: None,
        }
    }

    /// Result with neither columns nor rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Result of a statement that produced no result set
    pub fn informational(message: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First `limit` rows, used as the explanation preview
    pub fn preview(&self, limit: usize) -> &[Row] {
        &self.rows[..self.rows.len().min(limit)]
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
