//! SQL Safety Gate
//!
//! Read-only allow-list applied to every candidate query before execution.
//! The check is a prefix test on the statement keyword. It does not look
//! inside the statement: `SELECT 1; DROP TABLE t` passes here and is left
//! to the read-only connection to refuse.

use crate::error::{AgentError, Result};
use tracing::warn;

/// Accept `sql` only if it is a SELECT statement.
///
/// Returns the query unchanged on success so callers can chain it straight
/// into execution.
pub fn validate_sql_safety(sql: &str) -> Result<&str> {
    let stripped = sql.trim();
    if !stripped.to_uppercase().starts_with("SELECT") {
        warn!("Rejected non-SELECT statement: {}", stripped);
        return Err(AgentError::SecurityViolation(format!(
            "Only SELECT statements are allowed. Query: '{}'",
            sql
        )));
    }
    Ok(sql)
}
