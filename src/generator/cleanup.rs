//! Model output cleanup
//!
//! Raw completions are never executed verbatim: fences and leading prose
//! are removed so only the statement remains.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// First ```lang\n ... ``` block anywhere in the output
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*?)```").unwrap();
    /// ``` ... ``` on a single line
    static ref INLINE_FENCE: Regex = Regex::new(r"```([^`\n]*)```").unwrap();
    static ref LEADING_SELECT: Regex = Regex::new(r"(?i)\A\s*SELECT\b").unwrap();
    static ref SELECT_KEYWORD: Regex = Regex::new(r"(?i)\bSELECT\b").unwrap();
}

const FENCE: &str = "```";

/// Reduce a raw completion to the SQL statement it contains
pub fn clean_sql_output(raw: &str) -> String {
    let mut sql = raw.trim();

    if let Some(inner) = FENCED_BLOCK
        .captures(sql)
        .or_else(|| INLINE_FENCE.captures(sql))
        .and_then(|c| c.get(1))
    {
        sql = inner.as_str().trim();
    }

    if !LEADING_SELECT.is_match(sql) {
        if let Some(found) = SELECT_KEYWORD.find(sql) {
            sql = &sql[found.start()..];
            if let Some(end) = sql.find(FENCE) {
                sql = &sql[..end];
            }
        }
    }

    sql.trim().to_string()
}
