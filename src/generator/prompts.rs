//! Prompt templates for SQL generation and result explanation

use crate::execution::Row;
use crate::llm::{ChatMessage, ChatTurn};

const SQL_SYSTEM_TEMPLATE: &str = "You are a world-class SQL writer. Your job is to take a user's question and a database schema, \
and generate a valid, runnable SQL query that answers the question.

- Only output the SQL query. Do not include any other text, explanations, or markdown.
- Ensure the query is compatible with SQLite.
- The user is in a read-only environment. Do not generate any write queries (INSERT, UPDATE, DELETE, DROP, etc.).
- Add LIMIT 100 unless the user explicitly asks for more rows.

Here is the database schema you must use:
{schema}
{correction_instruction}";

const EXPLANATION_SYSTEM_PROMPT: &str = "You are a helpful data analyst. Explain query results to a non-technical user \
in plain language. Be concise: two or three sentences, no SQL, no markdown tables.";

/// Appended to the system prompt when the previous attempt failed
pub fn correction_instruction(prior_error: Option<&str>) -> String {
    match prior_error {
        Some(error) if !error.trim().is_empty() => format!(
            "\n\nPREVIOUS ERROR: {}\nCORRECTION: Please fix the SQL query to resolve the error above.",
            error
        ),
        _ => String::new(),
    }
}

/// System rules + schema, then history, then the question as the last user turn
pub fn sql_generation_messages(
    question: &str,
    schema: &str,
    chat_history: &[ChatTurn],
    prior_error: Option<&str>,
) -> Vec<ChatMessage> {
    let system = SQL_SYSTEM_TEMPLATE
        .replace("{schema}", schema)
        .replace("{correction_instruction}", &correction_instruction(prior_error));

    let mut messages = Vec::with_capacity(chat_history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(chat_history.iter().map(ChatTurn::to_message));
    messages.push(ChatMessage::user(question));
    messages
}

pub fn explanation_messages(question: &str, sql: &str, preview: &[Row]) -> Vec<ChatMessage> {
    let data = serde_json::to_string_pretty(preview).unwrap_or_else(|_| "[]".to_string());
    let user = format!(
        "Question: {}\n\nSQL used:\n{}\n\nFirst {} rows of the result:\n{}\n\nExplain what this result means for the question.",
        question,
        sql,
        preview.len(),
        data
    );
    vec![
        ChatMessage::system(EXPLANATION_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ]
}
