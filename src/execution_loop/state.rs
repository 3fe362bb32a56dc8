//! Workflow state and request/outcome types

use crate::execution::QueryResult;
use crate::execution_loop::error_classifier::WorkflowError;
use crate::llm::ChatTurn;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Caller input for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub db_path: PathBuf,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            question: question.into(),
            db_path: db_path.into(),
            chat_history: Vec::new(),
            provider: None,
            model_name: None,
        }
    }

    pub fn with_history(mut self, chat_history: Vec<ChatTurn>) -> Self {
        self.chat_history = chat_history;
        self
    }

    pub fn with_model(mut self, provider: Option<String>, model_name: Option<String>) -> Self {
        self.provider = provider;
        self.model_name = model_name;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    Generate,
    Execute,
    Explain,
    Success,
    Failure,
}

impl WorkflowStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStep::Success | WorkflowStep::Failure)
    }
}

/// Mutable state of one in-flight run, owned by `WorkflowEngine::run`
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub question: String,
    pub schema: String,
    pub sql: String,
    pub result: Option<QueryResult>,
    pub error: Option<WorkflowError>,
    /// Generation attempts so far
    pub retry_count: u32,
    pub chat_history: Vec<ChatTurn>,
    pub db_path: PathBuf,
    pub provider: Option<String>,
    pub model_name: Option<String>,
}

impl WorkflowState {
    pub fn new(request: QueryRequest, schema: String) -> Self {
        Self {
            question: request.question,
            schema,
            sql: String::new(),
            result: None,
            error: None,
            retry_count: 0,
            chat_history: request.chat_history,
            db_path: request.db_path,
            provider: request.provider,
            model_name: request.model_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSuccess {
    pub result: QueryResult,
    pub sql: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub error: WorkflowError,
    /// Last candidate SQL, if generation got that far
    pub sql: Option<String>,
    pub attempts: u32,
}

/// Terminal result of a run: a result or an error, never both
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Success(RunSuccess),
    Failure(RunFailure),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    pub fn result(&self) -> Option<&QueryResult> {
        match self {
            RunOutcome::Success(success) => Some(&success.result),
            RunOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&WorkflowError> {
        match self {
            RunOutcome::Success(_) => None,
            RunOutcome::Failure(failure) => Some(&failure.error),
        }
    }

    /// Number of generation attempts made (the final `retry_count`)
    pub fn attempts(&self) -> u32 {
        match self {
            RunOutcome::Success(success) => success.attempts,
            RunOutcome::Failure(failure) => failure.attempts,
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            RunOutcome::Success(success) => Some(&success.sql),
            RunOutcome::Failure(failure) => failure.sql.as_deref(),
        }
    }

    /// `{"result": {...}}` or `{"error": "..."}`
    pub fn to_response(&self) -> Value {
        match self {
            RunOutcome::Success(success) => json!({ "result": success.result }),
            RunOutcome::Failure(failure) => json!({ "error": failure.error.to_string() }),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            RunOutcome::Success(_) => 200,
            RunOutcome::Failure(failure) => failure.error.status_code(),
        }
    }
}
