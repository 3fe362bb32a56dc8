//! Error Classifier
//!
//! Maps component errors onto the workflow's failure taxonomy, which decides
//! between retrying and stopping.

use crate::error::AgentError;
use serde::Serialize;
use thiserror::Error;

pub const SECURITY_VIOLATION_MARKER: &str = "Security Violation";

/// Terminal and intermediate failures of a workflow run
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum WorkflowError {
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Generation Error: {0}")]
    Generation(String),

    #[error("Security Violation: {0}")]
    SecurityViolation(String),

    #[error("{0}")]
    Execution(String),

    #[error("{last} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        last: Box<WorkflowError>,
    },
}

impl WorkflowError {
    /// Retryable failures consume one slot of the retry budget
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Generation(_) | WorkflowError::Execution(_))
    }

    pub fn is_security_violation(&self) -> bool {
        match self {
            WorkflowError::SecurityViolation(_) => true,
            WorkflowError::RetriesExhausted { last, .. } => last.is_security_violation(),
            other => other.to_string().contains(SECURITY_VIOLATION_MARKER),
        }
    }

    /// HTTP status the boundary layer answers with
    pub fn status_code(&self) -> u16 {
        if self.is_security_violation() {
            403
        } else {
            400
        }
    }
}

/// Workflow stage an error surfaced in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Schema,
    Setup,
    Generate,
    Execute,
}

pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error: &AgentError, stage: Stage) -> WorkflowError {
        match error {
            AgentError::SecurityViolation(msg) => WorkflowError::SecurityViolation(msg.clone()),
            AgentError::SchemaUnavailable(msg) => WorkflowError::SchemaUnavailable(msg.clone()),
            AgentError::Config(msg) => WorkflowError::Configuration(msg.clone()),
            other => {
                let message = other.to_string();
                if message.contains(SECURITY_VIOLATION_MARKER)
                    || message.contains("attempt to write a readonly database")
                {
                    return WorkflowError::SecurityViolation(message);
                }
                match stage {
                    Stage::Schema => WorkflowError::SchemaUnavailable(message),
                    Stage::Setup => WorkflowError::Configuration(message),
                    Stage::Generate => WorkflowError::Generation(message),
                    Stage::Execute => match other {
                        AgentError::Execution(msg) | AgentError::Database(msg) => {
                            WorkflowError::Execution(msg.clone())
                        }
                        _ => WorkflowError::Execution(message),
                    },
                }
            }
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
