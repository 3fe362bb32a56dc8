pub mod config;
pub mod error;
pub mod execution;
pub mod execution_loop;
pub mod generator;
pub mod llm;
pub mod schema_inspector;
pub mod security;

pub use config::AppConfig;
pub use error::{AgentError, Result};
pub use execution::{QueryExecutor, QueryResult};
pub use execution_loop::{QueryRequest, RunOutcome, WorkflowEngine, WorkflowError};
pub use generator::QueryGenerator;
pub use llm::{ChatModel, ChatTurn, ProviderRegistry};
