//! Query Generator
//!
//! Turns a question into candidate SQL and a result into prose, both through
//! a `ChatModel`.

pub mod cleanup;
pub mod prompts;

pub use cleanup::clean_sql_output;

use crate::error::Result;
use crate::execution::QueryResult;
use crate::llm::{ChatModel, ChatTurn, ModelSelector};
use std::sync::Arc;
use tracing::{debug, info};

pub struct QueryGenerator {
    selector: ModelSelector,
    preview_rows: usize,
}

impl QueryGenerator {
    pub fn new(selector: ModelSelector, preview_rows: usize) -> Self {
        Self {
            selector,
            preview_rows,
        }
    }

    /// Backend for one request; unknown providers fail here, before any call
    pub fn select_model(
        &self,
        provider: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<Arc<dyn ChatModel>> {
        self.selector.select(provider, model_name)
    }

    /// Ask the model for SQL answering `question` and clean the completion
    pub async fn generate_query(
        &self,
        model: &dyn ChatModel,
        question: &str,
        schema: &str,
        chat_history: &[ChatTurn],
        prior_error: Option<&str>,
    ) -> Result<String> {
        let messages = prompts::sql_generation_messages(question, schema, chat_history, prior_error);
        let raw = model.invoke(&messages).await?;
        debug!("Raw SQL completion: {}", raw);

        let sql = clean_sql_output(&raw);
        info!("Generated SQL via {} ({}): {}", model.provider(), model.model(), sql);
        Ok(sql)
    }

    /// Natural-language summary of `result`; only a preview of the rows is sent
    pub async fn generate_explanation(
        &self,
        model: &dyn ChatModel,
        question: &str,
        sql: &str,
        result: &QueryResult,
    ) -> Result<String> {
        let preview = result.preview(self.preview_rows);
        let messages = prompts::explanation_messages(question, sql, preview);
        let explanation = model.invoke(&messages).await?;
        Ok(explanation.trim().to_string())
    }
}
