#![allow(dead_code)]

use async_trait::async_trait;
use nl2sql::config::AppConfig;
use nl2sql::error::{AgentError, Result};
use nl2sql::execution::QueryExecutor;
use nl2sql::execution_loop::WorkflowEngine;
use nl2sql::generator::QueryGenerator;
use nl2sql::llm::{ChatMessage, ChatModel, ModelSelector, ProviderRegistry, Role};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

type Responder = Box<dyn Fn(usize, &[ChatMessage]) -> Result<String> + Send + Sync>;

/// In-process model that answers from a closure and records every prompt
pub struct ScriptedModel {
    name: String,
    responder: Responder,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    /// `sql` answers generation prompts, `explanation` answers explanation prompts
    pub fn fixed(sql: &str, explanation: &str) -> Arc<Self> {
        let sql = sql.to_string();
        let explanation = explanation.to_string();
        Self::with(move |_, messages| {
            if is_explanation(messages) {
                Ok(explanation.clone())
            } else {
                Ok(sql.clone())
            }
        })
    }

    /// `responder` receives the 0-based call index and the prompt
    pub fn with<F>(responder: F) -> Arc<Self>
    where
        F: Fn(usize, &[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    {
        Self::named("scripted", responder)
    }

    pub fn named<F>(name: &str, responder: F) -> Arc<Self>
    where
        F: Fn(usize, &[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.to_string(),
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn generation_calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls().into_iter().filter(|m| !is_explanation(m)).collect()
    }

    pub fn explanation_calls(&self) -> usize {
        self.calls().iter().filter(|m| is_explanation(m)).count()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn provider(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages.to_vec());
            calls.len() - 1
        };
        (self.responder)(index, messages)
    }
}

pub fn is_explanation(messages: &[ChatMessage]) -> bool {
    messages
        .first()
        .map(|m| m.role == Role::System && m.content.contains("data analyst"))
        .unwrap_or(false)
}

pub fn system_prompt(messages: &[ChatMessage]) -> &str {
    &messages[0].content
}

pub fn llm_failure(message: &str) -> AgentError {
    AgentError::Llm(message.to_string())
}

/// `t(id INTEGER, name TEXT)` holding (1, 'a') and (2, 'b')
pub fn sample_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sample.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE t (id INTEGER, name TEXT);
         INSERT INTO t VALUES (1, 'a');
         INSERT INTO t VALUES (2, 'b');",
    )
    .unwrap();
    (dir, path)
}

pub fn row_count(path: &PathBuf, table: &str) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}

pub fn engine_with_registry(
    model: Arc<ScriptedModel>,
    registry: ProviderRegistry,
    max_retries: u32,
) -> WorkflowEngine {
    let selector = ModelSelector::with_default(
        Arc::new(AppConfig::default()),
        registry,
        model as Arc<dyn ChatModel>,
    );
    WorkflowEngine::new(
        QueryGenerator::new(selector, 5),
        QueryExecutor::default(),
        max_retries,
    )
}

pub fn engine(model: Arc<ScriptedModel>, max_retries: u32) -> WorkflowEngine {
    engine_with_registry(model, ProviderRegistry::empty(), max_retries)
}
