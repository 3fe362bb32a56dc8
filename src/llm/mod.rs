//! LLM Module
//!
//! A single chat capability (`ChatModel`) with one implementation per
//! provider family, plus the registry that maps provider names to
//! constructors.

pub mod gemini;
pub mod openai;
pub mod registry;
pub mod retry;

pub use gemini::GeminiClient;
pub use openai::OpenAiCompatibleClient;
pub use registry::{ModelSelector, ProviderRegistry, ProviderSpec};
pub use retry::RetryPolicy;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A prior conversation turn as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// "assistant" turns stay assistant turns; every other role is sent as user
    pub fn to_message(&self) -> ChatMessage {
        if self.role.eq_ignore_ascii_case("assistant") {
            ChatMessage::assistant(self.content.clone())
        } else {
            ChatMessage::user(self.content.clone())
        }
    }
}

/// Chat completion capability shared by every backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name, e.g. "openai"
    fn provider(&self) -> &str;

    /// Model identifier sent to the provider
    fn model(&self) -> &str;

    /// Send the conversation and return the assistant's text
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String>;
}
