//! OpenAI-compatible chat completions backend
//!
//! Serves OpenAI itself and the providers exposing the same
//! `/chat/completions` contract (Groq, Mistral).

use crate::error::{AgentError, Result};
use crate::llm::retry::{send_json_with_retry, RetryPolicy};
use crate::llm::{ChatMessage, ChatModel};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    provider: String,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(
        provider: impl Into<String>,
        api_key: String,
        base_url: String,
        model: String,
        temperature: f32,
        retry: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            provider: provider.into(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
            retry,
            http,
        })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }
}

/// Pull the assistant text out of a chat completions response
pub fn parse_chat_completion(response: &Value) -> Result<String> {
    if let Some(error) = response.get("error") {
        return Err(AgentError::Llm(format!("LLM API error: {}", error)));
    }

    let choice = response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| AgentError::Llm(format!("No choices in LLM response: {}", response)))?;

    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some("content_filter") => {
            return Err(AgentError::Llm(
                "LLM response was filtered by content policy".to_string(),
            ))
        }
        Some("length") => warn!("LLM response was truncated due to length limit"),
        _ => {}
    }

    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| AgentError::Llm(format!("No content in LLM response: {}", response)))?;

    if content.is_empty() {
        return Err(AgentError::Llm("Empty content in LLM response".to_string()));
    }
    Ok(content.to_string())
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(messages);
        debug!(
            "Calling {} model {} with {} messages",
            self.provider,
            self.model,
            messages.len()
        );

        let response = send_json_with_retry(&self.retry, &self.provider, || {
            self.http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        parse_chat_completion(&response)
    }
}
