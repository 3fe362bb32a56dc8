//! Gemini backend (`generateContent` REST API)

use crate::error::{AgentError, Result};
use crate::llm::retry::{send_json_with_retry, RetryPolicy};
use crate::llm::{ChatMessage, ChatModel, Role};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(
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
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
            retry,
            http,
        })
    }

    /// System turns go into `systemInstruction`; assistant turns use the "model" role
    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        let system: Vec<Value> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| json!({ "text": m.content }))
            .collect();
        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": { "temperature": self.temperature },
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": system });
        }
        body
    }
}

pub fn parse_generate_content(response: &Value) -> Result<String> {
    if let Some(error) = response.get("error") {
        return Err(AgentError::Llm(format!("Gemini API error: {}", error)));
    }
    if let Some(reason) = response
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(AgentError::Llm(format!("Gemini blocked the prompt: {}", reason)));
    }

    let parts = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c["content"]["parts"].as_array())
        .ok_or_else(|| AgentError::Llm(format!("No candidates in Gemini response: {}", response)))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        return Err(AgentError::Llm("Empty content in Gemini response".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.request_body(messages);
        debug!("Calling gemini model {} with {} messages", self.model, messages.len());

        let response = send_json_with_retry(&self.retry, "gemini", || {
            self.http
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
        })
        .await?;

        parse_generate_content(&response)
    }
}
