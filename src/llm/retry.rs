//! Transport-level retries for model HTTP calls
//!
//! Retries connection failures, timeouts, 429 and 5xx responses with
//! exponential backoff. Anything else is returned on the first attempt.

use crate::error::{AgentError, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_delay.as_millis() as f64)
            * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Send the request built by `build` and decode a JSON body, retrying
/// transient failures according to `policy`.
pub async fn send_json_with_retry<F>(
    policy: &RetryPolicy,
    provider: &str,
    build: F,
) -> Result<Value>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let failure = match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.json::<Value>().await.map_err(|e| {
                        AgentError::Llm(format!("Failed to parse {} response: {}", provider, e))
                    });
                }
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                let err = AgentError::Llm(format!("{} API error ({}): {}", provider, status, body));
                if !is_transient_status(status) {
                    return Err(err);
                }
                err
            }
            Err(e) => {
                let err = AgentError::Llm(format!("{} API call failed: {}", provider, e));
                if !(e.is_timeout() || e.is_connect()) {
                    return Err(err);
                }
                err
            }
        };

        if attempt >= policy.max_retries {
            return Err(failure);
        }
        let delay = policy.delay_for_attempt(attempt);
        warn!(
            "{} (retry {}/{} in {:?})",
            failure,
            attempt + 1,
            policy.max_retries,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
