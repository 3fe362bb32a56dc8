//! Configuration
//!
//! Loaded once at startup from `llm_config.yaml` and passed by value or
//! `Arc` to every component that needs it.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,

    /// Per-provider overrides keyed by provider name ("openai", "gemini", ...)
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_provider")]
    pub active_provider: String,

    #[serde(default)]
    pub temperature: f32,

    /// Workflow retry budget, also reused as the HTTP retry count of each backend
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Busy timeout for read-only SQLite connections
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Rows shown to the model when explaining a result
    #[serde(default = "default_preview_rows")]
    pub explanation_preview_rows: usize,

    /// Per-request timeout for model HTTP calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_provider: default_provider(),
            temperature: 0.0,
            max_retries: default_max_retries(),
            query_timeout_secs: default_query_timeout_secs(),
            explanation_preview_rows: default_preview_rows(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_query_timeout_secs() -> u64 {
    5
}

fn default_preview_rows() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Provider-specific settings; unset fields fall back to the provider's built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub model_name: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&contents)?;
        info!(
            "Loaded configuration from {} (provider: {}, max_retries: {})",
            path.display(),
            config.settings.active_provider,
            config.settings.max_retries
        );
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does not exist.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Configuration file not found at {} - using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.settings.active_provider.trim().is_empty() {
            return Err(AgentError::Config(
                "settings.active_provider must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.settings.temperature) {
            return Err(AgentError::Config(format!(
                "settings.temperature must be between 0 and 2, got {}",
                self.settings.temperature
            )));
        }
        Ok(())
    }

    /// Settings for a provider, empty when the document has no entry for it
    pub fn provider(&self, name: &str) -> ProviderSettings {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.query_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_secs)
    }
}
