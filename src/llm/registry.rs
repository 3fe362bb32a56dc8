//! Provider Registry
//!
//! Maps provider names to backend constructors. The default backend is
//! built once from configuration; per-request overrides get a one-off
//! instance.

use crate::config::{AppConfig, ProviderSettings};
use crate::error::{AgentError, Result};
use crate::llm::gemini::GeminiClient;
use crate::llm::openai::OpenAiCompatibleClient;
use crate::llm::retry::RetryPolicy;
use crate::llm::ChatModel;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything a constructor needs to build one backend
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub provider: String,
    pub model_name: String,
    pub base_url: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl ProviderSpec {
    /// Resolve the API key from the environment
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AgentError::Config(format!(
                    "{} not found in environment variables.",
                    self.api_key_env
                ))
            })
    }
}

pub type ProviderConstructor = Arc<dyn Fn(&ProviderSpec) -> Result<Arc<dyn ChatModel>> + Send + Sync>;

/// Built-in defaults for one provider name
#[derive(Debug, Clone)]
struct ProviderDefaults {
    model_name: &'static str,
    base_url: &'static str,
    api_key_env: &'static str,
}

struct RegisteredProvider {
    defaults: ProviderDefaults,
    constructor: ProviderConstructor,
}

pub struct ProviderRegistry {
    providers: HashMap<String, RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry with openai, gemini, groq and mistral
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(
            "openai",
            "gpt-3.5-turbo",
            "https://api.openai.com/v1",
            "OPENAI_API_KEY",
            Arc::new(openai_compatible),
        );
        registry.register(
            "groq",
            "llama-3.3-70b-versatile",
            "https://api.groq.com/openai/v1",
            "GROQ_API_KEY",
            Arc::new(openai_compatible),
        );
        registry.register(
            "mistral",
            "mistral-large-latest",
            "https://api.mistral.ai/v1",
            "MISTRAL_API_KEY",
            Arc::new(openai_compatible),
        );
        registry.register(
            "gemini",
            "gemini-pro",
            "https://generativelanguage.googleapis.com/v1beta",
            "GOOGLE_API_KEY",
            Arc::new(gemini),
        );
        registry
    }

    pub fn register(
        &mut self,
        name: &str,
        default_model: &'static str,
        default_base_url: &'static str,
        api_key_env: &'static str,
        constructor: ProviderConstructor,
    ) {
        self.providers.insert(
            name.to_lowercase(),
            RegisteredProvider {
                defaults: ProviderDefaults {
                    model_name: default_model,
                    base_url: default_base_url,
                    api_key_env,
                },
                constructor,
            },
        );
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Merge built-in defaults, the configuration entry and the model override
    pub fn spec(
        &self,
        config: &AppConfig,
        provider: &str,
        model_override: Option<&str>,
    ) -> Result<ProviderSpec> {
        let key = provider.to_lowercase();
        let registered = self.providers.get(&key).ok_or_else(|| {
            AgentError::Config(format!("Unsupported LLM provider: {}", provider))
        })?;
        let ProviderSettings {
            model_name,
            base_url,
            api_key_env,
        } = config.provider(&key);

        Ok(ProviderSpec {
            model_name: model_override
                .map(str::to_string)
                .or(model_name)
                .unwrap_or_else(|| registered.defaults.model_name.to_string()),
            base_url: base_url.unwrap_or_else(|| registered.defaults.base_url.to_string()),
            api_key_env: api_key_env
                .unwrap_or_else(|| registered.defaults.api_key_env.to_string()),
            provider: key,
            temperature: config.settings.temperature,
            retry: RetryPolicy::with_max_retries(config.settings.max_retries),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn build(
        &self,
        config: &AppConfig,
        provider: &str,
        model_override: Option<&str>,
    ) -> Result<Arc<dyn ChatModel>> {
        let spec = self.spec(config, provider, model_override)?;
        let registered = &self.providers[&spec.provider];
        (registered.constructor)(&spec)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

fn openai_compatible(spec: &ProviderSpec) -> Result<Arc<dyn ChatModel>> {
    let client = OpenAiCompatibleClient::new(
        spec.provider.clone(),
        spec.api_key()?,
        spec.base_url.clone(),
        spec.model_name.clone(),
        spec.temperature,
        spec.retry.clone(),
        spec.request_timeout,
    )?;
    Ok(Arc::new(client))
}

fn gemini(spec: &ProviderSpec) -> Result<Arc<dyn ChatModel>> {
    let client = GeminiClient::new(
        spec.api_key()?,
        spec.base_url.clone(),
        spec.model_name.clone(),
        spec.temperature,
        spec.retry.clone(),
        spec.request_timeout,
    )?;
    Ok(Arc::new(client))
}

/// Chooses the backend for a request: the shared default when no override
/// is given, otherwise a fresh instance for the requested provider/model.
pub struct ModelSelector {
    config: Arc<AppConfig>,
    registry: ProviderRegistry,
    default_model: Arc<dyn ChatModel>,
}

impl ModelSelector {
    /// Build the default backend from `settings.active_provider`
    pub fn from_config(config: Arc<AppConfig>, registry: ProviderRegistry) -> Result<Self> {
        let default_model = registry.build(&config, &config.settings.active_provider, None)?;
        info!(
            "Default LLM backend: {} ({})",
            default_model.provider(),
            default_model.model()
        );
        Ok(Self {
            config,
            registry,
            default_model,
        })
    }

    pub fn with_default(
        config: Arc<AppConfig>,
        registry: ProviderRegistry,
        default_model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            config,
            registry,
            default_model,
        }
    }

    pub fn default_model(&self) -> Arc<dyn ChatModel> {
        Arc::clone(&self.default_model)
    }

    pub fn select(&self, provider: Option<&str>, model: Option<&str>) -> Result<Arc<dyn ChatModel>> {
        match (provider, model) {
            (None, None) => Ok(self.default_model()),
            (provider, model) => {
                let provider = provider.unwrap_or(&self.config.settings.active_provider);
                info!(
                    "Building one-off LLM backend: {} ({})",
                    provider,
                    model.unwrap_or("default model")
                );
                self.registry.build(&self.config, provider, model)
            }
        }
    }
}
