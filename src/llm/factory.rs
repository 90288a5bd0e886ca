//! Provider factory for creating model providers from configuration

use crate::config::{ConfigError, LlmSection};
use crate::llm::provider::ModelProvider;
use crate::llm::providers::{AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider};
use crate::testing::mocks::MockModelProvider;
use std::sync::Arc;
use tracing::info;

pub struct ProviderFactory;

impl ProviderFactory {
    /// Build the provider named in `[llm]`, resolving its API key from the environment
    pub fn create(llm: &LlmSection) -> Result<Arc<dyn ModelProvider>, ConfigError> {
        let provider: Arc<dyn ModelProvider> = match llm.provider.as_str() {
            "openai" => {
                let defaults = OpenAiConfig::default();
                let config = OpenAiConfig {
                    api_key: llm.api_key()?,
                    base_url: llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout: llm.timeout(),
                    model: non_empty_or(&llm.model, defaults.model),
                    temperature: llm.temperature,
                    max_tokens: llm.max_tokens,
                };
                Arc::new(OpenAiProvider::new(config).map_err(provider_error)?)
            }
            "anthropic" => {
                let defaults = AnthropicConfig::default();
                let config = AnthropicConfig {
                    api_key: llm.api_key()?,
                    base_url: llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout: llm.timeout(),
                    version: defaults.version,
                    model: non_empty_or(&llm.model, defaults.model),
                    temperature: llm.temperature,
                    max_tokens: llm.max_tokens,
                };
                Arc::new(AnthropicProvider::new(config).map_err(provider_error)?)
            }
            "mock" => Arc::new(MockModelProvider::echo()),
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "Unsupported LLM provider: {other}"
                )))
            }
        };

        info!(provider = provider.name(), model = %llm.model, "Model provider initialized");
        Ok(provider)
    }
}

fn non_empty_or(value: &str, fallback: String) -> String {
    if value.trim().is_empty() {
        fallback
    } else {
        value.to_string()
    }
}

fn provider_error(error: crate::llm::provider::LlmError) -> ConfigError {
    ConfigError::InvalidConfig(error.to_string())
}
