//! Anthropic provider implementation
//!
//! Messages API; the prompt's system text goes in the top-level `system`
//! field rather than the message list.

use crate::llm::provider::{
    FinishReason, LlmError, ModelProvider, ModelResponse, Prompt, TokenUsage,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Anthropic provider configuration
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub version: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            timeout: Duration::from_secs(60),
            version: "2023-06-01".to_string(),
            model: "claude-3-5-haiku-20241022".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Anthropic provider implementation
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::NotConfigured(
                "Anthropic API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, prompt: &Prompt) -> AnthropicCompletionRequest {
        AnthropicCompletionRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens.unwrap_or(4096),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.user.clone(),
            }],
            system: (!prompt.system.is_empty()).then(|| prompt.system.clone()),
            temperature: self.config.temperature,
        }
    }

    async fn send(
        &self,
        request: &AnthropicCompletionRequest,
    ) -> Result<reqwest::Response, LlmError> {
        self.client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.version)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn call(&self, prompt: Prompt) -> Result<ModelResponse, LlmError> {
        let anthropic_request = self.build_request(&prompt);
        debug!(model = %anthropic_request.model, "Anthropic request");

        let response = self.send(&anthropic_request).await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = format!("Anthropic API error: {status} - {error_text}");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LlmError::AuthenticationFailed(message)
                }
                StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded(message),
                _ => LlmError::ApiError(message),
            });
        }

        let anthropic_response: AnthropicCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if anthropic_response.content.is_empty() {
            return Err(LlmError::InvalidResponse(
                "No content returned from Anthropic".to_string(),
            ));
        }

        let content = anthropic_response
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = TokenUsage {
            prompt_tokens: anthropic_response.usage.input_tokens,
            completion_tokens: anthropic_response.usage.output_tokens,
            total_tokens: anthropic_response.usage.input_tokens
                + anthropic_response.usage.output_tokens,
        };

        Ok(ModelResponse {
            content,
            model: anthropic_response.model,
            usage,
            finish_reason: convert_finish_reason(anthropic_response.stop_reason.as_deref()),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        // No dedicated health endpoint, so send a one-token request
        let test_request = AnthropicCompletionRequest {
            max_tokens: 1,
            ..self.build_request(&Prompt::new("", "Hi"))
        };

        let response = self.send(&test_request).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::AuthenticationFailed(
                "Anthropic API authentication failed".to_string(),
            ))
        }
    }
}

/// Convert Anthropic stop reason to internal format
fn convert_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Error,
    }
}

#[derive(Debug, Serialize)]
struct AnthropicCompletionRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicCompletionResponse {
    content: Vec<AnthropicContent>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
