//! OpenAI provider implementation
//!
//! Chat completions API with bearer authentication. Network failures and 5xx
//! responses are retried with a short fixed backoff; client errors are not.

use crate::llm::provider::{
    FinishReason, LlmError, Message, MessageRole, ModelProvider, ModelResponse, Prompt, TokenUsage,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

/// OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
            model: "gpt-4o-mini".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// OpenAI provider implementation
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::NotConfigured(
                "OpenAI API key is required".to_string(),
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

    /// Build the wire request for a prompt (pure function)
    fn build_request(&self, prompt: &Prompt) -> OpenAiCompletionRequest {
        OpenAiCompletionRequest {
            model: self.config.model.clone(),
            messages: prompt.to_messages().iter().map(convert_message).collect(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Parse OpenAI completion response (pure function)
    fn parse_completion_response(
        openai_response: OpenAiCompletionResponse,
    ) -> Result<ModelResponse, LlmError> {
        let choice = openai_response.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("No choices returned from OpenAI".to_string())
        })?;

        let usage = openai_response
            .usage
            .map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            })
            .unwrap_or_default();

        Ok(ModelResponse {
            content: choice.message.content.unwrap_or_default(),
            model: openai_response.model,
            usage,
            finish_reason: convert_finish_reason(choice.finish_reason.as_deref()),
        })
    }

    /// Retry orchestrator - handles only I/O and retry logic
    async fn complete_with_retry(
        &self,
        openai_request: &OpenAiCompletionRequest,
    ) -> Result<ModelResponse, LlmError> {
        let backoff_delays = [100u64, 200, 300];
        let mut last_error = None;

        for (attempt, &delay_ms) in std::iter::once(&0u64)
            .chain(backoff_delays.iter())
            .enumerate()
        {
            if attempt > 0 {
                debug!(attempt, delay_ms, "OpenAI retry attempt");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.make_api_request(openai_request).await {
                Ok(openai_response) => {
                    if attempt > 0 {
                        debug!("OpenAI request succeeded after {} retries", attempt);
                    }
                    let response = Self::parse_completion_response(openai_response)?;
                    debug!(
                        total_tokens = response.usage.total_tokens,
                        finish_reason = ?response.finish_reason,
                        "OpenAI response received"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!("OpenAI request attempt {} failed: {}", attempt + 1, e);
                    if !should_retry(&e) {
                        error!("Non-retryable OpenAI error, aborting: {}", e);
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        error!("OpenAI request failed after all retries");
        Err(last_error
            .unwrap_or_else(|| LlmError::NetworkError("All retry attempts failed".to_string())))
    }

    /// Make single API request
    async fn make_api_request(
        &self,
        openai_request: &OpenAiCompletionRequest,
    ) -> Result<OpenAiCompletionResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(openai_request)
            .send()
            .await
            .map_err(|e| {
                LlmError::NetworkError(format!(
                    "HTTP request failed: {} (is_connect: {}, is_timeout: {})",
                    e,
                    e.is_connect(),
                    e.is_timeout()
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn call(&self, prompt: Prompt) -> Result<ModelResponse, LlmError> {
        let openai_request = self.build_request(&prompt);
        debug!(
            model = %openai_request.model,
            messages = openai_request.messages.len(),
            "OpenAI request"
        );
        self.complete_with_retry(&openai_request).await
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/models", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::AuthenticationFailed(
                "OpenAI API authentication failed".to_string(),
            ))
        }
    }
}

/// Map a non-success status to a provider error (pure)
fn map_status_error(status: StatusCode, body: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::AuthenticationFailed(format!("OpenAI API error: {status} - {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            LlmError::RateLimitExceeded(format!("OpenAI API error: {status} - {body}"))
        }
        s if s.is_server_error() => {
            LlmError::ApiError(format!("OpenAI API server error: {status} - {body}"))
        }
        _ => LlmError::ApiError(format!("OpenAI API error: {status} - {body}")),
    }
}

/// Check if error should trigger retry (pure)
fn should_retry(error: &LlmError) -> bool {
    match error {
        LlmError::NetworkError(_) => true,
        LlmError::ApiError(msg) => msg.contains("server error"),
        _ => false,
    }
}

/// Convert OpenAI finish reason to internal format (pure function)
fn convert_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Error,
    }
}

/// Convert internal message to OpenAI format
fn convert_message(message: &Message) -> OpenAiMessage {
    OpenAiMessage {
        role: match message.role {
            MessageRole::System => "system".to_string(),
            MessageRole::User => "user".to_string(),
            MessageRole::Assistant => "assistant".to_string(),
        },
        content: Some(message.content.clone()),
    }
}

#[derive(Debug, Serialize)]
struct OpenAiCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletionResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
