//! Model provider abstraction and trait definitions
//!
//! Agents depend only on the narrow [`ModelProvider`] contract: send a
//! system/user prompt pair, receive text back. Concrete HTTP backends live in
//! [`crate::llm::providers`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Message roles in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Prompt sent by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Chat-style message list for providers that take one
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if !self.system.is_empty() {
            messages.push(Message {
                role: MessageRole::System,
                content: self.system.clone(),
            });
        }
        messages.push(Message {
            role: MessageRole::User,
            content: self.user.clone(),
        });
        messages
    }
}

/// Model reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason why completion finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// Model provider trait for dependency injection and testing
///
/// Implementations must be cancel-safe: the runner drops the `call` future
/// when a run is cancelled.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Get the provider name (e.g., "openai", "anthropic")
    fn name(&self) -> &str;

    /// Send a prompt and wait for the model's reply
    async fn call(&self, prompt: Prompt) -> Result<ModelResponse, LlmError>;

    /// Check if the provider is configured and ready
    async fn health_check(&self) -> Result<(), LlmError>;
}

/// Model provider errors
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
}
