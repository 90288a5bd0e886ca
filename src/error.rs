//! Error types for the agentflow pipeline engine
//!
//! Every failure an agent or the runner can produce maps to exactly one
//! [`ErrorKind`], which is what run outcomes and observers report.

use crate::llm::provider::LlmError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a sanitized failure message
const MAX_REPORTED_MESSAGE_LEN: usize = 500;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("path pattern is valid")
});

/// Classification tag attached to every reported failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Capability,
    RoutingLoop,
    NotRunning,
    UnknownAgent,
    Timeout,
    Cancelled,
    RunnerStopped,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Capability => "capability",
            ErrorKind::RoutingLoop => "routing_loop",
            ErrorKind::NotRunning => "not_running",
            ErrorKind::UnknownAgent => "unknown_agent",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::RunnerStopped => "runner_stopped",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for agents and the runner
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Capability call failed: {message}")]
    Capability { message: String },

    #[error("Routing loop detected: chain reached {steps} hops (limit {max})")]
    RoutingLoop { steps: usize, max: usize },

    #[error("Runner is not running (state: {state})")]
    NotRunning { state: String },

    #[error("Unknown agent: {name}")]
    UnknownAgent { name: String },

    #[error("Timed out: {message}")]
    Timeout { message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Runner stopped before the chain finished")]
    RunnerStopped,

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AgentError {
    /// The reporting tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Validation { .. } => ErrorKind::Validation,
            AgentError::Capability { .. } => ErrorKind::Capability,
            AgentError::RoutingLoop { .. } => ErrorKind::RoutingLoop,
            AgentError::NotRunning { .. } => ErrorKind::NotRunning,
            AgentError::UnknownAgent { .. } => ErrorKind::UnknownAgent,
            AgentError::Timeout { .. } => ErrorKind::Timeout,
            AgentError::Cancelled => ErrorKind::Cancelled,
            AgentError::RunnerStopped => ErrorKind::RunnerStopped,
            AgentError::Config(_) => ErrorKind::Config,
            AgentError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Rendered message with secrets redacted, safe to hand to observers
    pub fn sanitized_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }

    /// Create validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create capability error
    pub fn capability<S: Into<String>>(message: S) -> Self {
        Self::Capability {
            message: message.into(),
        }
    }

    /// Create routing loop error
    pub fn routing_loop(steps: usize, max: usize) -> Self {
        Self::RoutingLoop { steps, max }
    }

    /// Create not-running error
    pub fn not_running<S: Into<String>>(state: S) -> Self {
        Self::NotRunning {
            state: state.into(),
        }
    }

    /// Create unknown agent error
    pub fn unknown_agent<S: Into<String>>(name: S) -> Self {
        Self::UnknownAgent { name: name.into() }
    }

    /// Create timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<LlmError> for AgentError {
    fn from(error: LlmError) -> Self {
        Self::capability(error.to_string())
    }
}

/// Redact secrets and sensitive paths, cap the length
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_REPORTED_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_REPORTED_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for agent and runner operations
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(AgentError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(AgentError::capability("x").kind(), ErrorKind::Capability);
        assert_eq!(AgentError::routing_loop(11, 10).kind(), ErrorKind::RoutingLoop);
        assert_eq!(AgentError::not_running("idle").kind(), ErrorKind::NotRunning);
        assert_eq!(AgentError::unknown_agent("x").kind(), ErrorKind::UnknownAgent);
        assert_eq!(AgentError::timeout("hop").kind(), ErrorKind::Timeout);
        assert_eq!(AgentError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(AgentError::RunnerStopped.kind(), ErrorKind::RunnerStopped);
        assert_eq!(AgentError::internal_error("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_llm_error_becomes_capability_error() {
        let error: AgentError = LlmError::RateLimitExceeded("slow down".to_string()).into();
        assert_eq!(error.kind(), ErrorKind::Capability);
        assert!(error.to_string().contains("slow down"));
    }

    #[test]
    fn test_routing_loop_message() {
        let error = AgentError::routing_loop(10, 10);
        assert!(error.to_string().contains("10 hops"));
        assert!(error.to_string().contains("limit 10"));
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::RoutingLoop).unwrap();
        assert_eq!(json, "\"routing_loop\"");
        assert_eq!(ErrorKind::RunnerStopped.to_string(), "runner_stopped");
    }

    #[test]
    fn test_sanitized_message_redacts_secrets() {
        let error =
            AgentError::capability("Failed to authenticate: password=secret123 token=abc456");
        let message = error.sanitized_message();

        assert!(!message.contains("secret123"));
        assert!(!message.contains("abc456"));
        assert!(message.contains("password=***"));
        assert!(message.contains("token=***"));
    }

    #[test]
    fn test_long_message_truncation() {
        let sanitized = sanitize_error_message(&"x".repeat(600));

        assert!(sanitized.len() <= 500);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let sanitized = sanitize_error_message(&"é".repeat(400));
        assert!(sanitized.len() <= 500);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_sanitize_exactly_500_chars() {
        let sanitized = sanitize_error_message(&"x".repeat(500));
        assert_eq!(sanitized.len(), 500);
        assert!(!sanitized.contains("truncated"));
    }

    #[test]
    fn test_file_path_redaction() {
        let sanitized = sanitize_error_message(
            "Failed to read /home/user/.ssh/id_rsa and /home/user/.aws/credentials",
        );

        assert!(sanitized.contains("/***REDACTED***/"));
        assert!(!sanitized.contains("/home/user/.ssh/id_rsa"));
        assert!(!sanitized.contains(".aws/credentials"));
    }

    #[test]
    fn test_sanitize_case_insensitive() {
        let sanitized = sanitize_error_message("PASSWORD=secret123 Token=abc Key=xyz");

        assert!(!sanitized.contains("secret123"));
        assert!(!sanitized.contains("abc"));
        assert!(!sanitized.contains("xyz"));
    }

    #[test]
    fn test_sanitize_empty_message() {
        assert_eq!(sanitize_error_message(""), "");
    }
}
