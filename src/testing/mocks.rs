//! Mock implementations for testing
//!
//! `MockModelProvider` stands in for a real LLM backend; the stub agents make
//! chain behaviour observable through the `message` field.

use crate::agent::{Agent, RunContext, MESSAGE_KEY};
use crate::error::{AgentError, AgentResult};
use crate::flow::{Event, State};
use crate::llm::provider::{
    FinishReason, LlmError, ModelProvider, ModelResponse, Prompt, TokenUsage,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Scripted model provider
///
/// Cycles through its responses, or echoes the user prompt when built with
/// [`MockModelProvider::echo`]. Every prompt it receives is recorded.
#[derive(Debug, Clone, Default)]
pub struct MockModelProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub should_fail: bool,
    pub echo: bool,
    pub latency: Option<Duration>,
    pub prompts: Arc<Mutex<Vec<Prompt>>>,
}

impl MockModelProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Reply with the user prompt itself; lets the example run offline
    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Delay every reply
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Shared handle to the prompts received so far
    pub fn recorded_prompts(&self) -> Arc<Mutex<Vec<Prompt>>> {
        Arc::clone(&self.prompts)
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn call(&self, prompt: Prompt) -> Result<ModelResponse, LlmError> {
        self.prompts.lock().await.push(prompt.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let content = if self.echo {
            format!("[mock] {}", prompt.user)
        } else if self.responses.is_empty() {
            "Mock response".to_string()
        } else {
            let mut current = self.current_response.lock().await;
            let index = *current % self.responses.len();
            *current += 1;
            self.responses[index].clone()
        };

        Ok(ModelResponse {
            content,
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Deterministic agent that appends `:<name>` to `message`
///
/// Starts from `message`, falling back to `input`, in the state. Optionally
/// forwards to a fixed successor, insists on a state key being present, or
/// sleeps before answering.
#[derive(Debug, Clone)]
pub struct AppendAgent {
    name: String,
    next: Option<String>,
    required_key: Option<String>,
    delay: Option<Duration>,
    invocations: Arc<AtomicUsize>,
}

impl AppendAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next: None,
            required_key: None,
            delay: None,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Route to `next` after appending
    pub fn then(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    /// Fail with a validation error unless `key` is in the state
    pub fn requires(mut self, key: impl Into<String>) -> Self {
        self.required_key = Some(key.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Counter that stays readable after the agent moves into a registry
    pub fn invocation_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.invocations)
    }
}

#[async_trait]
impl Agent for AppendAgent {
    async fn run(&self, _ctx: &RunContext, _event: &Event, state: &State) -> AgentResult<State> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        if let Some(key) = &self.required_key {
            if !state.contains(key) {
                return Err(AgentError::validation(format!(
                    "agent '{}' requires state field '{key}'",
                    self.name
                )));
            }
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let base = state
            .get_text(MESSAGE_KEY)
            .or_else(|| state.get_text("input"))
            .ok_or_else(|| {
                AgentError::validation(format!("agent '{}' found no message or input", self.name))
            })?;

        let mut output = State::new();
        output.set(MESSAGE_KEY, format!("{base}:{}", self.name));
        if let Some(next) = &self.next {
            output.route_to(next.clone());
        }
        Ok(output)
    }
}

/// Agent that always fails with the configured error
#[derive(Debug, Clone)]
pub struct FailingAgent {
    validation: bool,
    message: String,
    invocations: Arc<AtomicUsize>,
}

impl FailingAgent {
    /// Fails as if its model provider had errored
    pub fn capability(message: impl Into<String>) -> Self {
        Self {
            validation: false,
            message: message.into(),
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fails as if its input were missing
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            validation: true,
            ..Self::capability(message)
        }
    }

    pub fn invocation_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.invocations)
    }
}

#[async_trait]
impl Agent for FailingAgent {
    async fn run(&self, _ctx: &RunContext, _event: &Event, _state: &State) -> AgentResult<State> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if self.validation {
            Err(AgentError::validation(self.message.clone()))
        } else {
            Err(AgentError::capability(self.message.clone()))
        }
    }
}
