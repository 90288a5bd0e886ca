//! Per-hop execution context handed to every agent

use crate::error::{AgentError, AgentResult};
use crate::llm::provider::{ModelProvider, ModelResponse, Prompt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity of the hop being executed plus its cancellation signal
#[derive(Debug, Clone)]
pub struct RunContext {
    event_id: Uuid,
    agent: String,
    hop: usize,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        event_id: Uuid,
        agent: impl Into<String>,
        hop: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            event_id,
            agent: agent.into(),
            hop,
            cancel,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Name of the agent this context was built for
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// 1-based hop number within the event's chain
    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Call the model provider, aborting the request if the run is cancelled
    pub async fn call_model(
        &self,
        provider: &dyn ModelProvider,
        prompt: Prompt,
    ) -> AgentResult<ModelResponse> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            result = provider.call(prompt) => result.map_err(AgentError::from),
        }
    }
}
