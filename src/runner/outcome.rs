//! What an event's chain produced, and the handle used to wait for it

use crate::error::{AgentError, AgentResult, ErrorKind};
use crate::flow::State;
use crate::routing::RoutingDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Terminal status of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// One successfully executed hop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopRecord {
    /// 1-based position in the chain
    pub hop: usize,
    pub agent: String,
    pub duration_ms: u64,
    pub decision: RoutingDecision,
}

/// Why a chain ended early
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Agent the failure is attributed to; `None` if no agent was reached
    pub agent: Option<String>,
    /// Hop that failed, if one was running
    pub hop: Option<usize>,
    pub kind: ErrorKind,
    /// Sanitized error message
    pub message: String,
}

impl RunFailure {
    pub fn new(agent: Option<String>, hop: Option<usize>, error: &AgentError) -> Self {
        Self {
            agent,
            hop,
            kind: error.kind(),
            message: error.sanitized_message(),
        }
    }
}

/// Final report for one emitted event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub event_id: Uuid,
    pub status: RunStatus,
    /// Accumulated state; on failure, the state as of the last completed hop
    pub state: State,
    pub hops: Vec<HopRecord>,
    pub failure: Option<RunFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Agents in the order they completed
    pub fn agents(&self) -> Vec<&str> {
        self.hops.iter().map(|hop| hop.agent.as_str()).collect()
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|failure| failure.kind)
    }
}

/// Completion future for an emitted event
#[derive(Debug)]
pub struct RunHandle {
    event_id: Uuid,
    receiver: oneshot::Receiver<RunOutcome>,
}

impl RunHandle {
    pub(crate) fn new(event_id: Uuid, receiver: oneshot::Receiver<RunOutcome>) -> Self {
        Self { event_id, receiver }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Wait for the event's chain to finish
    pub async fn wait(self) -> AgentResult<RunOutcome> {
        self.receiver.await.map_err(|_| {
            AgentError::internal_error(format!(
                "run for event {} ended without reporting an outcome",
                self.event_id
            ))
        })
    }
}
