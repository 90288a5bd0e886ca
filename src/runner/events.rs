//! Progress notifications broadcast while chains execute

use crate::error::ErrorKind;
use crate::routing::RoutingDecision;
use crate::runner::outcome::RunStatus;
use serde::Serialize;
use uuid::Uuid;

/// Observable step in an event's chain
///
/// Delivered on a bounded broadcast channel; slow subscribers miss events
/// rather than slowing the runner down.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    HopStarted {
        event_id: Uuid,
        agent: String,
        hop: usize,
    },
    HopCompleted {
        event_id: Uuid,
        agent: String,
        hop: usize,
        duration_ms: u64,
        decision: RoutingDecision,
    },
    HopFailed {
        event_id: Uuid,
        agent: String,
        hop: usize,
        kind: ErrorKind,
        message: String,
    },
    RunFinished {
        event_id: Uuid,
        status: RunStatus,
        hops: usize,
        failure: Option<ErrorKind>,
    },
}

impl RunEvent {
    pub fn event_id(&self) -> Uuid {
        match self {
            RunEvent::HopStarted { event_id, .. }
            | RunEvent::HopCompleted { event_id, .. }
            | RunEvent::HopFailed { event_id, .. }
            | RunEvent::RunFinished { event_id, .. } => *event_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::RunFinished { .. })
    }
}
