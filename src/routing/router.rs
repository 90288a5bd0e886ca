//! Router trait and decision types
//!
//! Routing is separated from agent work: an agent only writes the routing
//! directive into its output, and the router turns that output into an
//! explicit [`RoutingDecision`]. The runner acts on the decision and never
//! looks at the directive itself.
//!
//! # Example
//!
//! ```rust
//! use agentflow::flow::State;
//! use agentflow::routing::{MetadataRouter, Router, RoutingDecision};
//!
//! # tokio_test::block_on(async {
//! let mut output = State::new();
//! output.set("message", "X:processor");
//! output.route_to("enhancer");
//!
//! let decision = MetadataRouter.decide("processor", &output).await.unwrap();
//! assert_eq!(decision.next_agent(), Some("enhancer"));
//! # });
//! ```

use crate::error::AgentResult;
use crate::flow::{State, ROUTE_METADATA_KEY};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Decides what happens after an agent's hop
///
/// Called once per hop with the output state the agent returned (before it
/// is merged). Returning an error fails the event's chain; it is reported
/// against the agent that just ran.
#[async_trait]
pub trait Router: Send + Sync {
    async fn decide(&self, current_agent: &str, output: &State) -> AgentResult<RoutingDecision>;
}

/// Routing decision made by a Router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// The chain ends here
    Complete,
    /// Run `next_agent` next
    Forward { next_agent: String },
}

impl RoutingDecision {
    pub fn forward(next_agent: impl Into<String>) -> Self {
        RoutingDecision::Forward {
            next_agent: next_agent.into(),
        }
    }

    /// Check if this decision ends the chain
    pub fn is_complete(&self) -> bool {
        matches!(self, RoutingDecision::Complete)
    }

    /// Check if this decision forwards to another agent
    pub fn is_forward(&self) -> bool {
        matches!(self, RoutingDecision::Forward { .. })
    }

    /// Extract next agent name if this is a Forward decision
    pub fn next_agent(&self) -> Option<&str> {
        match self {
            RoutingDecision::Forward { next_agent } => Some(next_agent),
            RoutingDecision::Complete => None,
        }
    }
}

/// Default router: follows the `route` metadata written by the agent
///
/// A present, non-blank directive forwards to the named agent; anything else
/// completes the chain. Whether the named agent exists is the runner's
/// concern.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataRouter;

impl MetadataRouter {
    /// Synchronous form of [`Router::decide`]
    pub fn route(output: &State) -> RoutingDecision {
        match output
            .get_meta(ROUTE_METADATA_KEY)
            .map(str::trim)
            .filter(|next| !next.is_empty())
        {
            Some(next) => RoutingDecision::forward(next),
            None => RoutingDecision::Complete,
        }
    }
}

#[async_trait]
impl Router for MetadataRouter {
    async fn decide(&self, _current_agent: &str, output: &State) -> AgentResult<RoutingDecision> {
        Ok(Self::route(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_decision() {
        let decision = RoutingDecision::Complete;

        assert!(decision.is_complete());
        assert!(!decision.is_forward());
        assert!(decision.next_agent().is_none());
    }

    #[test]
    fn test_forward_decision() {
        let decision = RoutingDecision::forward("formatter");

        assert!(!decision.is_complete());
        assert!(decision.is_forward());
        assert_eq!(decision.next_agent(), Some("formatter"));
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_value(RoutingDecision::forward("enhancer")).unwrap();
        assert_eq!(json["type"], "forward");
        assert_eq!(json["next_agent"], "enhancer");
    }

    #[tokio::test]
    async fn test_metadata_router_forwards() {
        let mut output = State::new();
        output.route_to("enhancer");

        let decision = MetadataRouter.decide("processor", &output).await.unwrap();
        assert_eq!(decision, RoutingDecision::forward("enhancer"));
    }

    #[tokio::test]
    async fn test_metadata_router_trims_directive() {
        let mut output = State::new();
        output.route_to("  formatter \n");

        let decision = MetadataRouter.decide("enhancer", &output).await.unwrap();
        assert_eq!(decision.next_agent(), Some("formatter"));
    }

    #[tokio::test]
    async fn test_missing_or_blank_directive_completes() {
        let decision = MetadataRouter
            .decide("formatter", &State::new())
            .await
            .unwrap();
        assert!(decision.is_complete());

        let mut blank = State::new();
        blank.route_to("   ");
        assert!(MetadataRouter::route(&blank).is_complete());
    }

    #[test]
    fn test_other_metadata_is_ignored() {
        let mut output = State::new();
        output.set_meta("next", "enhancer");
        output.set("route", "enhancer");
        assert!(MetadataRouter::route(&output).is_complete());
    }
}
