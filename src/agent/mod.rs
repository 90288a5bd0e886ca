//! Agents: the units of work an event is routed through
//!
//! An agent sees the triggering event and a read-only view of the running
//! state, and returns its own output state. It influences control flow only
//! by writing the routing directive into that output; the runner merges the
//! output and asks the router where to go next.

pub mod context;
pub mod prompt_agent;
pub mod registry;

pub use context::RunContext;
pub use prompt_agent::{PromptAgent, PromptTemplate, MESSAGE_KEY};
pub use registry::AgentRegistry;

use crate::error::AgentResult;
use crate::flow::{Event, State};
use async_trait::async_trait;

/// A named transformation step in a chain
///
/// Implementations must not retain the state they are handed; the runner owns
/// it. Return a `Validation` error when required input is missing and a
/// `Capability` error when an external call fails. Neither is retried.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, ctx: &RunContext, event: &Event, state: &State) -> AgentResult<State>;
}
