//! agentflow - a minimal sequential multi-agent pipeline engine
//!
//! One event is routed through a chain of named agents. Each agent returns an
//! output [`State`](flow::State); a [`Router`](routing::Router) reads the
//! routing directive the agent wrote and decides which agent runs next. The
//! [`Runner`](runner::Runner) owns the lifecycle, the bounded queue, the
//! per-event hop loop and its safety limits.
//!
//! # Overview
//!
//! - [`flow`]: events and the state threaded between hops
//! - [`agent`]: the `Agent` trait, the registry and LLM-backed prompt agents
//! - [`routing`]: routing decisions
//! - [`runner`]: lifecycle, dispatch and run outcomes
//! - [`llm`]: model provider trait and HTTP adapters
//! - [`config`]: TOML flow configuration
//!
//! # Quick Start
//!
//! ```rust
//! use agentflow::agent::AgentRegistry;
//! use agentflow::flow::Event;
//! use agentflow::runner::{Runner, RunnerSettings};
//! use agentflow::testing::AppendAgent;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let registry = AgentRegistry::new()
//!     .with_agent("processor", AppendAgent::new("processor").then("formatter"))?
//!     .with_agent("formatter", AppendAgent::new("formatter"))?;
//!
//! let runner = Runner::new(registry, RunnerSettings::default())?;
//! runner.start(CancellationToken::new()).await?;
//!
//! let outcome = runner.emit(Event::with_input("X", "processor")).await?.wait().await?;
//! assert_eq!(outcome.state.get_text("message").as_deref(), Some("X:processor:formatter"));
//!
//! runner.stop().await?;
//! # Ok::<(), agentflow::AgentError>(())
//! # }).unwrap();
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod flow;
pub mod llm;
pub mod observability;
pub mod routing;
pub mod runner;
pub mod testing;

pub use agent::{Agent, AgentRegistry, RunContext};
pub use config::{ConfigError, FlowConfig};
pub use error::{AgentError, AgentResult, ErrorKind};
pub use flow::{Event, State, ROUTE_METADATA_KEY};
pub use routing::{MetadataRouter, Router, RoutingDecision};
pub use runner::{RunHandle, RunOutcome, RunStatus, Runner, RunnerSettings, RunnerState};
