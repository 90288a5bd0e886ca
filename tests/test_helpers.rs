//! Test helpers and utilities for integration tests

use agentflow::agent::AgentRegistry;
use agentflow::flow::{Event, ROUTE_METADATA_KEY};
use agentflow::runner::{Runner, RunnerSettings};
use agentflow::testing::AppendAgent;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// processor -> enhancer -> formatter, each appending its name to `message`
#[allow(dead_code)]
pub fn append_chain() -> AgentRegistry {
    AgentRegistry::new()
        .with_agent("processor", AppendAgent::new("processor").then("enhancer"))
        .unwrap()
        .with_agent("enhancer", AppendAgent::new("enhancer").then("formatter"))
        .unwrap()
        .with_agent("formatter", AppendAgent::new("formatter"))
        .unwrap()
}

/// `{data: {input}, metadata: {route}}`
#[allow(dead_code)]
pub fn routed_event(input: &str, route: &str) -> Event {
    Event::new(
        [("input".to_string(), Value::from(input))],
        [(ROUTE_METADATA_KEY.to_string(), route.to_string())],
    )
}

/// Build and start a runner with a fresh cancellation context
#[allow(dead_code)]
pub async fn started_runner(registry: AgentRegistry, settings: RunnerSettings) -> Runner {
    let runner = Runner::new(registry, settings).unwrap();
    runner.start(CancellationToken::new()).await.unwrap();
    runner
}

/// Minimal valid flow file using the offline provider
#[allow(dead_code)]
pub const MOCK_FLOW_TOML: &str = r#"
[flow]
name = "test-flow"

[llm]
provider = "mock"
"#;
