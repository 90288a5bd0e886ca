//! Runner tuning knobs

use crate::config::{ConfigError, FlowConfig};
use std::time::Duration;

/// Capacity of the [`crate::runner::RunEvent`] broadcast channel
const DEFAULT_EVENT_BUFFER: usize = 256;

/// Bounds and capacities for a [`crate::runner::Runner`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    /// Maximum hops per event before the chain fails with a routing loop
    pub max_steps: usize,
    pub queue_capacity: usize,
    pub max_concurrent_events: usize,
    pub hop_timeout: Option<Duration>,
    pub run_timeout: Option<Duration>,
    /// How long `stop` lets in-flight hops finish before cancelling them
    pub shutdown_grace: Duration,
    /// First agent for events without a route hint or target
    pub default_agent: Option<String>,
    pub event_buffer: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_steps: 10,
            queue_capacity: 100,
            max_concurrent_events: 8,
            hop_timeout: None,
            run_timeout: None,
            shutdown_grace: Duration::from_secs(10),
            default_agent: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl RunnerSettings {
    /// Settings from the `[runner]` and `[flow]` sections
    pub fn from_config(config: &FlowConfig) -> Self {
        let runner = &config.runner;
        Self {
            max_steps: runner.max_steps,
            queue_capacity: runner.queue_capacity,
            max_concurrent_events: runner.max_concurrent_events,
            hop_timeout: runner.hop_timeout(),
            run_timeout: runner.run_timeout(),
            shutdown_grace: runner.shutdown_grace(),
            default_agent: config.flow.default_agent.clone(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_default_agent(mut self, agent: impl Into<String>) -> Self {
        self.default_agent = Some(agent.into());
        self
    }

    pub fn with_hop_timeout(mut self, timeout: Duration) -> Self {
        self.hop_timeout = Some(timeout);
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_max_concurrent_events(mut self, limit: usize) -> Self {
        self.max_concurrent_events = limit;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = [
            ("max_steps", self.max_steps),
            ("queue_capacity", self.queue_capacity),
            ("max_concurrent_events", self.max_concurrent_events),
            ("event_buffer", self.event_buffer),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero {
            Some((name, _)) => Err(ConfigError::InvalidConfig(format!(
                "runner {name} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}
