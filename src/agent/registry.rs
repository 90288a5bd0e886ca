//! Name -> agent lookup, fixed before the runner starts

use crate::agent::prompt_agent::PromptAgent;
use crate::agent::Agent;
use crate::config::{validate_agent_name, ConfigError, FlowConfig};
use crate::error::{AgentError, AgentResult};
use crate::llm::provider::ModelProvider;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registered agents keyed by routing name
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under a routing name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        agent: impl Agent + 'static,
    ) -> AgentResult<()> {
        self.register_shared(name, Arc::new(agent))
    }

    /// Register an already shared agent
    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> AgentResult<()> {
        let name = name.into();
        validate_agent_name(&name)?;

        if self.agents.contains_key(&name) {
            return Err(ConfigError::InvalidConfig(format!(
                "agent '{name}' is already registered"
            ))
            .into());
        }

        self.agents.insert(name, agent);
        Ok(())
    }

    /// Builder-style registration
    pub fn with_agent(
        mut self,
        name: impl Into<String>,
        agent: impl Agent + 'static,
    ) -> AgentResult<Self> {
        self.register(name, agent)?;
        Ok(self)
    }

    /// Look up an agent, failing closed on unknown names
    pub fn get(&self, name: &str) -> AgentResult<Arc<dyn Agent>> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::unknown_agent(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Build one prompt agent per configured `[agents.<name>]` entry
    pub fn from_config(config: &FlowConfig, provider: Arc<dyn ModelProvider>) -> AgentResult<Self> {
        let mut registry = Self::new();
        for (name, spec) in &config.agents {
            let agent = PromptAgent::from_spec(name, spec, provider.clone())?;
            registry.register(name.clone(), agent)?;
        }
        Ok(registry)
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}
