//! Configuration for agentflow
//!
//! A flow file wires named agents into a chain, selects the model provider and
//! sets the runner's safety bounds. Secrets never live in the file: the LLM
//! API key is read from the environment variable named by `api_key_env`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main flow configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowConfig {
    #[serde(default)]
    pub flow: FlowSection,
    #[serde(default)]
    pub runner: RunnerSection,
    pub llm: LlmSection,
    /// Agent wiring, keyed by agent name
    #[serde(default)]
    pub agents: BTreeMap<String, AgentSpec>,
}

/// Flow identity and entry point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowSection {
    #[serde(default = "default_flow_name")]
    pub name: String,
    /// Agent used when an event carries no routing hint
    pub default_agent: Option<String>,
}

impl Default for FlowSection {
    fn default() -> Self {
        Self {
            name: default_flow_name(),
            default_agent: None,
        }
    }
}

fn default_flow_name() -> String {
    "agentflow".to_string()
}

/// Runner safety bounds and capacity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerSection {
    /// Maximum hops a single event may take
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Bounded queue between `emit` and the dispatcher
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Events processed in parallel
    #[serde(default = "default_max_concurrent_events")]
    pub max_concurrent_events: usize,
    /// Per-hop wall clock limit
    pub hop_timeout_secs: Option<u64>,
    /// Whole-chain wall clock limit
    pub run_timeout_secs: Option<u64>,
    /// How long `stop` waits for in-flight hops before cancelling them
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            queue_capacity: default_queue_capacity(),
            max_concurrent_events: default_max_concurrent_events(),
            hop_timeout_secs: None,
            run_timeout_secs: None,
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_max_steps() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    100
}

fn default_max_concurrent_events() -> usize {
    8
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

/// LLM provider selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name ("openai", "anthropic", "mock")
    pub provider: String,
    /// Model identifier
    #[serde(default)]
    pub model: String,
    /// Environment variable containing the API key
    pub api_key_env: Option<String>,
    /// Override for the provider's API base URL
    pub base_url: Option<String>,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional max tokens
    pub max_tokens: Option<u32>,
    /// HTTP timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_timeout_secs() -> u64 {
    60
}

/// Built-in agent behaviours
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Processor,
    Enhancer,
    Formatter,
    Custom,
}

/// One configured agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSpec {
    pub role: AgentRole,
    /// Agent that receives this agent's output (none ends the chain)
    pub next: Option<String>,
    /// Overrides the role's system prompt (required for `custom`)
    pub system_prompt: Option<String>,
    /// Overrides the role's user prompt; `{input}` is replaced by the input value
    pub user_prompt: Option<String>,
    /// State keys tried in order for the agent's input
    pub input_keys: Option<Vec<String>>,
    /// State key receiving the model response
    pub output_key: Option<String>,
}

impl AgentSpec {
    pub fn with_role(role: AgentRole, next: Option<&str>) -> Self {
        Self {
            role,
            next: next.map(str::to_string),
            system_prompt: None,
            user_prompt: None,
            input_keys: None,
            output_key: None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid agent name: {0}")]
    InvalidAgentName(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RunnerSection {
    /// Validate runner bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps == 0 {
            return Err(ConfigError::InvalidConfig(
                "runner.max_steps must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "runner.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_events == 0 {
            return Err(ConfigError::InvalidConfig(
                "runner.max_concurrent_events must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn hop_timeout(&self) -> Option<Duration> {
        self.hop_timeout_secs.map(Duration::from_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl FlowConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: FlowConfig = toml::from_str(content)?;

        if config.agents.is_empty() {
            config.agents = default_agent_chain();
            if config.flow.default_agent.is_none() {
                config.flow.default_agent = Some("processor".to_string());
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check agent names, wiring references and runner bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.runner.validate()?;

        if self.agents.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "at least one agent must be configured".to_string(),
            ));
        }

        for (name, spec) in &self.agents {
            validate_agent_name(name)?;

            if let Some(next) = &spec.next {
                if !self.agents.contains_key(next) {
                    return Err(ConfigError::InvalidConfig(format!(
                        "agent '{name}' routes to unknown agent '{next}'"
                    )));
                }
            }

            if spec.role == AgentRole::Custom && spec.system_prompt.is_none() {
                return Err(ConfigError::InvalidConfig(format!(
                    "custom agent '{name}' requires system_prompt"
                )));
            }
        }

        if let Some(default_agent) = &self.flow.default_agent {
            if !self.agents.contains_key(default_agent) {
                return Err(ConfigError::InvalidConfig(format!(
                    "default_agent '{default_agent}' is not a configured agent"
                )));
            }
        }

        if self.llm.provider != "mock" && self.llm.api_key_env.is_none() {
            return Err(ConfigError::InvalidConfig(format!(
                "llm.api_key_env is required for provider '{}'",
                self.llm.provider
            )));
        }

        Ok(())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        self.llm.api_key()
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[flow]
name = "test-flow"

[llm]
provider = "mock"
"#;
        Self::from_toml_str(toml_content).expect("Test config should parse")
    }
}

impl LlmSection {
    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, ConfigError> {
        let env_var_name = self.api_key_env.as_deref().ok_or_else(|| {
            ConfigError::InvalidConfig(format!(
                "llm.api_key_env is not set for provider '{}'",
                self.provider
            ))
        })?;
        FlowConfig::get_env_var_required(env_var_name)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The processor -> enhancer -> formatter chain used when no agents are configured
pub fn default_agent_chain() -> BTreeMap<String, AgentSpec> {
    let mut agents = BTreeMap::new();
    agents.insert(
        "processor".to_string(),
        AgentSpec::with_role(AgentRole::Processor, Some("enhancer")),
    );
    agents.insert(
        "enhancer".to_string(),
        AgentSpec::with_role(AgentRole::Enhancer, Some("formatter")),
    );
    agents.insert(
        "formatter".to_string(),
        AgentSpec::with_role(AgentRole::Formatter, None),
    );
    agents
}

/// Validate agent name format ([a-zA-Z0-9._-]+)
pub fn validate_agent_name(name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if name.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidAgentName(format!(
            "Agent name '{name}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
