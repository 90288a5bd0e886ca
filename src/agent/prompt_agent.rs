//! LLM-backed agents: processor, enhancer, formatter and custom prompts
//!
//! A prompt agent reads one input value from the running state (or the
//! event), asks the model provider to transform it, and writes the reply to
//! its output key and to `message`. If the agent is wired to a successor it
//! sets the routing directive on its output.

use crate::agent::context::RunContext;
use crate::agent::Agent;
use crate::config::{AgentRole, AgentSpec, ConfigError};
use crate::error::{AgentError, AgentResult};
use crate::flow::{Event, State};
use crate::llm::provider::{ModelProvider, Prompt};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Placeholder replaced by the agent's input value in user prompts
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Field every prompt agent mirrors its reply into
pub const MESSAGE_KEY: &str = "message";

/// Prompts and state keys that define what a prompt agent does
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub system_prompt: String,
    pub user_prompt: String,
    pub input_keys: Vec<String>,
    pub output_key: String,
}

impl PromptTemplate {
    /// Preset for a built-in role; `Custom` has no preset
    pub fn for_role(role: AgentRole) -> Option<Self> {
        let (system_prompt, user_prompt, input_keys, output_key): (&str, &str, &[&str], &str) =
            match role {
                AgentRole::Processor => (
                    "You are a processor agent. Extract and organize key information from user requests.",
                    "Process this request and extract key information: {input}",
                    &["input"],
                    "processed",
                ),
                AgentRole::Enhancer => (
                    "You are an enhancer agent. Add insights, context, and additional valuable information.",
                    "Enhance this response with additional insights: {input}",
                    &["processed", MESSAGE_KEY],
                    "enhanced",
                ),
                AgentRole::Formatter => (
                    "You are a formatter agent. Present information in a clear, professional, and well-structured manner.",
                    "Format this response in a clear, professional manner: {input}",
                    &["enhanced", MESSAGE_KEY],
                    "final_response",
                ),
                AgentRole::Custom => return None,
            };

        Some(Self {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            input_keys: input_keys.iter().map(|k| k.to_string()).collect(),
            output_key: output_key.to_string(),
        })
    }

    /// Role preset with any overrides from the agent's config entry applied
    pub fn from_spec(name: &str, spec: &AgentSpec) -> Result<Self, ConfigError> {
        let base = Self::for_role(spec.role).unwrap_or_else(|| Self {
            system_prompt: String::new(),
            user_prompt: INPUT_PLACEHOLDER.to_string(),
            input_keys: vec![MESSAGE_KEY.to_string(), "input".to_string()],
            output_key: name.to_string(),
        });

        let template = Self {
            system_prompt: spec.system_prompt.clone().unwrap_or(base.system_prompt),
            user_prompt: spec.user_prompt.clone().unwrap_or(base.user_prompt),
            input_keys: spec.input_keys.clone().unwrap_or(base.input_keys),
            output_key: spec.output_key.clone().unwrap_or(base.output_key),
        };

        if template.system_prompt.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "agent '{name}' has an empty system prompt"
            )));
        }
        if template.input_keys.is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "agent '{name}' needs at least one input key"
            )));
        }

        Ok(template)
    }

    /// Render the user prompt for an input value
    pub fn render(&self, input: &str) -> Prompt {
        let user = if self.user_prompt.contains(INPUT_PLACEHOLDER) {
            self.user_prompt.replace(INPUT_PLACEHOLDER, input)
        } else {
            format!("{}\n\n{}", self.user_prompt, input)
        };
        Prompt::new(self.system_prompt.clone(), user)
    }
}

/// Agent that transforms one state value through the model provider
pub struct PromptAgent {
    name: String,
    template: PromptTemplate,
    next: Option<String>,
    provider: Arc<dyn ModelProvider>,
}

impl PromptAgent {
    pub fn new(
        name: impl Into<String>,
        template: PromptTemplate,
        next: Option<String>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            template,
            next,
            provider,
        }
    }

    /// Build from a `[agents.<name>]` config entry
    pub fn from_spec(
        name: &str,
        spec: &AgentSpec,
        provider: Arc<dyn ModelProvider>,
    ) -> Result<Self, ConfigError> {
        let template = PromptTemplate::from_spec(name, spec)?;
        Ok(Self::new(name, template, spec.next.clone(), provider))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn next(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// First configured input key present in the state, then in the event data
    ///
    /// Under the runner the state already holds every event data field; the
    /// event fallback serves direct `run` calls with an empty state.
    fn resolve_input(&self, event: &Event, state: &State) -> AgentResult<String> {
        for key in &self.template.input_keys {
            if let Some(text) = state.get_text(key) {
                return Ok(text);
            }
        }
        for key in &self.template.input_keys {
            if let Some(value) = event.data().get(key) {
                return Ok(match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            }
        }

        Err(AgentError::validation(format!(
            "agent '{}' found none of the input keys [{}]",
            self.name,
            self.template.input_keys.join(", ")
        )))
    }
}

#[async_trait]
impl Agent for PromptAgent {
    async fn run(&self, ctx: &RunContext, event: &Event, state: &State) -> AgentResult<State> {
        let input = self.resolve_input(event, state)?;
        let prompt = self.template.render(&input);

        debug!(
            event_id = %ctx.event_id(),
            agent = %self.name,
            provider = self.provider.name(),
            input_len = input.len(),
            "Calling model provider"
        );

        let response = ctx.call_model(self.provider.as_ref(), prompt).await?;

        let mut output = State::new();
        output.set(self.template.output_key.clone(), response.content.clone());
        output.set(MESSAGE_KEY, response.content.clone());

        match &self.next {
            Some(next) => output.route_to(next.clone()),
            None => info!(
                event_id = %ctx.event_id(),
                agent = %self.name,
                response_len = response.content.len(),
                "Final response produced"
            ),
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::flow::ROUTE_METADATA_KEY;
    use crate::testing::mocks::MockModelProvider;
    use tokio_util::sync::CancellationToken;

    fn ctx(agent: &str) -> RunContext {
        RunContext::new(uuid::Uuid::new_v4(), agent, 1, CancellationToken::new())
    }

    fn agent(role: AgentRole, next: Option<&str>, provider: MockModelProvider) -> PromptAgent {
        let name = format!("{role:?}").to_lowercase();
        PromptAgent::from_spec(&name, &AgentSpec::with_role(role, next), Arc::new(provider))
            .unwrap()
    }

    #[tokio::test]
    async fn test_processor_reads_event_input_and_routes() {
        let provider = MockModelProvider::single_response("key facts");
        let calls = provider.recorded_prompts();
        let processor = agent(AgentRole::Processor, Some("enhancer"), provider);

        let event = Event::with_input("Explain quantum computing", "processor");
        let output = processor
            .run(&ctx("processor"), &event, &State::new())
            .await
            .unwrap();

        assert_eq!(output.get_text("processed").as_deref(), Some("key facts"));
        assert_eq!(output.get_text(MESSAGE_KEY).as_deref(), Some("key facts"));
        assert_eq!(output.get_meta(ROUTE_METADATA_KEY), Some("enhancer"));

        let prompts = calls.lock().await;
        assert!(prompts[0].user.ends_with("Explain quantum computing"));
        assert!(prompts[0].system.starts_with("You are a processor agent"));
    }

    #[tokio::test]
    async fn test_enhancer_falls_back_to_message() {
        let enhancer = agent(
            AgentRole::Enhancer,
            Some("formatter"),
            MockModelProvider::single_response("enhanced text"),
        );

        let mut state = State::new();
        state.set(MESSAGE_KEY, "plain text");

        let output = enhancer
            .run(&ctx("enhancer"), &Event::new([], []), &state)
            .await
            .unwrap();
        assert_eq!(output.get_text("enhanced").as_deref(), Some("enhanced text"));
    }

    #[tokio::test]
    async fn test_formatter_ends_chain() {
        let formatter = agent(
            AgentRole::Formatter,
            None,
            MockModelProvider::single_response("final"),
        );

        let mut state = State::new();
        state.set("enhanced", "draft");

        let output = formatter
            .run(&ctx("formatter"), &Event::new([], []), &state)
            .await
            .unwrap();
        assert_eq!(output.get_text("final_response").as_deref(), Some("final"));
        assert!(output.get_meta(ROUTE_METADATA_KEY).is_none());
    }

    #[tokio::test]
    async fn test_missing_input_is_validation_error() {
        let enhancer = agent(
            AgentRole::Enhancer,
            None,
            MockModelProvider::single_response("unused"),
        );

        let error = enhancer
            .run(&ctx("enhancer"), &Event::new([], []), &State::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(error.to_string().contains("processed"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_capability_error() {
        let processor = agent(AgentRole::Processor, None, MockModelProvider::with_failure());

        let error = processor
            .run(&ctx("processor"), &Event::with_input("x", "processor"), &State::new())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Capability);
    }

    #[test]
    fn test_custom_template_overrides() {
        let spec = AgentSpec {
            system_prompt: Some("You summarize.".to_string()),
            user_prompt: Some("Summarize: {input}".to_string()),
            ..AgentSpec::with_role(AgentRole::Custom, None)
        };

        let template = PromptTemplate::from_spec("summarizer", &spec).unwrap();
        assert_eq!(template.output_key, "summarizer");
        assert_eq!(template.render("text").user, "Summarize: text");
    }

    #[test]
    fn test_custom_template_requires_system_prompt() {
        let spec = AgentSpec::with_role(AgentRole::Custom, None);
        assert!(PromptTemplate::from_spec("summarizer", &spec).is_err());
    }

    #[test]
    fn test_render_without_placeholder_appends_input() {
        let template = PromptTemplate {
            system_prompt: "sys".to_string(),
            user_prompt: "Review the following".to_string(),
            input_keys: vec!["message".to_string()],
            output_key: "review".to_string(),
        };
        assert_eq!(template.render("abc").user, "Review the following\n\nabc");
    }
}
