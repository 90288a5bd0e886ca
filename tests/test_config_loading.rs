//! Configuration loading and validation tests
//!
//! Loads flow files from disk and checks the errors a broken file produces.

use agentflow::config::{AgentRole, ConfigError, FlowConfig};
use agentflow::runner::RunnerSettings;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[flow]
name = "summaries"
default_agent = "summarizer"

[runner]
max_steps = 4
run_timeout_secs = 300

[llm]
provider = "anthropic"
model = "claude-3-5-haiku-20241022"
api_key_env = "ANTHROPIC_API_KEY"

[agents.summarizer]
role = "custom"
system_prompt = "You summarize text."
user_prompt = "Summarize: {input}"
input_keys = ["input"]
output_key = "summary"
next = "formatter"

[agents.formatter]
role = "formatter"
"#,
    );

    let config = FlowConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.flow.name, "summaries");
    assert_eq!(config.llm.provider, "anthropic");
    assert_eq!(config.runner.max_steps, 4);
    assert_eq!(config.runner.run_timeout(), Some(Duration::from_secs(300)));

    let summarizer = &config.agents["summarizer"];
    assert_eq!(summarizer.role, AgentRole::Custom);
    assert_eq!(summarizer.output_key.as_deref(), Some("summary"));
    assert_eq!(summarizer.input_keys.as_deref(), Some(&["input".to_string()][..]));
}

#[test]
fn test_runner_settings_follow_config() {
    let temp_file = write_config(
        r#"
[flow]
default_agent = "processor"

[runner]
max_steps = 3
queue_capacity = 5
max_concurrent_events = 2
hop_timeout_secs = 15
shutdown_grace_secs = 1

[llm]
provider = "mock"
"#,
    );

    let config = FlowConfig::load_from_file(temp_file.path()).unwrap();
    let settings = RunnerSettings::from_config(&config);

    assert_eq!(settings.max_steps, 3);
    assert_eq!(settings.queue_capacity, 5);
    assert_eq!(settings.max_concurrent_events, 2);
    assert_eq!(settings.hop_timeout, Some(Duration::from_secs(15)));
    assert_eq!(settings.run_timeout, None);
    assert_eq!(settings.shutdown_grace, Duration::from_secs(1));
    assert_eq!(settings.default_agent.as_deref(), Some("processor"));
}

#[test]
fn test_bundled_sample_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/agentflow.toml");

    let config = FlowConfig::load_from_file(&path).unwrap();

    assert_eq!(config.flow.default_agent.as_deref(), Some("processor"));
    assert_eq!(config.agents.len(), 3);
    assert_eq!(config.agents["enhancer"].next.as_deref(), Some("formatter"));
}

#[test]
fn test_missing_file_reports_read_error() {
    let result = FlowConfig::load_from_file(Path::new("/nonexistent/agentflow.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_reports_parse_error() {
    let temp_file = write_config("[llm\nprovider = ");

    let result = FlowConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_missing_llm_section_is_a_parse_error() {
    let temp_file = write_config("[flow]\nname = \"no-llm\"\n");

    let result = FlowConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_invalid_agent_name_rejected() {
    let temp_file = write_config(
        r#"
[llm]
provider = "mock"

[agents."bad agent"]
role = "processor"
"#,
    );

    let result = FlowConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidAgentName(_))));
}

#[test]
fn test_invalid_runner_bounds_rejected() {
    for field in ["max_steps", "queue_capacity", "max_concurrent_events"] {
        let temp_file = write_config(&format!(
            "[runner]\n{field} = 0\n\n[llm]\nprovider = \"mock\"\n"
        ));

        let result = FlowConfig::load_from_file(temp_file.path());
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(ref msg)) if msg.contains(field)),
            "{field}: {result:?}"
        );
    }
}

#[test]
fn test_config_round_trips_through_toml() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/agentflow.toml");
    let config = FlowConfig::load_from_file(&path).unwrap();

    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed = FlowConfig::from_toml_str(&rendered).unwrap();

    assert_eq!(config, reparsed);
}
