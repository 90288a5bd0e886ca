//! agentflow - command line entry point
//!
//! Startup is an explicit phase: load config, build the model provider and
//! agents, then hand immutable handles to the runner.

use agentflow::agent::AgentRegistry;
use agentflow::config::FlowConfig;
use agentflow::flow::Event;
use agentflow::llm::ProviderFactory;
use agentflow::observability::init_default_logging;
use agentflow::runner::{RunOutcome, Runner, RunnerSettings};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_INPUT: &str = "Explain quantum computing in simple terms";
const DEFAULT_ROUTE: &str = "processor";
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["agentflow.toml", "config/agentflow.toml"];

/// Sequential multi-agent pipeline runner
#[derive(Parser)]
#[command(name = "agentflow")]
#[command(about = "Route one input through a chain of LLM-backed agents")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "AGENTFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit one event and print the final response
    Run {
        /// Input text for the first agent
        #[arg(long, default_value = DEFAULT_INPUT)]
        input: String,
        /// Agent that receives the event
        #[arg(long, default_value = DEFAULT_ROUTE)]
        route: String,
    },
    /// Validate configuration
    Config {
        /// Print the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_default_logging() {
        eprintln!("Failed to initialize logging: {e}");
    }

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { input, route } => run_flow(config, input, route).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: Option<&Path>,
) -> Result<FlowConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(FlowConfig::load_from_file(path)?);
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(FlowConfig::load_from_file(path)?);
        }
    }

    Err(format!(
        "no configuration file found; pass -c/--config or create {}",
        DEFAULT_CONFIG_PATHS.join(" or ")
    )
    .into())
}

/// Build the runner from configuration: provider, agents, settings
fn build_runner(config: &FlowConfig) -> Result<Runner, Box<dyn std::error::Error>> {
    let provider = ProviderFactory::create(&config.llm)?;
    let registry = AgentRegistry::from_config(config, provider)?;
    info!(flow = %config.flow.name, agents = ?registry.names(), "Agents registered");

    Ok(Runner::new(registry, RunnerSettings::from_config(config))?)
}

async fn run_flow(
    config: FlowConfig,
    input: String,
    route: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let runner = build_runner(&config)?;

    let ctx = CancellationToken::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, cancelling run");
            interrupt.cancel();
        }
    });

    runner.start(ctx).await?;

    let handle = runner.emit(Event::with_input(input, route)).await?;
    let outcome = handle.wait().await?;

    print_outcome(&outcome, runner.registry().len());
    runner.stop().await?;

    match &outcome.failure {
        None => Ok(()),
        Some(failure) => Err(format!(
            "run failed at agent '{}' ({}): {}",
            failure.agent.as_deref().unwrap_or("-"),
            failure.kind,
            failure.message
        )
        .into()),
    }
}

fn print_outcome(outcome: &RunOutcome, agents_registered: usize) {
    let response = outcome
        .state
        .get_text("final_response")
        .or_else(|| outcome.state.get_text("message"));

    println!("{}", "=".repeat(60));
    match response {
        Some(response) => {
            println!("Final response:\n");
            println!("{response}");
        }
        None => println!("No response produced"),
    }
    println!("{}", "=".repeat(60));
    println!("Execution stats:");
    println!("  agents registered: {agents_registered}");
    println!("  hops:              {}", outcome.hop_count());
    println!("  path:              {}", outcome.agents().join(" -> "));
    println!("  event id:          {}", outcome.event_id);
    println!("  duration:          {}ms", outcome.duration().as_millis());
    if let Some(failure) = &outcome.failure {
        println!("  failure:           {} ({})", failure.kind, failure.message);
    }
}

fn handle_config_command(
    config: &FlowConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!(flow = %config.flow.name, agents = config.agents.len(), "Configuration is valid");
    Ok(())
}
