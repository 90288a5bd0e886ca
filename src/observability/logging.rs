//! Structured logging system using tracing crate
//!
//! Logs always go to stderr so that the final response printed by the CLI is
//! the only thing on stdout.
//!
//! ## Log Format Options
//!
//! The `LOG_FORMAT` environment variable selects one of:
//!
//! - `json` - Structured JSON format for log aggregation
//! - `pretty` - Human-readable format with colors and indentation
//! - `compact` - Terminal-friendly format with colors but minimal spacing
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE) - defaults to INFO
//! - `LOG_FORMAT`: Output format (json, pretty, compact) - defaults to json
//! - `LOG_SPANS`: Include span open/close events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering (follows env_logger format)
//!
//! ## Examples
//!
//! ```bash
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG agentflow run --input "hello"
//! RUST_LOG=agentflow::runner=trace agentflow run
//! ```

use std::env;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Dependencies that are noisy at INFO
const QUIET_TARGETS: &str = "hyper=warn,h2=warn,reqwest=warn,rustls=warn,tokio=warn";

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string; unknown values fall back to JSON
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

fn parse_level(value: &str) -> Level {
    match value.to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

fn parse_flag(value: &str) -> bool {
    value.to_lowercase() == "true"
}

fn span_events(include_spans: bool) -> FmtSpan {
    if include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn build_filter(level: Level) -> EnvFilter {
    match env::var("RUST_LOG") {
        Ok(rust_log) => EnvFilter::new(rust_log),
        Err(_) => EnvFilter::new(format!("{level},{QUIET_TARGETS}")),
    }
}

/// Install the global subscriber
///
/// Fails if a subscriber has already been installed (tests install their own).
pub fn init_logging(
    level: Level,
    format: LogFormat,
    include_spans: bool,
) -> Result<(), TryInitError> {
    let subscriber = tracing_subscriber::registry().with(build_filter(level));

    match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(span_events(include_spans));
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_ansi(true)
                .with_writer(std::io::stderr)
                .with_span_events(span_events(include_spans));
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_ansi(true)
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_span_events(span_events(include_spans));
            subscriber.with(fmt_layer).try_init()
        }
    }
}

/// Initialize logging from `LOG_LEVEL`, `LOG_FORMAT` and `LOG_SPANS`
pub fn init_default_logging() -> Result<(), TryInitError> {
    let level = parse_level(&env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()));
    let format = LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()));
    let include_spans = parse_flag(&env::var("LOG_SPANS").unwrap_or_default());

    init_logging(level, format, include_spans)
}

/// Span covering one event's whole chain
#[macro_export]
macro_rules! run_span {
    ($($field:tt)*) => {
        tracing::info_span!("event_run", $($field)*)
    };
}

/// Span covering a single agent invocation
#[macro_export]
macro_rules! hop_span {
    ($($field:tt)*) => {
        tracing::info_span!("agent_hop", $($field)*)
    };
}

pub use {hop_span, run_span};
