//! Observability: structured logging and runner metrics

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{MetricsSnapshot, RunnerMetrics};

// Span macros for structured logging
pub use logging::{hop_span, run_span};
