//! The runner: lifecycle, queueing and the per-event hop loop
//!
//! Distinct events run concurrently on their own tasks; hops within one event
//! run strictly in order. Every accepted event resolves its [`RunHandle`]
//! with a [`RunOutcome`], whether it completed, failed, or was still queued
//! when the runner stopped.

mod chain;
pub mod engine;
pub mod events;
pub mod outcome;
pub mod settings;

pub use engine::{Runner, RunnerState};
pub use events::RunEvent;
pub use outcome::{HopRecord, RunFailure, RunHandle, RunOutcome, RunStatus};
pub use settings::RunnerSettings;
