//! Model provider implementations
//!
//! This module contains concrete implementations of the ModelProvider trait
//! for different LLM services.

pub mod anthropic;
pub mod openai;

pub use anthropic::*;
pub use openai::*;
