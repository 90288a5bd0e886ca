//! Model provider abstraction layer
//!
//! Agents talk to language models through the [`ModelProvider`] trait; the
//! [`ProviderFactory`] turns the `[llm]` config section into a shared handle.

pub mod factory;
pub mod provider;
pub mod providers;

pub use factory::ProviderFactory;
pub use provider::*;
pub use providers::*;
