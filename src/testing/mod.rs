//! Testing utilities and mock implementations
//!
//! Stub agents and a scripted model provider so chains can be exercised
//! without network access.

pub mod mocks;

pub use mocks::*;
