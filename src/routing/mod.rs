//! Routing between agents
//!
//! The [`Router`] trait turns each hop's output into a [`RoutingDecision`].
//! [`MetadataRouter`] is the default and follows the `route` directive.

pub mod router;

pub use router::{MetadataRouter, Router, RoutingDecision};
