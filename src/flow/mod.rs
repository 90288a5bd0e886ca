//! Events and state: the data that flows through a pipeline

pub mod event;
pub mod state;

pub use event::Event;
pub use state::{State, ROUTE_METADATA_KEY};
