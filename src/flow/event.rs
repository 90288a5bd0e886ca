//! Immutable trigger envelopes

use crate::flow::state::{State, ROUTE_METADATA_KEY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// An event emitted into the runner
///
/// Fields are private; once built an event is only ever read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    target: Option<String>,
    data: BTreeMap<String, Value>,
    metadata: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

impl Event {
    /// Create an event with a fresh id
    pub fn new(
        data: impl IntoIterator<Item = (String, Value)>,
        metadata: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: None,
            data: data.into_iter().collect(),
            metadata: metadata.into_iter().collect(),
            created_at: Utc::now(),
        }
    }

    /// Create an event addressed to a specific agent
    pub fn for_agent(
        target: impl Into<String>,
        data: impl IntoIterator<Item = (String, Value)>,
        metadata: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::new(data, metadata)
        }
    }

    /// Single-input convenience used by the CLI: `{input: text}` routed to `agent`
    pub fn with_input(input: impl Into<String>, agent: impl Into<String>) -> Self {
        Self::new(
            [("input".to_string(), Value::String(input.into()))],
            [(ROUTE_METADATA_KEY.to_string(), agent.into())],
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Routing hint for the first hop, if the producer set one
    pub fn route_hint(&self) -> Option<&str> {
        self.metadata
            .get(ROUTE_METADATA_KEY)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .or_else(|| self.target.as_deref())
    }

    /// Running state for the first hop: data fields plus non-routing metadata
    pub fn initial_state(&self) -> State {
        let mut state: State = self
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in &self.metadata {
            if key != ROUTE_METADATA_KEY {
                state.set_meta(key.clone(), value.clone());
            }
        }
        state
    }
}
