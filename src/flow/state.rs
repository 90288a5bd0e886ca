//! Event-scoped state threaded through agent hops

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reserved metadata key naming the next agent
pub const ROUTE_METADATA_KEY: &str = "route";

/// Data fields plus string metadata carried between agents
///
/// Keys are kept ordered so that two states with the same content compare,
/// serialize and print identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    fields: BTreeMap<String, Value>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String view of a field; non-string values are rendered as JSON
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get_meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn remove_meta(&mut self, key: &str) -> Option<String> {
        self.metadata.remove(key)
    }

    /// Write the routing directive for the next hop
    pub fn route_to(&mut self, agent: impl Into<String>) {
        self.set_meta(ROUTE_METADATA_KEY, agent);
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.metadata.is_empty()
    }

    /// Fold another state into this one, last write wins
    ///
    /// The routing directive is scoped to a single hop and is never carried
    /// over into the accumulated state.
    pub fn merge(&mut self, other: State) {
        self.fields.extend(other.fields);
        self.metadata.extend(
            other
                .metadata
                .into_iter()
                .filter(|(key, _)| key != ROUTE_METADATA_KEY),
        );
    }
}

impl FromIterator<(String, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            metadata: BTreeMap::new(),
        }
    }
}
