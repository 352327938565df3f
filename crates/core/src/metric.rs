use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Normalized telemetry record handed to the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Metric {
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A serialized record addressed to a bus topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl WriterMessage {
    /// Serialize a metric as JSON for the given topic.
    pub fn from_metric(topic: impl Into<String>, metric: &Metric) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic: topic.into(),
            payload: serde_json::to_vec(metric)?,
        })
    }
}
