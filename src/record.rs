// src/record.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type TagMap = BTreeMap<String, String>;

/// Tag map shared between records until one of them changes it.
///
/// Fragments produced by the splitter hold the same `Arc`; the first write
/// through [`Record::tags_mut`] gives that fragment its own copy.
pub type Tags = Arc<TagMap>;

/// Record payload - either text (what the pipeline works on) or anything else
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Text content, split and parsed by the rules
    Text(String),
    /// Any other value; passed through untouched or dropped
    Structured(serde_json::Value),
}

impl Payload {
    /// Create a text payload
    pub fn text(content: impl Into<String>) -> Self {
        Payload::Text(content.into())
    }

    /// Create a non-text payload
    pub fn structured(data: serde_json::Value) -> Self {
        Payload::Structured(data)
    }

    /// Check if this is a text payload
    pub fn is_text(&self) -> bool {
        matches!(self, Payload::Text(_))
    }

    /// Get text content if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Text(s) => f.write_str(s),
            Payload::Structured(v) => write!(f, "{}", v),
        }
    }
}

/// One telemetry data point. Only `data` and `tags` are looked at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub namespace: Vec<String>,
    #[serde(default)]
    pub version: i64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Tags,
    pub data: Payload,
}

impl Record {
    pub fn new<I, S>(namespace: I, data: Payload) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Record {
            namespace: namespace.into_iter().map(Into::into).collect(),
            version: 0,
            timestamp: Utc::now(),
            unit: String::new(),
            description: String::new(),
            tags: Tags::default(),
            data,
        }
    }

    pub fn with_tags(mut self, tags: TagMap) -> Self {
        self.tags = Arc::new(tags);
        self
    }

    /// Namespace joined the way it is shown in logs: `/a/b/c`
    pub fn namespace_string(&self) -> String {
        format!("/{}", self.namespace.join("/"))
    }

    /// Same record, different payload. Tags stay shared.
    pub fn with_payload(&self, data: Payload) -> Self {
        Record {
            namespace: self.namespace.clone(),
            version: self.version,
            timestamp: self.timestamp,
            unit: self.unit.clone(),
            description: self.description.clone(),
            tags: Arc::clone(&self.tags),
            data,
        }
    }

    /// Writable tags. Detaches from any sibling sharing the same map.
    pub fn tags_mut(&mut self) -> &mut TagMap {
        Arc::make_mut(&mut self.tags)
    }

    /// Whether two records still point at the same tag map
    pub fn shares_tags_with(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.tags, &other.tags)
    }
}
