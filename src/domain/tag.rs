// Tag identifiers and live snapshot values
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("tag name is empty")]
    Empty,
    #[error("tag name {0:?} contains characters outside [A-Za-z0-9_.-]")]
    InvalidCharacters(String),
}

/// Validated telemetry point identifier such as `A25_Speed` or `VT001.Scaled`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    pub fn new(name: impl Into<String>) -> Result<Self, TagError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TagError::Empty);
        }
        let valid = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !valid {
            return Err(TagError::InvalidCharacters(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TagName {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TagName {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TagName> for String {
    fn from(tag: TagName) -> Self {
        tag.0
    }
}

/// Current value of a tag as reported by the live endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TagValue {
    Numeric(f64),
    Boolean(bool),
    /// The controller could not read the tag (reported as an error string) or the
    /// payload held something that is neither a number nor a boolean.
    Unavailable,
}

impl TagValue {
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => TagValue::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(v) if v.is_finite() => TagValue::Numeric(v),
                _ => TagValue::Unavailable,
            },
            _ => TagValue::Unavailable,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// Link state between the backend and the controller, as reported in the live payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerLink {
    Initializing,
    Connected,
    Disconnected,
    NoTagsConfigured,
    Other(String),
}

impl ControllerLink {
    fn parse(status: &str) -> Self {
        match status {
            "initializing" => ControllerLink::Initializing,
            "connected" => ControllerLink::Connected,
            "disconnected" => ControllerLink::Disconnected,
            "no_tags_configured" => ControllerLink::NoTagsConfigured,
            other => ControllerLink::Other(other.to_string()),
        }
    }
}

/// Wire shape of the live endpoint: `{"status": "...", "tags": {name: value}}`.
#[derive(Debug, Deserialize)]
pub struct LivePayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,
}

/// Point-in-time view of every tag, replaced wholesale on each successful probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub link: ControllerLink,
    pub tags: BTreeMap<TagName, TagValue>,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            link: ControllerLink::Initializing,
            tags: BTreeMap::new(),
        }
    }
}

impl TelemetrySnapshot {
    pub fn from_payload(payload: LivePayload) -> Self {
        let link = payload
            .status
            .as_deref()
            .map(ControllerLink::parse)
            .unwrap_or(ControllerLink::Initializing);

        let tags = payload
            .tags
            .iter()
            .filter_map(|(name, value)| match TagName::new(name.as_str()) {
                Ok(tag) => Some((tag, TagValue::from_json(value))),
                Err(e) => {
                    tracing::debug!("Ignoring live tag: {}", e);
                    None
                }
            })
            .collect();

        Self { link, tags }
    }

    pub fn get(&self, tag: &TagName) -> Option<&TagValue> {
        self.tags.get(tag)
    }

    pub fn numeric(&self, tag: &TagName) -> Option<f64> {
        self.get(tag).and_then(TagValue::as_f64)
    }
}
