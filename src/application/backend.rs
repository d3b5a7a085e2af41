// Backend trait for live values, historian queries and write commands
use crate::domain::tag::{TagName, TelemetrySnapshot};
use crate::domain::telemetry::HistoryBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,
    /// The bearer credential was rejected; the session owner has been notified.
    #[error("session rejected by backend")]
    Unauthorized,
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("historian query failed: {0}")]
    Query(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Number(f64),
    Text(String),
}

/// Operator-configurable setting, e.g. a setpoint for the next charge command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: SettingValue,
}

#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    /// Fetch the current value of every tag (liveness probe)
    async fn fetch_live(&self) -> Result<TelemetrySnapshot, BackendError>;

    /// Query raw historian samples for `tags` in `[start, end]`
    async fn query_history(
        &self,
        tags: &[TagName],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoryBatch, BackendError>;

    /// Send a write command for a single tag
    async fn write_tag(&self, tag: &TagName, value: f64) -> Result<(), BackendError>;

    /// Load the operator settings
    async fn fetch_settings(&self) -> Result<Vec<Setting>, BackendError>;
}
