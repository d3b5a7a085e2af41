// Command service - Write commands and operator settings, gated by connectivity
use crate::application::backend::{BackendError, Setting, SettingValue, TelemetryBackend};
use crate::application::connectivity::ConnectivityGate;
use crate::domain::chart::ChartCatalog;
use crate::domain::tag::TagName;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("tag {0} is not writable")]
    NotWritable(TagName),
    #[error("backend is offline")]
    Offline,
    #[error("invalid value for {tag}: {value}")]
    InvalidValue { tag: TagName, value: f64 },
    #[error("no numeric setpoint configured for '{0}'")]
    MissingSetpoint(String),
    #[error("write rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("session rejected by backend")]
    Unauthorized,
    #[error(transparent)]
    Backend(BackendError),
}

impl From<BackendError> for CommandError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unauthorized => CommandError::Unauthorized,
            BackendError::Status { status, body } => CommandError::Rejected {
                status,
                message: body,
            },
            other => CommandError::Backend(other),
        }
    }
}

pub struct CommandService {
    backend: Arc<dyn TelemetryBackend>,
    catalog: Arc<ChartCatalog>,
    gate: ConnectivityGate,
}

impl CommandService {
    pub fn new(
        backend: Arc<dyn TelemetryBackend>,
        catalog: Arc<ChartCatalog>,
        gate: ConnectivityGate,
    ) -> Self {
        Self {
            backend,
            catalog,
            gate,
        }
    }

    pub async fn write(&self, tag: &TagName, value: f64) -> Result<(), CommandError> {
        if !self.catalog.is_writable(tag) {
            return Err(CommandError::NotWritable(tag.clone()));
        }
        if !value.is_finite() {
            return Err(CommandError::InvalidValue {
                tag: tag.clone(),
                value,
            });
        }
        if self.gate.is_offline() {
            return Err(CommandError::Offline);
        }

        self.backend.write_tag(tag, value).await?;
        tracing::info!("Wrote {} = {}", tag, value);
        Ok(())
    }

    pub async fn load_settings(&self) -> Result<Vec<Setting>, CommandError> {
        if self.gate.is_offline() {
            return Err(CommandError::Offline);
        }
        Ok(self.backend.fetch_settings().await?)
    }

    /// Send the stored setpoint for `key` (e.g. `charge`) to its simulation tag.
    pub async fn send_setpoint(&self, key: &str) -> Result<(TagName, f64), CommandError> {
        let tag = self
            .catalog
            .setpoint_tag(key)
            .ok_or_else(|| CommandError::MissingSetpoint(key.to_string()))?;

        let settings = self.load_settings().await?;
        let value = settings
            .iter()
            .find(|s| s.key == key)
            .and_then(|s| match &s.value {
                SettingValue::Number(n) => Some(*n),
                SettingValue::Text(t) => t.trim().parse::<f64>().ok(),
            })
            .ok_or_else(|| CommandError::MissingSetpoint(key.to_string()))?;

        self.write(&tag, value).await?;
        Ok((tag, value))
    }
}
