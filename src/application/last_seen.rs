// Durable storage seam for the last confirmed-reachable instant
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access last-seen state: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode last-seen state: {0}")]
    Encode(#[from] toml::ser::Error),
}

#[async_trait]
pub trait LastSeenStore: Send + Sync {
    /// Read the persisted instant. Missing or unreadable state yields `None`.
    async fn load(&self) -> Option<DateTime<Utc>>;

    async fn save(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}
