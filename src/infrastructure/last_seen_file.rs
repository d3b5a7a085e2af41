// File-backed last-seen store (TOML, replaced atomically)
use crate::application::last_seen::{LastSeenStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct LastSeenState {
    #[serde(rename = "lastSystemSeen")]
    last_system_seen: DateTime<Utc>,
}

pub struct FileLastSeenStore {
    path: PathBuf,
}

impl FileLastSeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LastSeenStore for FileLastSeenStore {
    async fn load(&self) -> Option<DateTime<Utc>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", self.path.display(), e);
                return None;
            }
        };

        match toml::from_str::<LastSeenState>(&contents) {
            Ok(state) => Some(state.last_system_seen),
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {}", self.path.display(), e);
                None
            }
        }
    }

    async fn save(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let contents = toml::to_string(&LastSeenState {
            last_system_seen: at,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
