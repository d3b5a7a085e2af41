// In-memory collaborators for component tests
use crate::application::backend::{BackendError, Setting, TelemetryBackend};
use crate::application::clock::Clock;
use crate::application::last_seen::{LastSeenStore, StoreError};
use crate::domain::tag::{TagName, TelemetrySnapshot};
use crate::domain::telemetry::HistoryBatch;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct MemoryLastSeenStore {
    pub saved: Mutex<Option<DateTime<Utc>>>,
}

#[async_trait]
impl LastSeenStore for MemoryLastSeenStore {
    async fn load(&self) -> Option<DateTime<Utc>> {
        *self.saved.lock().unwrap()
    }

    async fn save(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        *self.saved.lock().unwrap() = Some(at);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryCall {
    pub tags: Vec<TagName>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Backend answering from queued responses. An empty live queue answers with a
/// timeout, an empty history queue with an empty batch.
#[derive(Default)]
pub struct ScriptedBackend {
    live: Mutex<VecDeque<Result<TelemetrySnapshot, BackendError>>>,
    history: Mutex<VecDeque<Result<HistoryBatch, BackendError>>>,
    writes: Mutex<VecDeque<Result<(), BackendError>>>,
    settings: Mutex<Option<Vec<Setting>>>,
    live_delay: Mutex<Option<std::time::Duration>>,
    history_delay: Mutex<Option<std::time::Duration>>,
    pub live_calls: AtomicUsize,
    pub history_calls: Mutex<Vec<HistoryCall>>,
    pub write_calls: Mutex<Vec<(TagName, f64)>>,
    pub settings_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_live(&self, response: Result<TelemetrySnapshot, BackendError>) {
        self.live.lock().unwrap().push_back(response);
    }

    pub fn push_history(&self, response: Result<HistoryBatch, BackendError>) {
        self.history.lock().unwrap().push_back(response);
    }

    pub fn push_write(&self, response: Result<(), BackendError>) {
        self.writes.lock().unwrap().push_back(response);
    }

    pub fn set_settings(&self, settings: Vec<Setting>) {
        *self.settings.lock().unwrap() = Some(settings);
    }

    pub fn set_live_delay(&self, delay: std::time::Duration) {
        *self.live_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_history_delay(&self, delay: std::time::Duration) {
        *self.history_delay.lock().unwrap() = Some(delay);
    }

    pub fn history_call_count(&self) -> usize {
        self.history_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TelemetryBackend for ScriptedBackend {
    async fn fetch_live(&self) -> Result<TelemetrySnapshot, BackendError> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.live_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.live
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::Timeout))
    }

    async fn query_history(
        &self,
        tags: &[TagName],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoryBatch, BackendError> {
        self.history_calls.lock().unwrap().push(HistoryCall {
            tags: tags.to_vec(),
            start,
            end,
        });
        let delay = *self.history_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.history
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HistoryBatch::new()))
    }

    async fn write_tag(&self, tag: &TagName, value: f64) -> Result<(), BackendError> {
        self.write_calls.lock().unwrap().push((tag.clone(), value));
        self.writes.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn fetch_settings(&self) -> Result<Vec<Setting>, BackendError> {
        self.settings_calls.fetch_add(1, Ordering::SeqCst);
        self.settings
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BackendError::Status {
                status: 503,
                body: "Database initializing...".to_string(),
            })
    }
}
