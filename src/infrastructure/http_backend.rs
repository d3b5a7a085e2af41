// HTTP backend client for the flywheel API
use crate::application::backend::{BackendError, Setting, TelemetryBackend};
use crate::application::session::{Credentials, SessionEvent, SessionEvents};
use crate::domain::tag::{LivePayload, TagName, TelemetrySnapshot};
use crate::domain::telemetry::{HistoryBatch, RawSample, format_timestamp};
use crate::infrastructure::config::BackendSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct WriteTagRequest<'a> {
    tag_name: &'a str,
    value: f64,
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    live_path: String,
    historian_path: String,
    write_path: String,
    settings_path: String,
    api_key: Option<String>,
    credentials: Credentials,
    events: SessionEvents,
}

impl HttpBackend {
    pub fn new(
        settings: &BackendSettings,
        credentials: Credentials,
        events: SessionEvents,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            live_path: settings.live_path.clone(),
            historian_path: settings.historian_path.clone(),
            write_path: settings.write_path.clone(),
            settings_path: settings.settings_path.clone(),
            api_key: settings.api_key.clone(),
            credentials,
            events,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_live_url(&self, now: DateTime<Utc>) -> String {
        // Cache buster so intermediaries never answer a heartbeat from cache.
        format!("{}?_={}", self.url(&self.live_path), now.timestamp_millis())
    }

    fn build_history_url(
        &self,
        tags: &[TagName],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        let mut query: Vec<String> = tags
            .iter()
            .map(|t| format!("tags={}", urlencoding::encode(t.as_str())))
            .collect();
        query.push(format!(
            "start_time={}",
            urlencoding::encode(&format_timestamp(&start))
        ));
        query.push(format!(
            "end_time={}",
            urlencoding::encode(&format_timestamp(&end))
        ));
        format!("{}?{}", self.url(&self.historian_path), query.join("&"))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Accept", "application/json");
        let request = match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        };
        match self.credentials.bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = self.authorize(request).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.events.publish(SessionEvent::Invalidated);
            return Err(BackendError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: detail_message(&body),
            });
        }
        Ok(response)
    }

    async fn json(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value, BackendError> {
        self.send(request)
            .await?
            .json::<serde_json::Value>()
            .await
            .map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_decode() {
        BackendError::Decode(e.to_string())
    } else {
        BackendError::Transport(e.to_string())
    }
}

/// Error bodies are usually `{"detail": "..."}`; fall back to the raw text.
fn detail_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn parse_history(value: serde_json::Value) -> Result<HistoryBatch, BackendError> {
    if let Some(error) = value.get("error") {
        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return Err(BackendError::Query(message));
    }

    let raw: HashMap<String, serde_json::Value> =
        serde_json::from_value(value).map_err(|e| BackendError::Decode(e.to_string()))?;

    let mut batch = HistoryBatch::new();
    for (name, series) in raw {
        let tag = match TagName::new(name) {
            Ok(tag) => tag,
            Err(e) => {
                tracing::debug!("Ignoring historian series: {}", e);
                continue;
            }
        };
        batch.insert(tag, parse_series(series));
    }
    Ok(batch)
}

/// Decode one tag's samples, dropping entries of the wrong shape. A series that is
/// not an array yields no samples.
fn parse_series(series: serde_json::Value) -> Vec<RawSample> {
    let serde_json::Value::Array(entries) = series else {
        tracing::debug!("Ignoring non-array historian series: {}", series);
        return Vec::new();
    };
    entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RawSample>(entry).ok())
        .collect()
}

#[async_trait]
impl TelemetryBackend for HttpBackend {
    async fn fetch_live(&self) -> Result<TelemetrySnapshot, BackendError> {
        let url = self.build_live_url(Utc::now());
        let value = self.json(self.client.get(&url)).await?;
        let payload: LivePayload =
            serde_json::from_value(value).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(TelemetrySnapshot::from_payload(payload))
    }

    async fn query_history(
        &self,
        tags: &[TagName],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoryBatch, BackendError> {
        let url = self.build_history_url(tags, start, end);
        tracing::debug!("Historian query: {}", url);
        let value = self.json(self.client.get(&url)).await?;
        parse_history(value)
    }

    async fn write_tag(&self, tag: &TagName, value: f64) -> Result<(), BackendError> {
        let body = WriteTagRequest {
            tag_name: tag.as_str(),
            value,
        };
        self.send(self.client.post(self.url(&self.write_path)).json(&body))
            .await?;
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<Vec<Setting>, BackendError> {
        let value = self
            .json(self.client.get(self.url(&self.settings_path)))
            .await?;
        serde_json::from_value(value).map_err(|e| BackendError::Decode(e.to_string()))
    }
}
