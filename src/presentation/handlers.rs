// HTTP request handlers
use crate::application::command_service::CommandError;
use crate::application::live_chart::ChartFrame;
use crate::application::render_mode::{RenderProfile, select_mode};
use crate::domain::connection::{ConnectionStatus, format_last_seen};
use crate::domain::range::RangeKey;
use crate::domain::tag::{ControllerLink, TagName, TagValue};
use crate::domain::telemetry::RenderDataset;
use crate::domain::unit::UnitState;
use crate::infrastructure::chunked_json::stream_from_watch;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

const STATUS_TAG: &str = "A25_Status";

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub range: Option<String>,
    /// Comma-separated tag selection; the chart's configured tags when absent.
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub tag_name: String,
    pub value: f64,
}

#[derive(Serialize)]
struct StatusBody {
    #[serde(flatten)]
    status: ConnectionStatus,
    last_seen_display: String,
}

#[derive(Serialize)]
struct SnapshotBody {
    link: ControllerLink,
    unit_state: &'static str,
    tags: BTreeMap<TagName, TagValue>,
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        let status = match &self {
            CommandError::NotWritable(_) => StatusCode::FORBIDDEN,
            CommandError::Offline => StatusCode::SERVICE_UNAVAILABLE,
            CommandError::InvalidValue { .. } | CommandError::MissingSetpoint(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CommandError::Rejected { .. } | CommandError::Backend(_) => StatusCode::BAD_GATEWAY,
            CommandError::Unauthorized => StatusCode::UNAUTHORIZED,
        };
        error_response(status, self.to_string())
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.monitor.status();
    Json(StatusBody {
        status,
        last_seen_display: format_last_seen(status.last_seen),
    })
}

pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.monitor.snapshot();
    let status_tag = TagName::new(STATUS_TAG).ok();
    let unit_state = status_tag
        .and_then(|tag| snapshot.numeric(&tag))
        .map(UnitState::from_code)
        .unwrap_or(UnitState::Unknown);

    Json(SnapshotBody {
        link: snapshot.link,
        unit_state: unit_state.label(),
        tags: snapshot.tags,
    })
}

pub async fn list_charts(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    match json_response(state.catalog.as_ref(), accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Resolve the range key and tag selection of a chart request.
fn parse_chart_request(
    state: &AppState,
    id: &str,
    query: &ChartQuery,
) -> Result<(RangeKey, Vec<TagName>), Response> {
    let chart = state
        .catalog
        .chart(id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("unknown chart '{}'", id)))?;

    let range = match query.range.as_deref() {
        Some(key) => key
            .parse::<RangeKey>()
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => RangeKey::default(),
    };

    let tags = match query.tags.as_deref() {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(TagName::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => chart.tags.clone(),
    };

    Ok((range, tags))
}

/// Current frame of a chart. Live ranges attach to (or restart) the chart's live
/// session; historical ranges tear it down and go through the cache.
async fn current_frame(
    state: &AppState,
    id: &str,
    range: RangeKey,
    tags: &[TagName],
) -> (ChartFrame, Option<tokio::sync::watch::Receiver<ChartFrame>>) {
    match range {
        RangeKey::Live(window) => {
            let view = state.live_charts.lock().await.ensure(id, tags, window);
            match view {
                Some(view) => (view.current_frame(), Some(view.frames)),
                None => (
                    ChartFrame {
                        chart_id: id.to_string(),
                        range,
                        profile: select_mode(window.seconds(), &state.thresholds),
                        rebuild: true,
                        loading: false,
                        dataset: RenderDataset::empty(),
                    },
                    None,
                ),
            }
        }
        RangeKey::Historical(historical) => {
            state.live_charts.lock().await.release(id);
            let dataset = state.historical.get(id, historical, tags).await;
            (
                ChartFrame {
                    chart_id: id.to_string(),
                    range,
                    profile: RenderProfile::historical(),
                    rebuild: true,
                    loading: false,
                    dataset: dataset.as_ref().clone(),
                },
                None,
            )
        }
    }
}

pub async fn get_chart(
    Path(id): Path<String>,
    Query(query): Query<ChartQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let (range, tags) = match parse_chart_request(&state, &id, &query) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let (frame, _) = current_frame(&state, &id, range, &tags).await;
    match json_response(&frame, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Stream chart frames (progressive loading): the current frame first, then every
/// frame the live session publishes until it is replaced or released.
pub async fn stream_chart(
    Path(id): Path<String>,
    Query(query): Query<ChartQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let (range, tags) = match parse_chart_request(&state, &id, &query) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    let compress = accepts_brotli(&headers);

    let (first, frames) = current_frame(&state, &id, range, &tags).await;
    stream_from_watch(first, frames, compress)
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Response {
    match state.commands.load_settings().await {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn post_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Response {
    let tag = match TagName::new(request.tag_name) {
        Ok(tag) => tag,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.commands.write(&tag, request.value).await {
        Ok(()) => Json(json!({ "status": "success", "tag_name": tag, "value": request.value }))
            .into_response(),
        Err(e) => {
            tracing::warn!("Command {} rejected: {}", tag, e);
            e.into_response()
        }
    }
}

pub async fn post_setpoint(Path(key): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.commands.send_setpoint(&key).await {
        Ok((tag, value)) => {
            Json(json!({ "status": "success", "tag_name": tag, "value": value })).into_response()
        }
        Err(e) => {
            tracing::warn!("Setpoint '{}' not sent: {}", key, e);
            e.into_response()
        }
    }
}
