// Presentation layer - HTTP routes for the chart renderer
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_chart, get_settings, get_snapshot, get_status, health_check, list_charts, post_command,
    post_setpoint, stream_chart,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    // Compression is applied per response by the handlers, so no CompressionLayer.
    Router::new()
        .route("/healthz", get(health_check))
        .route("/status", get(get_status))
        .route("/snapshot", get(get_snapshot))
        .route("/charts", get(list_charts))
        .route("/charts/:id", get(get_chart))
        .route("/charts/:id/stream", get(stream_chart))
        .route("/settings", get(get_settings))
        .route("/commands", post(post_command))
        .route("/setpoints/:key", post(post_setpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
