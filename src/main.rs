// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::application::backend::TelemetryBackend;
use crate::application::clock::{Clock, SystemClock};
use crate::application::command_service::CommandService;
use crate::application::connectivity::ConnectivityMonitor;
use crate::application::historical_cache::HistoricalQueryCache;
use crate::application::last_seen::LastSeenStore;
use crate::application::live_chart::{LiveChartDeps, LiveChartRegistry};
use crate::application::session::{Credentials, SessionEvents};
use crate::domain::connection::format_last_seen;
use crate::infrastructure::config::{load_charts_config, load_dashboard_config};
use crate::infrastructure::http_backend::HttpBackend;
use crate::infrastructure::last_seen_file::FileLastSeenStore;
use crate::presentation::app_state::AppState;
use crate::presentation::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let dashboard = load_dashboard_config()?;
    let catalog = Arc::new(load_charts_config()?.into_catalog()?);

    // Session handling: the backend reports 401s, the owner drops the credential
    let events = SessionEvents::new();
    let credentials = Credentials::new(dashboard.backend.bearer_token.clone());
    let session_owner = tokio::spawn(credentials.clone().watch(events.subscribe()));

    // Create backend and durable state (infrastructure layer)
    let backend: Arc<dyn TelemetryBackend> = Arc::new(
        HttpBackend::new(&dashboard.backend, credentials, events.clone())
            .context("Failed to build backend client")?,
    );
    let store: Arc<dyn LastSeenStore> =
        Arc::new(FileLastSeenStore::new(&dashboard.connectivity.state_file));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let restored = store.load().await;
    tracing::info!("Backend last seen: {}", format_last_seen(restored));

    // Create services (application layer)
    let monitor = ConnectivityMonitor::new(
        backend.clone(),
        store,
        clock.clone(),
        dashboard.probe_settings(),
        restored,
    );
    let heartbeat = monitor.spawn();

    let live_charts = LiveChartRegistry::new(LiveChartDeps {
        backend: backend.clone(),
        catalog: catalog.clone(),
        clock: clock.clone(),
        gate: monitor.gate(),
        settings: dashboard.live_poll_settings(),
        thresholds: dashboard.render_thresholds(),
    });
    let historical = HistoricalQueryCache::new(backend.clone(), catalog.clone(), clock);
    let commands = CommandService::new(backend, catalog.clone(), monitor.gate());

    // Create application state
    let state = Arc::new(AppState {
        monitor,
        catalog,
        thresholds: dashboard.render_thresholds(),
        live_charts: Mutex::new(live_charts),
        historical,
        commands,
    });

    // Start server
    let addr: SocketAddr = dashboard
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid server.bind address '{}'", dashboard.server.bind))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting flywheel-telemetry service on {}", addr);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop every poller before exiting
    tracing::info!("Shutting down pollers");
    state.live_charts.lock().await.shutdown().await;
    heartbeat.shutdown().await;
    session_owner.abort();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
