// Application state for HTTP handlers
use crate::application::command_service::CommandService;
use crate::application::connectivity::ConnectivityMonitor;
use crate::application::historical_cache::HistoricalQueryCache;
use crate::application::live_chart::LiveChartRegistry;
use crate::application::render_mode::RenderThresholds;
use crate::domain::chart::ChartCatalog;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct AppState {
    pub monitor: ConnectivityMonitor,
    pub catalog: Arc<ChartCatalog>,
    pub thresholds: RenderThresholds,
    pub live_charts: Mutex<LiveChartRegistry>,
    pub historical: HistoricalQueryCache,
    pub commands: CommandService,
}
