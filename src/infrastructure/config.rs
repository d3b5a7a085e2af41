// Configuration loading - Dashboard settings and the chart table
use crate::application::connectivity::ProbeSettings;
use crate::application::live_chart::LivePollSettings;
use crate::application::render_mode::RenderThresholds;
use crate::domain::chart::{ChartCatalog, ChartDefinition};
use crate::domain::tag::TagName;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "FLYWHEEL";
/// Upper bound on the heartbeat timeout.
const MAX_PROBE_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub backend: BackendSettings,
    #[serde(default)]
    pub connectivity: ConnectivitySettings,
    #[serde(default)]
    pub live: LiveSettings,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    #[serde(default = "default_live_path")]
    pub live_path: String,
    #[serde(default = "default_historian_path")]
    pub historian_path: String,
    #[serde(default = "default_write_path")]
    pub write_path: String,
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
}

fn default_live_path() -> String {
    "/api/live-data".to_string()
}

fn default_historian_path() -> String {
    "/api/historian".to_string()
}

fn default_write_path() -> String {
    "/api/write-tag".to_string()
}

fn default_settings_path() -> String {
    "/api/settings".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConnectivitySettings {
    pub probe_period_ms: u64,
    pub probe_timeout_ms: u64,
    pub state_file: PathBuf,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            probe_period_ms: 1000,
            probe_timeout_ms: 2000,
            state_file: PathBuf::from("state/last_seen.toml"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LiveSettings {
    pub poll_interval_ms: u64,
    pub overlap_secs: i64,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            overlap_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderSettings {
    pub decimation_threshold_secs: u64,
    pub marker_threshold_secs: u64,
    pub decimation_samples: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        let thresholds = RenderThresholds::default();
        Self {
            decimation_threshold_secs: thresholds.decimation_threshold_secs,
            marker_threshold_secs: thresholds.marker_threshold_secs,
            decimation_samples: thresholds.decimation_samples,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connectivity.probe_period_ms == 0 {
            bail!("connectivity.probe_period_ms must be positive");
        }
        if self.connectivity.probe_timeout_ms == 0
            || self.connectivity.probe_timeout_ms > MAX_PROBE_TIMEOUT_MS
        {
            bail!(
                "connectivity.probe_timeout_ms must be between 1 and {}",
                MAX_PROBE_TIMEOUT_MS
            );
        }
        if self.live.poll_interval_ms == 0 {
            bail!("live.poll_interval_ms must be positive");
        }
        if self.live.overlap_secs <= 0 {
            bail!("live.overlap_secs must be positive");
        }
        if self.render.decimation_samples < 2 {
            bail!("render.decimation_samples must keep at least the first and last sample");
        }
        if self.render.marker_threshold_secs > self.render.decimation_threshold_secs {
            bail!("render.marker_threshold_secs cannot exceed render.decimation_threshold_secs");
        }
        Ok(())
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            period: Duration::from_millis(self.connectivity.probe_period_ms),
            timeout: Duration::from_millis(self.connectivity.probe_timeout_ms),
        }
    }

    pub fn live_poll_settings(&self) -> LivePollSettings {
        LivePollSettings {
            poll_interval: Duration::from_millis(self.live.poll_interval_ms),
            overlap: chrono::Duration::seconds(self.live.overlap_secs),
        }
    }

    pub fn render_thresholds(&self) -> RenderThresholds {
        RenderThresholds {
            decimation_threshold_secs: self.render.decimation_threshold_secs,
            marker_threshold_secs: self.render.marker_threshold_secs,
            decimation_samples: self.render.decimation_samples,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartsConfig {
    #[serde(default)]
    pub palette: Vec<String>,
    #[serde(default)]
    pub secondary_axis_tags: Vec<TagName>,
    #[serde(default)]
    pub writable_tags: Vec<TagName>,
    #[serde(default)]
    pub setpoint_prefix: String,
    #[serde(default)]
    pub charts: Vec<ChartEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<TagName>,
}

impl ChartsConfig {
    pub fn into_catalog(self) -> anyhow::Result<ChartCatalog> {
        let mut seen = HashSet::new();
        for chart in &self.charts {
            if !seen.insert(chart.id.as_str()) {
                bail!("duplicate chart id '{}'", chart.id);
            }
        }

        let charts = self
            .charts
            .into_iter()
            .map(|c| ChartDefinition {
                id: c.id,
                title: c.title,
                tags: c.tags,
            })
            .collect();

        Ok(ChartCatalog::new(
            charts,
            &self.palette,
            self.secondary_axis_tags.into_iter().collect(),
            self.writable_tags.into_iter().collect(),
            self.setpoint_prefix,
        ))
    }
}

pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    dashboard_config_from(config::File::with_name("config/dashboard"))
}

pub fn load_charts_config() -> anyhow::Result<ChartsConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/charts"))
        .build()?;

    settings
        .try_deserialize()
        .context("invalid chart configuration")
}

fn dashboard_config_from<S>(file: S) -> anyhow::Result<DashboardConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let dashboard: DashboardConfig = settings
        .try_deserialize()
        .context("invalid dashboard configuration")?;
    dashboard.validate()?;
    Ok(dashboard)
}
