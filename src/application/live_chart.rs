// Live chart sessions - Backfill then overlapping top-ups into a bounded buffer
use crate::application::backend::TelemetryBackend;
use crate::application::clock::Clock;
use crate::application::connectivity::ConnectivityGate;
use crate::application::poll_task::PollHandle;
use crate::application::render_mode::{
    ModeDecision, RenderModeSelector, RenderProfile, RenderThresholds, shape_dataset,
};
use crate::application::sample_buffer::SeriesBuffer;
use crate::domain::chart::ChartCatalog;
use crate::domain::range::{LiveWindow, RangeKey};
use crate::domain::tag::TagName;
use crate::domain::telemetry::RenderDataset;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct LivePollSettings {
    pub poll_interval: Duration,
    /// How far back each top-up reaches, so a delayed poll leaves no gap.
    pub overlap: chrono::Duration,
}

impl Default for LivePollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            overlap: chrono::Duration::seconds(10),
        }
    }
}

/// What the chart renderer receives for one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFrame {
    pub chart_id: String,
    pub range: RangeKey,
    pub profile: RenderProfile,
    pub rebuild: bool,
    /// True until the initial backfill has been merged.
    pub loading: bool,
    pub dataset: RenderDataset,
}

/// Collaborators shared by every live session.
#[derive(Clone)]
pub struct LiveChartDeps {
    pub backend: Arc<dyn TelemetryBackend>,
    pub catalog: Arc<ChartCatalog>,
    pub clock: Arc<dyn Clock>,
    pub gate: ConnectivityGate,
    pub settings: LivePollSettings,
    pub thresholds: RenderThresholds,
}

struct LiveChartSession {
    chart_id: String,
    tags: Vec<TagName>,
    window: LiveWindow,
    profile: RenderProfile,
    deps: LiveChartDeps,
    frames: watch::Sender<ChartFrame>,
}

impl LiveChartSession {
    async fn run(self, token: CancellationToken) {
        let window = chrono::Duration::seconds(self.window.seconds() as i64);
        let mut buffer = SeriesBuffer::new();
        let mut backfilled = false;
        let mut first_cycle = true;

        loop {
            if !first_cycle {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(self.deps.settings.poll_interval) => {}
                }
            }
            first_cycle = false;

            if self.deps.gate.is_offline() {
                tracing::debug!("Chart {} poll skipped while offline", self.chart_id);
                continue;
            }

            let now = self.deps.clock.now();
            let start = if backfilled {
                now - self.deps.settings.overlap
            } else {
                now - window
            };

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = self.deps.backend.query_history(&self.tags, start, now) => result,
            };

            match result {
                Ok(batch) => {
                    let stats = buffer.merge_batch(&self.tags, &batch, now, window);
                    tracing::debug!(
                        "Chart {} merged {} samples ({} dropped, {} evicted), {} buffered",
                        self.chart_id,
                        stats.accepted,
                        stats.dropped,
                        stats.evicted,
                        buffer.total_len()
                    );
                    if !backfilled {
                        tracing::info!("Chart {} backfilled {}s window", self.chart_id, window.num_seconds());
                        backfilled = true;
                    }
                    self.publish(&buffer);
                }
                Err(e) if backfilled => {
                    tracing::debug!("Chart {} top-up skipped: {}", self.chart_id, e);
                }
                Err(e) => {
                    tracing::warn!("Chart {} backfill failed, retrying: {}", self.chart_id, e);
                }
            }
        }

        tracing::debug!("Chart {} session stopped", self.chart_id);
    }

    fn publish(&self, buffer: &SeriesBuffer) {
        let dataset = shape_dataset(buffer, &self.tags, &self.profile, &self.deps.catalog);
        self.frames.send_replace(ChartFrame {
            chart_id: self.chart_id.clone(),
            range: RangeKey::Live(self.window),
            profile: self.profile,
            rebuild: false,
            loading: false,
            dataset,
        });
    }
}

struct ActiveChart {
    tags: Vec<TagName>,
    window: LiveWindow,
    profile: RenderProfile,
    handle: PollHandle,
    frames: watch::Receiver<ChartFrame>,
}

#[derive(Debug, Clone)]
pub struct LiveView {
    pub decision: ModeDecision,
    pub frames: watch::Receiver<ChartFrame>,
}

impl LiveView {
    /// Latest frame, flagged for rebuild when this view started a new render mode.
    pub fn current_frame(&self) -> ChartFrame {
        let mut frame = self.frames.borrow().clone();
        frame.rebuild = self.decision.rebuild;
        frame
    }
}

/// One live session per chart. A session (and its buffer) is replaced whenever the
/// chart's tag selection or window changes.
pub struct LiveChartRegistry {
    deps: LiveChartDeps,
    charts: HashMap<String, ActiveChart>,
    selectors: HashMap<String, RenderModeSelector>,
}

impl LiveChartRegistry {
    pub fn new(deps: LiveChartDeps) -> Self {
        Self {
            deps,
            charts: HashMap::new(),
            selectors: HashMap::new(),
        }
    }

    /// Returns `None` (and stops any running session) when no tags are selected.
    pub fn ensure(
        &mut self,
        chart_id: &str,
        tags: &[TagName],
        window: LiveWindow,
    ) -> Option<LiveView> {
        if tags.is_empty() {
            self.release(chart_id);
            return None;
        }

        if let Some(active) = self.charts.get(chart_id) {
            if active.tags == tags && active.window == window {
                return Some(LiveView {
                    decision: ModeDecision {
                        profile: active.profile,
                        rebuild: false,
                    },
                    frames: active.frames.clone(),
                });
            }
        }

        if let Some(previous) = self.charts.remove(chart_id) {
            tracing::info!("Restarting live chart {} after selection change", chart_id);
            previous.handle.stop();
        }

        let thresholds = self.deps.thresholds;
        let decision = self
            .selectors
            .entry(chart_id.to_string())
            .or_insert_with(|| RenderModeSelector::new(thresholds))
            .observe(window.seconds());

        let (frames_tx, frames_rx) = watch::channel(ChartFrame {
            chart_id: chart_id.to_string(),
            range: RangeKey::Live(window),
            profile: decision.profile,
            rebuild: false,
            loading: true,
            dataset: RenderDataset::empty(),
        });

        let session = LiveChartSession {
            chart_id: chart_id.to_string(),
            tags: tags.to_vec(),
            window,
            profile: decision.profile,
            deps: self.deps.clone(),
            frames: frames_tx,
        };
        let handle = PollHandle::spawn(format!("chart:{}", chart_id), move |token| {
            session.run(token)
        });

        self.charts.insert(
            chart_id.to_string(),
            ActiveChart {
                tags: tags.to_vec(),
                window,
                profile: decision.profile,
                handle,
                frames: frames_rx.clone(),
            },
        );

        Some(LiveView {
            decision,
            frames: frames_rx,
        })
    }

    /// Tear down the chart's live session. The next live view of this chart is built
    /// from scratch.
    pub fn release(&mut self, chart_id: &str) -> bool {
        self.selectors.remove(chart_id);
        match self.charts.remove(chart_id) {
            Some(active) => {
                active.handle.stop();
                tracing::info!("Released live chart {}", chart_id);
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.charts.len()
    }

    pub async fn shutdown(&mut self) {
        for (_, active) in self.charts.drain() {
            active.handle.shutdown().await;
        }
        self.selectors.clear();
    }
}
