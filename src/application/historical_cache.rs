// Historical query cache - Memoized datasets for bounded, non-live ranges
use crate::application::backend::TelemetryBackend;
use crate::application::clock::Clock;
use crate::application::render_mode::{RenderProfile, to_plot_point};
use crate::domain::chart::ChartCatalog;
use crate::domain::range::HistoricalRange;
use crate::domain::tag::TagName;
use crate::domain::telemetry::{HistoryBatch, RenderDataset, SeriesDataset, TelemetrySample};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub chart_id: String,
    pub range: HistoricalRange,
    /// Sorted and deduplicated.
    pub tags: Vec<TagName>,
}

impl CacheKey {
    pub fn new(chart_id: &str, range: HistoricalRange, tags: &[TagName]) -> Self {
        let mut tags = tags.to_vec();
        tags.sort();
        tags.dedup();
        Self {
            chart_id: chart_id.to_string(),
            range,
            tags,
        }
    }
}

/// Entries are immutable once stored and live for the whole session.
pub struct HistoricalQueryCache {
    backend: Arc<dyn TelemetryBackend>,
    catalog: Arc<ChartCatalog>,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<CacheKey, Arc<RenderDataset>>>,
}

impl HistoricalQueryCache {
    pub fn new(
        backend: Arc<dyn TelemetryBackend>,
        catalog: Arc<ChartCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            catalog,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(
        &self,
        chart_id: &str,
        range: HistoricalRange,
        tags: &[TagName],
    ) -> Arc<RenderDataset> {
        let key = CacheKey::new(chart_id, range, tags);
        if key.tags.is_empty() {
            return Arc::new(RenderDataset::empty());
        }

        if let Some(hit) = self.lookup(&key) {
            tracing::debug!("Historical cache hit for {} ({:?})", chart_id, range);
            return hit;
        }

        let (start, end) = range.resolve(self.clock.now());
        let batch = match self.backend.query_history(&key.tags, start, end).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!("Historical query for chart {} failed: {}", chart_id, e);
                return Arc::new(RenderDataset::empty());
            }
        };

        let dataset = Arc::new(self.build_dataset(&key.tags, &batch));
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        // A concurrent miss for the same key may have landed first; keep that one.
        let stored = entries.entry(key).or_insert(dataset).clone();
        tracing::debug!("Historical cache holds {} entries", entries.len());
        stored
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<RenderDataset>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn build_dataset(&self, tags: &[TagName], batch: &HistoryBatch) -> RenderDataset {
        let encoding = RenderProfile::historical().coordinate_encoding;
        let series = tags
            .iter()
            .map(|tag| {
                let mut samples: Vec<TelemetrySample> = batch
                    .get(tag)
                    .map(|raw| raw.iter().filter_map(|r| r.validate()).collect())
                    .unwrap_or_default();
                samples.sort_by_key(|s| s.timestamp);

                let style = self.catalog.style(tag);
                SeriesDataset {
                    tag: tag.clone(),
                    color: style.color,
                    axis: style.axis,
                    points: samples
                        .iter()
                        .map(|s| to_plot_point(s, encoding))
                        .collect(),
                }
            })
            .collect();

        RenderDataset { series }
    }
}
