// Render mode selection and dataset shaping for the chart renderer
use crate::application::sample_buffer::SeriesBuffer;
use crate::domain::chart::ChartCatalog;
use crate::domain::tag::TagName;
use crate::domain::telemetry::{
    PlotPoint, RenderDataset, SeriesDataset, TelemetrySample, XValue, format_timestamp,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderMode {
    Raw,
    Decimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinateEncoding {
    EpochMs,
    ParseableString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderProfile {
    pub mode: RenderMode,
    pub show_point_markers: bool,
    pub coordinate_encoding: CoordinateEncoding,
    /// Min/max decimation budget per series, set only in decimated mode.
    pub sample_budget: Option<usize>,
}

impl RenderProfile {
    /// Historical ranges plot every sample the historian returns on a time axis.
    pub fn historical() -> Self {
        Self {
            mode: RenderMode::Raw,
            show_point_markers: false,
            coordinate_encoding: CoordinateEncoding::EpochMs,
            sample_budget: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderThresholds {
    pub decimation_threshold_secs: u64,
    pub marker_threshold_secs: u64,
    pub decimation_samples: usize,
}

impl Default for RenderThresholds {
    fn default() -> Self {
        Self {
            decimation_threshold_secs: 300,
            marker_threshold_secs: 120,
            decimation_samples: 500,
        }
    }
}

pub fn select_mode(display_range_secs: u64, thresholds: &RenderThresholds) -> RenderProfile {
    if display_range_secs > thresholds.decimation_threshold_secs {
        RenderProfile {
            mode: RenderMode::Decimated,
            show_point_markers: false,
            coordinate_encoding: CoordinateEncoding::EpochMs,
            sample_budget: Some(thresholds.decimation_samples),
        }
    } else {
        RenderProfile {
            mode: RenderMode::Raw,
            show_point_markers: display_range_secs <= thresholds.marker_threshold_secs,
            coordinate_encoding: CoordinateEncoding::ParseableString,
            sample_budget: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeDecision {
    pub profile: RenderProfile,
    /// The consumer must discard its chart instance and build a new one.
    pub rebuild: bool,
}

/// Tracks the mode last handed to one chart so a mode switch can be flagged.
#[derive(Debug, Clone)]
pub struct RenderModeSelector {
    thresholds: RenderThresholds,
    current: Option<RenderMode>,
}

impl RenderModeSelector {
    pub fn new(thresholds: RenderThresholds) -> Self {
        Self {
            thresholds,
            current: None,
        }
    }

    pub fn select(&self, display_range_secs: u64) -> RenderProfile {
        select_mode(display_range_secs, &self.thresholds)
    }

    /// Like [`select`](Self::select), but records the mode. The first observation
    /// always asks for a build.
    pub fn observe(&mut self, display_range_secs: u64) -> ModeDecision {
        let profile = self.select(display_range_secs);
        let rebuild = self.current != Some(profile.mode);
        self.current = Some(profile.mode);
        ModeDecision { profile, rebuild }
    }
}

/// Min/max bucket decimation. Keeps the first and last sample and, for each bucket in
/// between, its minimum and maximum in time order. Never returns more than `budget`
/// samples.
pub fn decimate_min_max(samples: &[TelemetrySample], budget: usize) -> Vec<TelemetrySample> {
    if samples.len() <= budget {
        return samples.to_vec();
    }
    if budget < 4 {
        let mut edges = vec![samples[0], samples[samples.len() - 1]];
        edges.truncate(budget);
        return edges;
    }

    let interior = &samples[1..samples.len() - 1];
    let buckets = (budget - 2) / 2;
    let bucket_size = interior.len().div_ceil(buckets);

    let mut result = Vec::with_capacity(budget);
    result.push(samples[0]);

    for bucket in interior.chunks(bucket_size) {
        let (mut min_idx, mut max_idx) = (0, 0);
        for (i, sample) in bucket.iter().enumerate() {
            if sample.value < bucket[min_idx].value {
                min_idx = i;
            }
            if sample.value > bucket[max_idx].value {
                max_idx = i;
            }
        }

        let (first, second) = if min_idx <= max_idx {
            (min_idx, max_idx)
        } else {
            (max_idx, min_idx)
        };
        result.push(bucket[first]);
        if second != first {
            result.push(bucket[second]);
        }
    }

    result.push(samples[samples.len() - 1]);
    result
}

pub fn to_plot_point(sample: &TelemetrySample, encoding: CoordinateEncoding) -> PlotPoint {
    let x = match encoding {
        CoordinateEncoding::EpochMs => XValue::EpochMs(sample.timestamp.timestamp_millis()),
        CoordinateEncoding::ParseableString => XValue::Parseable(format_timestamp(&sample.timestamp)),
    };
    PlotPoint { x, y: sample.value }
}

/// Build one series per tag, in `tags` order, from the live buffer.
pub fn shape_dataset(
    buffer: &SeriesBuffer,
    tags: &[TagName],
    profile: &RenderProfile,
    catalog: &ChartCatalog,
) -> RenderDataset {
    let series = tags
        .iter()
        .map(|tag| {
            let samples = buffer.samples(tag);
            let samples = match profile.sample_budget {
                Some(budget) => decimate_min_max(&samples, budget),
                None => samples,
            };
            let style = catalog.style(tag);
            SeriesDataset {
                tag: tag.clone(),
                color: style.color,
                axis: style.axis,
                points: samples
                    .iter()
                    .map(|s| to_plot_point(s, profile.coordinate_encoding))
                    .collect(),
            }
        })
        .collect();

    RenderDataset { series }
}
