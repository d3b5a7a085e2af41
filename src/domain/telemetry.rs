// Telemetry sample and render dataset domain models
use super::tag::TagName;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A validated, numeric sample of one tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TelemetrySample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A sample as it arrives from the historian, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl RawSample {
    pub fn new(ts: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            ts: Some(ts.into()),
            value,
        }
    }

    /// Returns `None` when the timestamp is missing or unparseable, or the value is
    /// missing, null, non-numeric or non-finite.
    pub fn validate(&self) -> Option<TelemetrySample> {
        let timestamp = parse_timestamp(self.ts.as_deref()?)?;
        let value = parse_value(&self.value)?;
        Some(TelemetrySample::new(timestamp, value))
    }
}

/// Historian response: tag name to raw samples. Tags absent from the response map to
/// no samples.
pub type HistoryBatch = HashMap<TagName, Vec<RawSample>>;

/// Accepts RFC 3339 (`2024-05-01T12:00:00.250Z`, `...+00:00`) and naive ISO-8601
/// timestamps, the latter interpreted as UTC.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_value(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// X coordinate of a plot point; the variant depends on the active render mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum XValue {
    EpochMs(i64),
    Parseable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub x: XValue,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Primary,
    /// Right-hand axis for high-magnitude series such as shaft speed.
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesDataset {
    pub tag: TagName,
    pub color: String,
    pub axis: Axis,
    pub points: Vec<PlotPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderDataset {
    pub series: Vec<SeriesDataset>,
}

impl RenderDataset {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn series(&self, tag: &TagName) -> Option<&SeriesDataset> {
        self.series.iter().find(|s| &s.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-01T12:00:00.250000").map(|t| t.timestamp_millis()),
            Some(expected.timestamp_millis() + 250)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_raw_sample_validation() {
        let ts = "2024-05-01T12:00:00Z";
        assert!(RawSample::new(ts, json!(3.5)).validate().is_some());
        assert_eq!(
            RawSample::new(ts, json!("42.25")).validate().map(|s| s.value),
            Some(42.25)
        );
        assert!(RawSample::new(ts, json!("NaN")).validate().is_none());
        assert!(RawSample::new(ts, json!("inf")).validate().is_none());
        assert!(RawSample::new(ts, json!("NaN-literal")).validate().is_none());
        assert!(RawSample::new(ts, json!(null)).validate().is_none());
        assert!(RawSample::new(ts, json!(true)).validate().is_none());
        assert!(RawSample::new("not a time", json!(1.0)).validate().is_none());

        let missing_ts: RawSample = serde_json::from_value(json!({ "value": 1.0 })).unwrap();
        assert!(missing_ts.validate().is_none());
    }

    #[test]
    fn test_format_timestamp_round_trips() {
        let ts = Utc.timestamp_millis_opt(1_714_564_800_125).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-05-01T12:00:00.125Z");
        assert_eq!(parse_timestamp(&format_timestamp(&ts)), Some(ts));
    }

    #[test]
    fn test_x_value_serialization() {
        let epoch = PlotPoint { x: XValue::EpochMs(1000), y: 1.0 };
        let text = PlotPoint {
            x: XValue::Parseable("2024-05-01T12:00:00.000Z".into()),
            y: 2.0,
        };
        assert_eq!(serde_json::to_value(&epoch).unwrap(), json!({"x": 1000, "y": 1.0}));
        assert_eq!(
            serde_json::to_value(&text).unwrap(),
            json!({"x": "2024-05-01T12:00:00.000Z", "y": 2.0})
        );
    }
}
