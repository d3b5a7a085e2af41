// Bounded per-tag sample windows for live charts
//
// Merges are set unions keyed by timestamp followed by a cutoff, so the resulting
// buffer depends only on the samples seen and the final `now`. Backfill and top-up
// responses may therefore be applied in any order, and any number of times.
use crate::domain::tag::TagName;
use crate::domain::telemetry::{HistoryBatch, RawSample, TelemetrySample};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub accepted: usize,
    pub dropped: usize,
    pub evicted: usize,
}

impl std::ops::AddAssign for MergeStats {
    fn add_assign(&mut self, other: Self) {
        self.accepted += other.accepted;
        self.dropped += other.dropped;
        self.evicted += other.evicted;
    }
}

/// Samples per tag, ordered and unique by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesBuffer {
    series: HashMap<TagName, BTreeMap<DateTime<Utc>, f64>>,
}

impl SeriesBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `incoming` into the window for `tag`, then drop everything older than
    /// `now - window`. A sample whose timestamp is already present replaces the stored
    /// value. Malformed samples are skipped.
    pub fn merge<'a, I>(
        &mut self,
        tag: &TagName,
        incoming: I,
        now: DateTime<Utc>,
        window: Duration,
    ) -> MergeStats
    where
        I: IntoIterator<Item = &'a RawSample>,
    {
        let mut stats = MergeStats::default();
        let samples = self.series.entry(tag.clone()).or_default();

        for raw in incoming {
            match raw.validate() {
                Some(sample) => {
                    samples.insert(sample.timestamp, sample.value);
                    stats.accepted += 1;
                }
                None => stats.dropped += 1,
            }
        }

        let before = samples.len();
        let retained = samples.split_off(&(now - window));
        *samples = retained;
        stats.evicted = before - samples.len();

        stats
    }

    /// Merge a historian response for every tag in `tags`. Tags missing from the
    /// batch are still pruned against the new cutoff.
    pub fn merge_batch(
        &mut self,
        tags: &[TagName],
        batch: &HistoryBatch,
        now: DateTime<Utc>,
        window: Duration,
    ) -> MergeStats {
        let mut stats = MergeStats::default();
        for tag in tags {
            let incoming = batch.get(tag).map(Vec::as_slice).unwrap_or_default();
            stats += self.merge(tag, incoming, now, window);
        }
        stats
    }

    pub fn samples(&self, tag: &TagName) -> Vec<TelemetrySample> {
        self.series
            .get(tag)
            .map(|samples| {
                samples
                    .iter()
                    .map(|(ts, value)| TelemetrySample::new(*ts, *value))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, tag: &TagName) -> usize {
        self.series.get(tag).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn total_len(&self) -> usize {
        self.series.values().map(BTreeMap::len).sum()
    }
}
