//! Segmenter Implementation

use serde::{Deserialize, Serialize};
use std::ops::Range;
use telemetry::{seconds_between, Sample, MAX_SAMPLE_GAP_SECS};
use tracing::debug;

/// Segmenter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// A gap strictly larger than this ends the current trip (seconds)
    pub max_gap_secs: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_gap_secs: MAX_SAMPLE_GAP_SECS,
        }
    }
}

/// A contiguous run of samples between two cut points, not yet validated
#[derive(Debug, Clone)]
pub struct TripCandidate<'a> {
    /// Index range into the device sequence
    pub range: Range<usize>,
    pub samples: &'a [Sample],
}

/// Indices where a new segment starts, plus `0` and `samples.len()`
///
/// A cut lands on index `i` when the gap from sample `i - 1` exceeds
/// `max_gap_secs` or the cable state differs between the two samples.
pub fn cut_points(samples: &[Sample], config: &SegmenterConfig) -> Vec<usize> {
    let mut cuts = vec![0];
    for (i, pair) in samples.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        let gap = seconds_between(prev.timestamp, cur.timestamp) > config.max_gap_secs;
        let cable_changed = prev.cable != cur.cable;
        if gap || cable_changed {
            cuts.push(i + 1);
        }
    }
    if !samples.is_empty() {
        cuts.push(samples.len());
    }
    cuts
}

/// Stateless trip segmenter
#[derive(Debug, Clone, Default)]
pub struct TripSegmenter {
    config: SegmenterConfig,
}

impl TripSegmenter {
    /// Create a new segmenter
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Every interval between consecutive cut points
    pub fn split(&self, samples: &[Sample]) -> Vec<Range<usize>> {
        cut_points(samples, &self.config)
            .windows(2)
            .map(|w| w[0]..w[1])
            .collect()
    }

    /// Intervals that may become trips: those not starting with the cable connected
    pub fn candidates<'a>(&self, samples: &'a [Sample]) -> Vec<TripCandidate<'a>> {
        let intervals = self.split(samples);
        let total = intervals.len();

        let candidates: Vec<_> = intervals
            .into_iter()
            .filter(|range| !samples[range.start].cable.is_connected())
            .map(|range| TripCandidate {
                samples: &samples[range.clone()],
                range,
            })
            .collect();

        debug!(
            "Segmented {} samples into {} intervals, {} candidates",
            samples.len(),
            total,
            candidates.len()
        );
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use proptest::prelude::*;
    use telemetry::CableState;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 10)
            .unwrap()
            .and_hms_opt(6, 30, 0)
            .unwrap()
    }

    fn samples_at(offsets: &[i64]) -> Vec<Sample> {
        offsets
            .iter()
            .map(|&o| {
                let mut s = Sample::new(base() + Duration::seconds(o));
                s.cable = CableState::Disconnected;
                s
            })
            .collect()
    }

    fn evenly_spaced(n: usize) -> Vec<Sample> {
        let offsets: Vec<i64> = (0..n as i64).collect();
        samples_at(&offsets)
    }

    #[test]
    fn test_continuous_sequence_is_one_candidate() {
        let samples = evenly_spaced(50);
        let segmenter = TripSegmenter::default();

        let candidates = segmenter.candidates(&samples);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].range, 0..50);
        assert_eq!(candidates[0].samples.len(), 50);
    }

    #[test]
    fn test_gap_boundary_is_strict() {
        let segmenter = TripSegmenter::default();

        let samples = samples_at(&[0, 1, 601, 602]);
        assert_eq!(segmenter.split(&samples), vec![0..4]);

        let samples = samples_at(&[0, 1, 602, 603]);
        assert_eq!(segmenter.split(&samples), vec![0..2, 2..4]);
    }

    #[test]
    fn test_charging_flip_splits_at_index() {
        let segmenter = TripSegmenter::default();
        let mut samples = evenly_spaced(20);
        for s in &mut samples[7..] {
            s.cable = CableState::Connected;
        }

        assert_eq!(segmenter.split(&samples), vec![0..7, 7..20]);

        // The charging interval is never a candidate
        let candidates = segmenter.candidates(&samples);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].range, 0..7);
    }

    #[test]
    fn test_plug_and_unplug_isolates_charging_session() {
        let segmenter = TripSegmenter::default();
        let mut samples = evenly_spaced(30);
        for s in &mut samples[10..20] {
            s.cable = CableState::Connected;
        }

        let ranges: Vec<_> = segmenter
            .candidates(&samples)
            .into_iter()
            .map(|c| c.range)
            .collect();
        assert_eq!(ranges, vec![0..10, 20..30]);
    }

    #[test]
    fn test_unknown_to_known_is_a_transition() {
        let segmenter = TripSegmenter::default();
        let mut samples = evenly_spaced(6);
        samples[0].cable = CableState::Unknown;
        samples[1].cable = CableState::Unknown;

        assert_eq!(segmenter.split(&samples), vec![0..2, 2..6]);
    }

    #[test]
    fn test_empty_and_single_sample() {
        let segmenter = TripSegmenter::default();
        assert!(segmenter.split(&[]).is_empty());
        assert_eq!(segmenter.split(&evenly_spaced(1)), vec![0..1]);
    }

    proptest! {
        #[test]
        fn prop_intervals_partition_input(
            steps in prop::collection::vec((1i64..900, any::<bool>()), 1..200)
        ) {
            let mut offset = 0;
            let mut samples = Vec::with_capacity(steps.len());
            for (step, charging) in &steps {
                offset += step;
                let mut s = Sample::new(base() + Duration::seconds(offset));
                s.cable = if *charging { CableState::Connected } else { CableState::Disconnected };
                samples.push(s);
            }

            let segmenter = TripSegmenter::default();
            let ranges = segmenter.split(&samples);

            prop_assert_eq!(ranges.first().map(|r| r.start), Some(0));
            prop_assert_eq!(ranges.last().map(|r| r.end), Some(samples.len()));
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            for range in &ranges {
                prop_assert!(!range.is_empty());
                let seg = &samples[range.clone()];
                for w in seg.windows(2) {
                    prop_assert_eq!(w[0].cable, w[1].cable);
                    prop_assert!(seconds_between(w[0].timestamp, w[1].timestamp) <= 600.0);
                }
            }
        }

        #[test]
        fn prop_single_flip_yields_two_intervals(n in 2usize..300, k_seed in any::<usize>()) {
            let k = 1 + k_seed % (n - 1);
            let mut samples = evenly_spaced(n);
            for s in &mut samples[k..] {
                s.cable = CableState::Connected;
            }

            let ranges = TripSegmenter::default().split(&samples);
            prop_assert_eq!(ranges, vec![0..k, k..n]);
        }
    }
}
