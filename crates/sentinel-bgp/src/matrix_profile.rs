//! Streaming Matrix Profile discord detector (spec §4.2).

use sentinel_common::metrics::Counters;
use sentinel_common::types::{BgpAnomaly, BgpSeries, DeviceId, FeatureBin};
use std::collections::HashMap;
use std::sync::Arc;

const MONITORED_SERIES: [BgpSeries; 3] =
    [BgpSeries::Withdrawals, BgpSeries::Announcements, BgpSeries::Churn];

fn series_value(bin: &FeatureBin, series: BgpSeries) -> f64 {
    match series {
        BgpSeries::Withdrawals => bin.withdrawals_total as f64,
        BgpSeries::Announcements => bin.announcements_total as f64,
        BgpSeries::Churn => bin.as_path_churn,
    }
}

/// Fixed-capacity ring buffer of length `window_bins * 3` (spec §4.2
/// "State"). No per-step allocation once full.
struct Ring {
    capacity: usize,
    buf: Vec<f64>,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buf: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, value: f64) {
        let value = if value.is_finite() {
            value
        } else {
            self.buf.last().copied().unwrap_or(0.0)
        };
        if self.buf.len() == self.capacity {
            self.buf.remove(0);
        }
        self.buf.push(value);
    }

    fn len(&self) -> usize {
        self.buf.len()
    }
}

/// Per-(device, series) Matrix Profile state plus the shared config
/// inherited by every instance.
pub struct MatrixProfileDetector {
    window_bins: usize,
    ring_capacity: usize,
    tau_mp: f64,
    rings: HashMap<(DeviceId, BgpSeries), Ring>,
    counters: Arc<Counters>,
}

impl MatrixProfileDetector {
    pub fn new(window_bins: usize, tau_mp: f64, counters: Arc<Counters>) -> Self {
        Self {
            window_bins,
            ring_capacity: window_bins * 3,
            tau_mp,
            rings: HashMap::new(),
            counters,
        }
    }

    /// `update(bin) -> Option<BgpAnomaly>` (spec §4.2 public operation).
    pub fn update(&mut self, bin: &FeatureBin) -> Option<BgpAnomaly> {
        let mut flagged = Vec::new();
        let mut all_distances = Vec::new();
        let mut warmed_up = true;

        for series in MONITORED_SERIES {
            let key = (bin.device.clone(), series);
            let ring = self
                .rings
                .entry(key)
                .or_insert_with(|| Ring::new(self.ring_capacity));
            ring.push(series_value(bin, series));

            if ring.len() < 2 * self.window_bins {
                warmed_up = false;
                continue;
            }

            match self.compute_discord(&ring.buf) {
                Some(min_dist) => {
                    all_distances.push((series, min_dist));
                    if min_dist >= self.tau_mp {
                        flagged.push((series, min_dist));
                    }
                }
                None => {
                    Counters::incr(&self.counters.mp_compute_errors);
                }
            }
        }

        if !warmed_up || flagged.is_empty() {
            return None;
        }

        let min_distance = flagged
            .iter()
            .map(|(_, d)| *d)
            .fold(f64::MIN, f64::max);
        let confidence = ((min_distance - self.tau_mp) / self.tau_mp + 0.5).clamp(0.0, 1.0);

        Some(BgpAnomaly {
            ts: bin.bin_end,
            device: bin.device.clone(),
            confidence,
            detected_series: flagged.iter().map(|(s, _)| *s).collect(),
            min_distance,
            per_series_distance: all_distances,
        })
    }

    /// Computes the z-normalized Euclidean Matrix Profile over `buf` with
    /// subsequence length `W = window_bins` and exclusion zone `ceil(W/2)`,
    /// returning the maximum profile value (the globally most-unusual
    /// subsequence in the current ring), or `None` on an unrecoverable
    /// numeric failure.
    fn compute_discord(&self, buf: &[f64]) -> Option<f64> {
        let w = self.window_bins;
        if buf.len() < 2 * w {
            return None;
        }
        let n_subseq = buf.len() - w + 1;
        let exclusion = (w + 1) / 2;

        // Zero-variance subsequences normalize to an all-zero "flat" vector
        // rather than being excluded from comparison; this is what makes a
        // spike's nearest zero-variance neighbor distance meaningful instead
        // of undefined, and keeps the exclusion zone the only skip rule.
        let normalized: Vec<(Vec<f64>, bool)> = (0..n_subseq)
            .map(|i| z_normalize(&buf[i..i + w]))
            .collect();

        let mut profile = vec![0.0_f64; n_subseq];
        for i in 0..n_subseq {
            let (a, is_constant) = &normalized[i];
            if *is_constant {
                // Constant series within the ring: never flagged (spec §4.2).
                profile[i] = 0.0;
                continue;
            }
            let mut best = f64::MAX;
            for j in 0..n_subseq {
                if i.abs_diff(j) < exclusion {
                    continue;
                }
                let (b, _) = &normalized[j];
                let dist = euclidean(a, b);
                if dist < best {
                    best = dist;
                }
            }
            profile[i] = if best.is_finite() { best } else { 0.0 };
        }

        let max = profile.into_iter().fold(0.0_f64, f64::max);
        if max.is_finite() {
            Some(max)
        } else {
            None
        }
    }
}

/// Z-normalizes a subsequence. Returns the normalized vector and whether the
/// subsequence had (near-)zero variance, in which case the vector is the
/// all-zero "flat" representation rather than a division-by-zero result.
fn z_normalize(values: &[f64]) -> (Vec<f64>, bool) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    if std < 1e-9 {
        return (vec![0.0; values.len()], true);
    }
    (values.iter().map(|v| (v - mean) / std).collect(), false)
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bin_with(device: &str, withdrawals: u64, t: i64) -> FeatureBin {
        let start = Utc.timestamp_opt(t, 0).unwrap();
        FeatureBin {
            device: device.to_string(),
            bin_start: start,
            bin_end: start + Duration::seconds(30),
            withdrawals_total: withdrawals,
            announcements_total: 0,
            as_path_churn: 0.0,
            peer_count: 1,
        }
    }

    #[test]
    fn warmup_emits_nothing() {
        let counters = Arc::new(Counters::default());
        let mut detector = MatrixProfileDetector::new(8, 2.5, counters);
        for i in 0..10 {
            let bin = bin_with("spine-01", 5, 1_700_000_000 + i * 30);
            assert!(detector.update(&bin).is_none());
        }
    }

    #[test]
    fn constant_series_never_flagged() {
        let counters = Arc::new(Counters::default());
        let mut detector = MatrixProfileDetector::new(4, 2.5, counters);
        for i in 0..40 {
            let bin = bin_with("spine-01", 3, 1_700_000_000 + i * 30);
            assert!(detector.update(&bin).is_none());
        }
    }

    #[test]
    fn spike_after_stable_baseline_is_flagged() {
        let counters = Arc::new(Counters::default());
        let mut detector = MatrixProfileDetector::new(4, 2.5, counters);
        let mut last = None;
        for i in 0..16 {
            let bin = bin_with("spine-01", 3, 1_700_000_000 + i * 30);
            last = detector.update(&bin);
        }
        assert!(last.is_none());
        let spike = bin_with("spine-01", 500, 1_700_000_000 + 16 * 30);
        let result = detector.update(&spike);
        assert!(result.is_some());
        let anomaly = result.unwrap();
        assert!(anomaly.min_distance >= 2.5);
        assert!(anomaly.confidence > 0.0 && anomaly.confidence <= 1.0);
    }
}
