//! SNMP Feature Extractor (spec §4.3): turns a stream of SnmpSample records
//! into one fixed-schema SnmpFeatureVector per (device, sample interval).

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use sentinel_common::metrics::Counters;
use sentinel_common::types::{DeviceId, SnmpFeatureVector, SnmpSample, SNMP_FEATURE_NAMES};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Physical clamp ranges, in `SNMP_FEATURE_NAMES` order (spec §4.3
/// "out-of-range values are clamped").
const FEATURE_RANGES: [(f64, f64); 8] = [
    (0.0, 100.0),   // cpu_mean
    (0.0, 100.0),   // cpu_max
    (0.0, 100.0),   // mem_mean
    (0.0, 100.0),   // mem_max
    (-40.0, 150.0), // temp_mean
    (-40.0, 150.0), // temp_max
    (0.0, 1.0),     // if_error_rate
    (0.0, 100.0),   // if_utilization
];

/// Stable hash of the feature name schema, compared against the Isolation
/// Forest model's own recorded schema hash at load time (spec §4.4 "a
/// version/schema mismatch between the feature vector and the model is a
/// fatal startup condition").
pub fn schema_hash() -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for name in SNMP_FEATURE_NAMES {
        name.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

fn align_window_start(ts: DateTime<Utc>, interval_secs: i64) -> DateTime<Utc> {
    let epoch_secs = ts.timestamp();
    let aligned = epoch_secs - epoch_secs.rem_euclid(interval_secs);
    Utc.timestamp_opt(aligned, 0).single().unwrap_or(ts)
}

#[derive(Default)]
struct MetricWindow {
    cpu_util: Vec<f64>,
    mem_util: Vec<f64>,
    temperature_c: Vec<f64>,
    if_error_rate: Vec<f64>,
    if_utilization: Vec<f64>,
}

struct DeviceWindow {
    device: DeviceId,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    metrics: MetricWindow,
}

impl DeviceWindow {
    fn new(device: DeviceId, window_start: DateTime<Utc>, interval_secs: i64) -> Self {
        Self {
            device,
            window_start,
            window_end: window_start + ChronoDuration::seconds(interval_secs),
            metrics: MetricWindow::default(),
        }
    }

    fn record(&mut self, sample: &SnmpSample) {
        let m = &sample.metrics;
        if let Some(v) = m.cpu_util {
            self.metrics.cpu_util.push(v);
        }
        if let Some(v) = m.mem_util {
            self.metrics.mem_util.push(v);
        }
        if let Some(v) = m.temperature_c {
            self.metrics.temperature_c.push(v);
        }
        if let Some(v) = m.if_error_rate {
            self.metrics.if_error_rate.push(v);
        }
        if let Some(v) = m.if_utilization {
            self.metrics.if_utilization.push(v);
        }
    }

    fn close(&self, feature_means: &[f64; 8], counters: &Counters) -> SnmpFeatureVector {
        let mean_or_impute = |values: &[f64], idx: usize| -> f64 {
            if values.is_empty() {
                Counters::incr(&counters.snmp_imputations);
                feature_means[idx]
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let max_or_impute = |values: &[f64], idx: usize| -> f64 {
            if values.is_empty() {
                feature_means[idx]
            } else {
                values.iter().cloned().fold(f64::MIN, f64::max)
            }
        };

        let raw = [
            mean_or_impute(&self.metrics.cpu_util, 0),
            max_or_impute(&self.metrics.cpu_util, 1),
            mean_or_impute(&self.metrics.mem_util, 2),
            max_or_impute(&self.metrics.mem_util, 3),
            mean_or_impute(&self.metrics.temperature_c, 4),
            max_or_impute(&self.metrics.temperature_c, 5),
            mean_or_impute(&self.metrics.if_error_rate, 6),
            mean_or_impute(&self.metrics.if_utilization, 7),
        ];

        let values: Vec<f64> = raw
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let (lo, hi) = FEATURE_RANGES[i];
                v.clamp(lo, hi)
            })
            .collect();

        SnmpFeatureVector {
            ts: self.window_end,
            device: self.device.clone(),
            values,
            schema_hash: schema_hash(),
        }
    }
}

/// Accumulates SnmpSample records into per-device SnmpFeatureVectors over a
/// fixed sample interval. Missing metrics within a window are imputed to the
/// per-feature training mean once a model is loaded; before that, they
/// impute to zero (still counted as an imputation).
pub struct SnmpFeatureExtractor {
    interval_secs: i64,
    feature_means: [f64; 8],
    windows: HashMap<DeviceId, DeviceWindow>,
    counters: Arc<Counters>,
}

impl SnmpFeatureExtractor {
    pub fn new(interval_secs: u64, counters: Arc<Counters>) -> Self {
        Self {
            interval_secs: interval_secs as i64,
            feature_means: [0.0; 8],
            windows: HashMap::new(),
            counters,
        }
    }

    /// Replaces the per-feature imputation means, typically with the values
    /// recorded in the Isolation Forest model's metadata once it is loaded.
    pub fn set_feature_means(&mut self, means: [f64; 8]) {
        self.feature_means = means;
    }

    /// Ingest one sample. Returns any feature vectors that close as a
    /// consequence of this sample's timestamp advancing the device's window.
    pub fn ingest(&mut self, sample: SnmpSample) -> Vec<SnmpFeatureVector> {
        let device = sample.device.clone();
        let ts = sample.ts;
        let interval_secs = self.interval_secs;

        if !self.windows.contains_key(&device) {
            self.windows.insert(
                device.clone(),
                DeviceWindow::new(device.clone(), align_window_start(ts, interval_secs), interval_secs),
            );
        }

        let mut emitted = Vec::new();
        loop {
            let w = self.windows.get(&device).unwrap();
            if ts < w.window_end {
                break;
            }
            emitted.push(w.close(&self.feature_means, &self.counters));
            let next_start = w.window_end;
            self.windows.insert(
                device.clone(),
                DeviceWindow::new(device.clone(), next_start, interval_secs),
            );
        }

        self.windows.get_mut(&device).unwrap().record(&sample);
        emitted
    }

    /// Force-close any windows that have fully elapsed as of `now`, so a
    /// device that stops reporting does not silently withhold its last
    /// partial window forever.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Vec<SnmpFeatureVector> {
        let mut emitted = Vec::new();
        let interval_secs = self.interval_secs;
        for w in self.windows.values_mut() {
            while w.window_end <= now {
                emitted.push(w.close(&self.feature_means, &self.counters));
                let next_start = w.window_end;
                *w = DeviceWindow::new(w.device.clone(), next_start, interval_secs);
            }
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_common::types::SnmpMetrics;

    fn sample(ts: DateTime<Utc>, device: &str, cpu: Option<f64>) -> SnmpSample {
        SnmpSample {
            ts,
            device: device.to_string(),
            metrics: SnmpMetrics {
                cpu_util: cpu,
                mem_util: Some(40.0),
                temperature_c: Some(55.0),
                if_error_rate: Some(0.0),
                if_utilization: Some(10.0),
            },
        }
    }

    #[test]
    fn closes_window_on_boundary_crossing() {
        let counters = Arc::new(Counters::default());
        let mut ex = SnmpFeatureExtractor::new(60, counters);
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(ex.ingest(sample(t0, "tor-01", Some(20.0))).is_empty());
        let t1 = t0 + ChronoDuration::seconds(61);
        let closed = ex.ingest(sample(t1, "tor-01", Some(30.0)));
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].values[0], 20.0); // cpu_mean
        assert_eq!(closed[0].values[1], 20.0); // cpu_max
    }

    #[test]
    fn missing_metric_is_imputed_and_counted() {
        let counters = Arc::new(Counters::default());
        let mut ex = SnmpFeatureExtractor::new(60, counters.clone());
        ex.set_feature_means([42.0, 42.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        ex.ingest(sample(t0, "tor-01", None));
        let t1 = t0 + ChronoDuration::seconds(61);
        let closed = ex.ingest(sample(t1, "tor-01", Some(10.0)));
        assert_eq!(closed[0].values[0], 42.0);
        assert_eq!(
            counters.snmp_imputations.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn out_of_range_value_is_clamped() {
        let counters = Arc::new(Counters::default());
        let mut ex = SnmpFeatureExtractor::new(60, counters);
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        ex.ingest(sample(t0, "tor-01", Some(250.0)));
        let t1 = t0 + ChronoDuration::seconds(61);
        let closed = ex.ingest(sample(t1, "tor-01", Some(10.0)));
        assert_eq!(closed[0].values[0], 100.0);
        assert_eq!(closed[0].values[1], 100.0);
    }
}
