//! Isolation Forest Detector (spec §4.4): scores a feature vector against a
//! pre-trained, offline-built forest and emits an SnmpAnomaly when the
//! isolation-depth score clears the calibrated threshold.

use sentinel_common::error::{Error, Result};
use sentinel_common::metrics::Counters;
use sentinel_common::types::{Severity, SnmpAnomaly, SnmpFeatureVector, SNMP_FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationNode {
    Leaf { size: usize },
    Internal {
        split_feature: usize,
        split_value: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    pub root: IsolationNode,
}

impl IsolationTree {
    fn path_length(&self, x: &[f64]) -> f64 {
        path_length_from(&self.root, x, 0.0)
    }
}

fn path_length_from(node: &IsolationNode, x: &[f64], depth: f64) -> f64 {
    match node {
        IsolationNode::Leaf { size } => depth + average_path_length(*size),
        IsolationNode::Internal {
            split_feature,
            split_value,
            left,
            right,
        } => {
            if x[*split_feature] < *split_value {
                path_length_from(left, x, depth + 1.0)
            } else {
                path_length_from(right, x, depth + 1.0)
            }
        }
    }
}

/// c(n): average path length of an unsuccessful search in a binary search
/// tree over `n` points — the standard Isolation Forest normalizer.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * (harmonic(n - 1.0)) - (2.0 * (n - 1.0) / n)
}

fn harmonic(n: f64) -> f64 {
    // H(n) ~= ln(n) + gamma, the Euler-Mascheroni constant.
    n.ln() + 0.5772156649
}

/// An opaque, offline-trained model loaded from disk at startup (spec §4.4,
/// §6 "--model"). Training itself is out of scope (spec §1 Non-goals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForestModel {
    pub trees: Vec<IsolationTree>,
    pub sample_size: usize,
    pub schema_hash: String,
    pub feature_means: [f64; 8],
    pub feature_stds: [f64; 8],
    pub contamination: f64,
    pub threshold: f64,
}

impl IsolationForestModel {
    pub fn load(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::ModelLoad(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::ModelLoad(e.to_string()))
    }

    fn score(&self, values: &[f64]) -> f64 {
        let avg_path = self
            .trees
            .iter()
            .map(|t| t.path_length(values))
            .sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.0;
        }
        2f64.powf(-avg_path / c)
    }

    /// Returns the `k <= 5` features with the largest |z-score| magnitude,
    /// formatted as `"name=+z.zz"` (spec §4.4 "contributing_features").
    fn top_features(&self, values: &[f64]) -> Vec<String> {
        let mut zscored: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let std = self.feature_stds[i];
                let z = if std > 1e-9 {
                    (v - self.feature_means[i]) / std
                } else {
                    0.0
                };
                (i, z)
            })
            .collect();
        zscored.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap());
        zscored
            .into_iter()
            .take(5)
            .map(|(i, z)| format!("{}={:+.2}", SNMP_FEATURE_NAMES[i], z))
            .collect()
    }
}

/// Detector wrapping a loaded model with the shared severity-mapping rule
/// (spec §4.4 "deterministic severity mapping").
pub struct IsolationForestDetector {
    model: IsolationForestModel,
    counters: Arc<Counters>,
}

impl IsolationForestDetector {
    pub fn new(model: IsolationForestModel, counters: Arc<Counters>) -> Self {
        Self { model, counters }
    }

    /// `predict(vector) -> Option<SnmpAnomaly>` (spec §4.4 public operation).
    /// A schema mismatch between the vector and the model is reported as
    /// `Error::SchemaMismatch`; callers treat it as the local, non-fatal
    /// drop-and-count case spec §7 item 5 describes, not a propagating
    /// failure.
    pub fn predict(&self, vector: &SnmpFeatureVector) -> Result<Option<SnmpAnomaly>> {
        if vector.schema_hash != self.model.schema_hash {
            Counters::incr(&self.counters.schema_mismatches);
            return Err(Error::SchemaMismatch {
                expected: self.model.schema_hash.clone(),
                actual: vector.schema_hash.clone(),
            });
        }

        let score = self.model.score(&vector.values);
        let delta = score - self.model.threshold;

        let severity = if delta >= 0.15 {
            Severity::Critical
        } else if delta >= 0.07 {
            Severity::Error
        } else if delta >= 0.0 {
            Severity::Warning
        } else {
            return Ok(None);
        };

        Ok(Some(SnmpAnomaly {
            ts: vector.ts,
            device: vector.device.clone(),
            confidence: score.clamp(0.0, 1.0),
            severity,
            contributing_features: self.model.top_features(&vector.values),
            score,
        }))
    }

    pub fn feature_means(&self) -> [f64; 8] {
        self.model.feature_means
    }
}
