use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use sentinel_common::metrics::Counters;
use sentinel_common::types::SnmpFeatureVector;
use sentinel_snmp::{IsolationForestDetector, IsolationForestModel, IsolationNode, IsolationTree};
use std::sync::Arc;

fn single_split_tree(feature: usize, split: f64, low_size: usize, high_size: usize) -> IsolationTree {
    IsolationTree {
        root: IsolationNode::Internal {
            split_feature: feature,
            split_value: split,
            left: Box::new(IsolationNode::Leaf { size: low_size }),
            right: Box::new(IsolationNode::Leaf { size: high_size }),
        },
    }
}

/// A forest sized like a realistic deployment (spec §4.4 default
/// `n_estimators=100`), to measure `predict()`'s per-sample cost.
fn model(n_estimators: usize) -> IsolationForestModel {
    let trees = (0..n_estimators)
        .map(|i| single_split_tree(i % 8, 50.0 + (i % 5) as f64, 64, 1))
        .collect();
    IsolationForestModel {
        trees,
        sample_size: 256,
        schema_hash: sentinel_snmp::schema_hash(),
        feature_means: [30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 0.01, 20.0],
        feature_stds: [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 0.01, 10.0],
        contamination: 0.02,
        threshold: 0.6,
    }
}

fn vector() -> SnmpFeatureVector {
    SnmpFeatureVector {
        ts: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        device: "tor-01".to_string(),
        values: vec![62.0, 35.0, 40.0, 45.0, 50.0, 55.0, 0.08, 20.0],
        schema_hash: sentinel_snmp::schema_hash(),
    }
}

fn benchmark_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("isolation_forest_predict");
    for n_estimators in [10usize, 100, 300] {
        let detector = IsolationForestDetector::new(model(n_estimators), Arc::new(Counters::default()));
        let v = vector();
        group.bench_function(format!("n_estimators_{n_estimators}"), |b| {
            b.iter(|| detector.predict(&v).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_predict);
criterion_main!(benches);
