use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sentinel_bgp::MatrixProfileDetector;
use sentinel_common::metrics::Counters;
use sentinel_common::types::FeatureBin;
use std::sync::Arc;

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

/// Steady-state cost of `update()` once the ring is warmed up and full
/// (spec §4.2 "O(window_bins^2) per update").
fn benchmark_steady_state_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_profile_update");
    for window_bins in [8usize, 32, 64] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("window_bins", window_bins),
            &window_bins,
            |b, &window_bins| {
                let mut detector =
                    MatrixProfileDetector::new(window_bins, 2.5, Arc::new(Counters::default()));
                for i in 0..(window_bins * 3) {
                    detector.update(&bin_with("spine-01", (i % 7) as u64, 1_700_000_000 + i as i64 * 30));
                }
                let mut t = 1_700_000_000 + (window_bins as i64 * 3) * 30;
                b.iter(|| {
                    t += 30;
                    detector.update(&bin_with("spine-01", (t % 11) as u64, t))
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_steady_state_update);
criterion_main!(benches);
