//! End-to-end seed scenarios over the full wiring (spec §8 "seed tests"),
//! driven through the in-process transport exactly as a real adapter would
//! feed the core. Event timestamps are anchored to `Utc::now()` (not a
//! fixed historical instant) since the correlator's housekeeping tick
//! compares armed-state windows against wall-clock time, matching how a
//! live deployment always sees timestamps close to "now".

use chrono::{Duration as ChronoDuration, Utc};
use sentinel_common::config::{BinningConfig, Config, CorrelatorConfig, ThresholdsConfig, TransportConfig};
use sentinel_common::metrics::Counters;
use sentinel_common::types::{BgpMessageKind, BgpUpdate, SnmpMetrics, SnmpSample};
use sentinel_gateway::Gateway;
use sentinel_ingest::InProcessBoundary;
use sentinel_snmp::{IsolationForestModel, IsolationNode, IsolationTree};
use sentinel_topology::load_from_str;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const TOPOLOGY: &str = r#"
devices:
  spine-01: { role: spine, neighbors: [tor-01, tor-02, tor-03, tor-04, tor-05,
                                        tor-06, tor-07, tor-08, tor-09, tor-10,
                                        tor-11, tor-12], priority: critical }
  tor-01: { role: tor, neighbors: [spine-01], priority: high }
  tor-02: { role: tor, neighbors: [spine-01], priority: high }
  tor-03: { role: tor, neighbors: [spine-01], priority: high }
  tor-04: { role: tor, neighbors: [spine-01], priority: high }
  tor-05: { role: tor, neighbors: [spine-01], priority: high }
  tor-06: { role: tor, neighbors: [spine-01], priority: high }
  tor-07: { role: tor, neighbors: [spine-01], priority: high }
  tor-08: { role: tor, neighbors: [spine-01], priority: high }
  tor-09: { role: tor, neighbors: [spine-01], priority: high }
  tor-10: { role: tor, neighbors: [spine-01], priority: high }
  tor-11: { role: tor, neighbors: [spine-01], priority: high }
  tor-12: { role: tor, neighbors: [spine-01], priority: high }
  server-01: { role: server, neighbors: [], priority: low }
bgp_peers: []
"#;

fn test_config() -> Config {
    Config {
        binning: BinningConfig {
            bin_seconds: 1,
            window_bins: 4,
            snmp_interval_secs: 1,
        },
        thresholds: ThresholdsConfig {
            mp_discord: 2.5,
            if_contamination: 0.02,
            correlation_window_secs: 5,
            cooldown_seconds: 4,
            spine_blast_threshold: 12,
            tor_blast_threshold: 4,
        },
        correlator: CorrelatorConfig::default(),
        transport: TransportConfig {
            base_delay_ms: 50,
            max_delay_secs: 1,
            transport_fatal_after_secs: 10,
            shutdown_drain_secs: 1,
            channel_capacity: 1024,
        },
    }
}

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

/// A model that flags elevated `if_error_rate` (feature index 6) as an
/// outlier, matching the S1 scenario's raised error rate.
fn if_error_model() -> IsolationForestModel {
    IsolationForestModel {
        trees: vec![
            single_split_tree(6, 0.2, 64, 1),
            single_split_tree(6, 0.18, 64, 1),
            single_split_tree(6, 0.22, 64, 1),
        ],
        sample_size: 256,
        schema_hash: sentinel_snmp::schema_hash(),
        feature_means: [30.0, 40.0, 40.0, 50.0, 50.0, 60.0, 0.02, 20.0],
        feature_stds: [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 0.05, 10.0],
        contamination: 0.02,
        threshold: 0.6,
    }
}

fn bgp_update(ts: chrono::DateTime<Utc>, peer: &str, withdraw_count: usize) -> BgpUpdate {
    BgpUpdate {
        ts,
        peer: peer.to_string(),
        kind: BgpMessageKind::Withdraw,
        announce: vec![],
        withdraw: (0..withdraw_count).map(|i| format!("10.0.{i}.0/24")).collect(),
        as_path: vec![65000 + withdraw_count as u32],
        next_hop: None,
    }
}

fn snmp_sample(ts: chrono::DateTime<Utc>, device: &str, if_error_rate: f64) -> SnmpSample {
    SnmpSample {
        ts,
        device: device.to_string(),
        metrics: SnmpMetrics {
            cpu_util: Some(30.0),
            mem_util: Some(40.0),
            temperature_c: Some(50.0),
            if_error_rate: Some(if_error_rate),
            if_utilization: Some(20.0),
        },
    }
}

/// Feeds 12 flat baseline bins (clears the 2*window_bins warmup floor)
/// followed by a withdrawal-burst bin, then one more update to close it.
/// Returns the `ts` of the anomalous bin's end.
async fn warm_up_then_spike_bgp(
    bgp_tx: &tokio::sync::mpsc::Sender<BgpUpdate>,
    device: &str,
    t0: chrono::DateTime<Utc>,
) -> chrono::DateTime<Utc> {
    for k in 0..13i64 {
        bgp_tx
            .send(bgp_update(t0 + ChronoDuration::seconds(k), device, 2))
            .await
            .unwrap();
    }
    let spike_bin_end = t0 + ChronoDuration::seconds(14);
    bgp_tx
        .send(bgp_update(t0 + ChronoDuration::seconds(13), device, 47))
        .await
        .unwrap();
    bgp_tx
        .send(bgp_update(spike_bin_end, device, 0))
        .await
        .unwrap();
    spike_bin_end
}

/// Closes one SNMP sample window centered on `anomalous_ts`, returning an
/// anomaly whose `ts` lands at the window boundary.
async fn snmp_window_at(
    snmp_tx: &tokio::sync::mpsc::Sender<SnmpSample>,
    device: &str,
    anomalous_ts: chrono::DateTime<Utc>,
    if_error_rate: f64,
) {
    snmp_tx
        .send(snmp_sample(anomalous_ts, device, if_error_rate))
        .await
        .unwrap();
    snmp_tx
        .send(snmp_sample(
            anomalous_ts + ChronoDuration::milliseconds(1200),
            device,
            if_error_rate,
        ))
        .await
        .unwrap();
}

/// S1 — multimodal link failure on spine-01: a burst of BGP withdrawals
/// correlated with a raised interface error rate on the same device.
#[tokio::test]
async fn s1_multimodal_link_failure_on_spine() {
    let config = test_config();
    let topology = load_from_str(TOPOLOGY).unwrap();
    let counters = Arc::new(Counters::default());
    let gateway = Gateway {
        config: config.clone(),
        topology: Arc::new(topology),
        model: Some(if_error_model()),
        counters: counters.clone(),
    };

    let (boundary, producers, mut published_rx) =
        InProcessBoundary::new(config.transport.clone(), counters);
    let boundary: Arc<dyn sentinel_ingest::Boundary> = Arc::new(boundary);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_handle = tokio::spawn(gateway.run(boundary, shutdown_rx, None));

    let t0 = Utc::now();
    let spike_ts = warm_up_then_spike_bgp(&producers.bgp_tx, "spine-01", t0).await;
    snmp_window_at(&producers.snmp_tx, "spine-01", spike_ts, 0.45).await;

    let alert = tokio::time::timeout(Duration::from_secs(10), published_rx.recv())
        .await
        .expect("alert should be published within the correlation window")
        .expect("channel should not close");

    assert_eq!(alert.triage.device, "spine-01");
    assert_eq!(alert.triage.role, sentinel_common::types::Role::Spine);
    assert!(alert.triage.blast_radius >= config.thresholds.spine_blast_threshold);
    assert_eq!(alert.correlated.join_kind, sentinel_common::types::JoinKind::Multimodal);
    assert_eq!(alert.kind, sentinel_common::types::FailureKind::LinkFailure);
    assert_eq!(alert.priority, sentinel_common::types::AlertPriority::P1);
    assert!(alert.evidence.iter().any(|e| e == "withdrawals"));
    assert!(alert.evidence.iter().any(|e| e.starts_with("if_error_rate")));

    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(2), run_handle).await;
}

/// S6 — an anomaly for a device absent from the topology resolves to
/// `role=unknown`, `blast_radius=1`, `priority=P3` rather than failing.
#[tokio::test]
async fn s6_topology_miss_degrades_gracefully() {
    let config = test_config();
    let topology = load_from_str(TOPOLOGY).unwrap();
    let counters = Arc::new(Counters::default());
    let gateway = Gateway {
        config: config.clone(),
        topology: Arc::new(topology),
        model: None,
        counters: counters.clone(),
    };

    let (boundary, producers, mut published_rx) =
        InProcessBoundary::new(config.transport.clone(), counters);
    let boundary: Arc<dyn sentinel_ingest::Boundary> = Arc::new(boundary);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_handle = tokio::spawn(gateway.run(boundary, shutdown_rx, None));

    let t0 = Utc::now();
    warm_up_then_spike_bgp(&producers.bgp_tx, "ghost-99", t0).await;

    let alert = tokio::time::timeout(Duration::from_secs(10), published_rx.recv())
        .await
        .expect("single-source alert should fire on window expiry")
        .expect("channel should not close");

    assert_eq!(alert.triage.role, sentinel_common::types::Role::Unknown);
    assert_eq!(alert.triage.blast_radius, 1);
    assert_eq!(alert.priority, sentinel_common::types::AlertPriority::P3);
    assert_eq!(alert.correlated.join_kind, sentinel_common::types::JoinKind::BgpOnly);

    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(2), run_handle).await;
}

/// S5 — dedup under repeated anomaly: feeding the same multimodal inputs
/// across consecutive cooldown windows yields one alert per window.
#[tokio::test]
async fn s5_dedup_across_cooldown_windows() {
    let mut config = test_config();
    config.thresholds.cooldown_seconds = 1;
    let topology = load_from_str(TOPOLOGY).unwrap();
    let counters = Arc::new(Counters::default());
    let gateway = Gateway {
        config: config.clone(),
        topology: Arc::new(topology),
        model: Some(if_error_model()),
        counters: counters.clone(),
    };

    let (boundary, producers, mut published_rx) =
        InProcessBoundary::new(config.transport.clone(), counters);
    let boundary: Arc<dyn sentinel_ingest::Boundary> = Arc::new(boundary);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_handle = tokio::spawn(gateway.run(boundary, shutdown_rx, None));

    let mut seen_ids = std::collections::HashSet::new();
    for round in 0..2 {
        let t0 = Utc::now() + ChronoDuration::seconds(round * 20);
        let spike_ts = warm_up_then_spike_bgp(&producers.bgp_tx, "spine-01", t0).await;
        snmp_window_at(&producers.snmp_tx, "spine-01", spike_ts, 0.45).await;

        let alert = tokio::time::timeout(Duration::from_secs(10), published_rx.recv())
            .await
            .expect("alert should be published each round")
            .expect("channel should not close");
        assert!(seen_ids.insert(alert.alert_id));
        assert_eq!(alert.triage.device, "spine-01");

        // Wait out the cooldown before the next round's anomalies arrive.
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    assert_eq!(seen_ids.len(), 2);

    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(2), run_handle).await;
}
