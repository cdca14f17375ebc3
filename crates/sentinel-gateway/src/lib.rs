//! Composition root: wires the Feature Aggregator + Matrix Profile detector,
//! the SNMP feature extractor + Isolation Forest detector, and the
//! Correlator into the three parallel tasks spec §5 describes, talking to
//! each other only through bounded channels and to the world only through
//! the `Boundary` trait.

pub mod cli;
pub mod health;

use chrono::Utc;
use sentinel_bgp::{FeatureAggregator, MatrixProfileDetector};
use sentinel_common::config::Config;
use sentinel_common::metrics::{ComponentHealth, Counters, HealthLevel};
use sentinel_common::types::{BgpAnomaly, EnrichedAlert, SnmpAnomaly};
use sentinel_correlator::Correlator;
use sentinel_ingest::Boundary;
use sentinel_snmp::{IsolationForestDetector, IsolationForestModel, SnmpFeatureExtractor};
use sentinel_topology::Topology;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::{mpsc, watch};
use tokio_stream::StreamExt;
use tracing::{info, warn};

pub use health::SharedHealth;

/// Everything the three pipeline tasks need, built once at startup and
/// shared by `Arc` thereafter (spec §5 "shared-immutable... no locks
/// required after load").
pub struct Gateway {
    pub config: Config,
    pub topology: Arc<Topology>,
    pub model: Option<IsolationForestModel>,
    pub counters: Arc<Counters>,
}

impl Gateway {
    pub fn new(config: Config, topology: Topology, model: Option<IsolationForestModel>) -> Self {
        Self {
            config,
            topology: Arc::new(topology),
            model,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Spawns the BGP detector, SNMP detector, and correlator tasks and
    /// runs them to completion. Returns once all three have drained and
    /// exited following `shutdown`, or once `boundary`'s streams end.
    pub async fn run(
        self,
        boundary: Arc<dyn Boundary>,
        mut shutdown: watch::Receiver<bool>,
        health: Option<SharedHealth>,
    ) -> anyhow::Result<()> {
        let channel_capacity = self.config.transport.channel_capacity;
        let (bgp_anomaly_tx, bgp_anomaly_rx) = mpsc::channel::<BgpAnomaly>(channel_capacity);
        let (snmp_anomaly_tx, snmp_anomaly_rx) = mpsc::channel::<SnmpAnomaly>(channel_capacity);

        let drain_deadline = StdDuration::from_secs(self.config.transport.shutdown_drain_secs);

        let bgp_handle = tokio::spawn(run_bgp_task(
            self.config.clone(),
            self.counters.clone(),
            boundary.clone(),
            bgp_anomaly_tx,
            shutdown.clone(),
            drain_deadline,
        ));

        let snmp_handle = tokio::spawn(run_snmp_task(
            self.config.clone(),
            self.counters.clone(),
            self.model.clone(),
            boundary.clone(),
            snmp_anomaly_tx,
            shutdown.clone(),
            drain_deadline,
        ));

        let correlator_handle = tokio::spawn(run_correlator_task(
            self.config.clone(),
            self.topology.clone(),
            self.counters.clone(),
            boundary.clone(),
            bgp_anomaly_rx,
            snmp_anomaly_rx,
            shutdown.clone(),
            drain_deadline,
        ));

        if let Some(health) = health {
            update_component(&health, "bgp_detector", HealthLevel::Healthy, "running").await;
            update_component(&health, "snmp_detector", HealthLevel::Healthy, "running").await;
            update_component(&health, "correlator", HealthLevel::Healthy, "running").await;
        }

        let _ = shutdown.changed().await;
        let (bgp_res, snmp_res, corr_res) =
            tokio::join!(bgp_handle, snmp_handle, correlator_handle);
        bgp_res?;
        snmp_res?;
        corr_res?;
        Ok(())
    }
}

async fn update_component(health: &SharedHealth, name: &str, status: HealthLevel, message: &str) {
    let mut guard = health.write().await;
    guard.components.insert(
        name.to_string(),
        ComponentHealth {
            status,
            message: message.to_string(),
            last_check: Utc::now(),
        },
    );
    guard.calculate_overall();
}

/// Feature Aggregator + Matrix Profile detector task (spec §4.1, §4.2,
/// §5 "one task"). Suspends only at channel receive and transport publish.
async fn run_bgp_task(
    config: Config,
    counters: Arc<Counters>,
    boundary: Arc<dyn Boundary>,
    anomaly_tx: mpsc::Sender<BgpAnomaly>,
    mut shutdown: watch::Receiver<bool>,
    drain_deadline: StdDuration,
) -> anyhow::Result<()> {
    let mut aggregator = FeatureAggregator::new(config.binning.bin_seconds, counters.clone());
    let mut detector = MatrixProfileDetector::new(
        config.binning.window_bins,
        config.thresholds.mp_discord,
        counters.clone(),
    );
    let mut updates = boundary.subscribe_bgp();
    let mut flush_tick = tokio::time::interval(StdDuration::from_secs(config.binning.bin_seconds));

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!(task = "bgp", "shutdown signal received, draining");
                break;
            }
            maybe_update = updates.next() => {
                match maybe_update {
                    Some(update) => {
                        for bin in aggregator.ingest(update) {
                            if let Some(anomaly) = detector.update(&bin) {
                                let _ = anomaly_tx.send(anomaly).await;
                            }
                        }
                    }
                    None => {
                        warn!(task = "bgp", "subscribe_bgp stream ended");
                        break;
                    }
                }
            }
            _ = flush_tick.tick() => {
                for bin in aggregator.flush(Utc::now()) {
                    if let Some(anomaly) = detector.update(&bin) {
                        let _ = anomaly_tx.send(anomaly).await;
                    }
                }
            }
        }
    }

    drain_with_deadline(&mut updates, drain_deadline, |update| {
        for bin in aggregator.ingest(update) {
            if let Some(anomaly) = detector.update(&bin) {
                let _ = anomaly_tx.try_send(anomaly);
            }
        }
    })
    .await;
    Ok(())
}

/// SNMP feature extraction + Isolation Forest detector task (spec §4.3,
/// §4.4). When no model is loaded (`--allow-bgp-only`), samples are still
/// windowed but no predictions are made; the correlator can still fire on
/// BGP-only events (spec §4.4 failure semantics).
async fn run_snmp_task(
    config: Config,
    counters: Arc<Counters>,
    model: Option<IsolationForestModel>,
    boundary: Arc<dyn Boundary>,
    anomaly_tx: mpsc::Sender<SnmpAnomaly>,
    mut shutdown: watch::Receiver<bool>,
    drain_deadline: StdDuration,
) -> anyhow::Result<()> {
    let mut extractor = SnmpFeatureExtractor::new(config.binning.snmp_interval_secs, counters.clone());
    let detector = model.map(|m| {
        extractor.set_feature_means(m.feature_means);
        IsolationForestDetector::new(m, counters.clone())
    });

    let mut samples = boundary.subscribe_snmp();
    let mut flush_tick =
        tokio::time::interval(StdDuration::from_secs(config.binning.snmp_interval_secs));

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!(task = "snmp", "shutdown signal received, draining");
                break;
            }
            maybe_sample = samples.next() => {
                match maybe_sample {
                    Some(sample) => {
                        let vectors = extractor.ingest(sample);
                        predict_all(detector.as_ref(), vectors, &anomaly_tx).await;
                    }
                    None => {
                        warn!(task = "snmp", "subscribe_snmp stream ended");
                        break;
                    }
                }
            }
            _ = flush_tick.tick() => {
                let vectors = extractor.flush(Utc::now());
                predict_all(detector.as_ref(), vectors, &anomaly_tx).await;
            }
        }
    }

    let deadline = tokio::time::Instant::now() + drain_deadline;
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(StdDuration::from_millis(50), samples.next()).await {
            Ok(Some(sample)) => {
                let vectors = extractor.ingest(sample);
                predict_all(detector.as_ref(), vectors, &anomaly_tx).await;
            }
            _ => break,
        }
    }
    let _ = boundary;
    Ok(())
}

async fn predict_all(
    detector: Option<&IsolationForestDetector>,
    vectors: Vec<sentinel_common::types::SnmpFeatureVector>,
    tx: &mpsc::Sender<SnmpAnomaly>,
) {
    let Some(detector) = detector else { return };
    for vector in vectors {
        match detector.predict(&vector) {
            Ok(Some(anomaly)) => {
                let _ = tx.send(anomaly).await;
            }
            Ok(None) => {}
            Err(e) => warn!(task = "snmp", error = %e, "prediction failed"),
        }
    }
}

/// Correlator task (spec §4.5, §5 "third task receiving anomalies from the
/// two detectors via bounded channels").
async fn run_correlator_task(
    config: Config,
    topology: Arc<Topology>,
    counters: Arc<Counters>,
    boundary: Arc<dyn Boundary>,
    mut bgp_anomaly_rx: mpsc::Receiver<BgpAnomaly>,
    mut snmp_anomaly_rx: mpsc::Receiver<SnmpAnomaly>,
    mut shutdown: watch::Receiver<bool>,
    drain_deadline: StdDuration,
) -> anyhow::Result<()> {
    let mut correlator = Correlator::new(
        topology,
        config.correlator.clone(),
        config.thresholds.correlation_window_secs,
        config.thresholds.cooldown_seconds,
        config.thresholds.spine_blast_threshold,
        config.thresholds.tor_blast_threshold,
        counters,
    );

    let housekeeping_period =
        StdDuration::from_secs(config.thresholds.correlation_window_secs.max(1));
    let mut housekeeping = tokio::time::interval(housekeeping_period);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!(task = "correlator", "shutdown signal received, draining");
                break;
            }
            maybe = bgp_anomaly_rx.recv() => {
                match maybe {
                    Some(anomaly) => {
                        if let Some(alert) = correlator.on_bgp_anomaly(anomaly) {
                            publish(&boundary, alert).await;
                        }
                    }
                    None => break,
                }
            }
            maybe = snmp_anomaly_rx.recv() => {
                match maybe {
                    Some(anomaly) => {
                        if let Some(alert) = correlator.on_snmp_anomaly(anomaly) {
                            publish(&boundary, alert).await;
                        }
                    }
                    None => break,
                }
            }
            _ = housekeeping.tick() => {
                for alert in correlator.tick(Utc::now()) {
                    publish(&boundary, alert).await;
                }
            }
        }
    }

    // Drain already-confirmed alerts only; in-flight armed states that
    // never confirm within the deadline are dropped without emission
    // (spec §5 "Cancellation & timeouts").
    let deadline = tokio::time::Instant::now() + drain_deadline;
    while tokio::time::Instant::now() < deadline {
        tokio::select! {
            maybe = bgp_anomaly_rx.recv() => {
                match maybe {
                    Some(anomaly) => {
                        if let Some(alert) = correlator.on_bgp_anomaly(anomaly) {
                            publish(&boundary, alert).await;
                        }
                    }
                    None => break,
                }
            }
            maybe = snmp_anomaly_rx.recv() => {
                match maybe {
                    Some(anomaly) => {
                        if let Some(alert) = correlator.on_snmp_anomaly(anomaly) {
                            publish(&boundary, alert).await;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep(StdDuration::from_millis(50)) => {}
        }
    }
    Ok(())
}

async fn publish(boundary: &Arc<dyn Boundary>, alert: EnrichedAlert) {
    if let Err(e) = boundary.publish_alert(alert).await {
        warn!(error = %e, "failed to publish alert");
    }
}

async fn drain_with_deadline<T>(
    stream: &mut (impl tokio_stream::Stream<Item = T> + Unpin),
    deadline: StdDuration,
    mut on_item: impl FnMut(T),
) {
    let until = tokio::time::Instant::now() + deadline;
    while tokio::time::Instant::now() < until {
        match tokio::time::timeout(StdDuration::from_millis(50), stream.next()).await {
            Ok(Some(item)) => on_item(item),
            _ => break,
        }
    }
}
