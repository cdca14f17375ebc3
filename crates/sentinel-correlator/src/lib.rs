//! Multi-modal event correlation and topology triage (spec §4.5).
//!
//! Owns all per-(device) correlation state; BGP and SNMP detectors feed it
//! anomalies through typed calls rather than shared mutable state. The
//! dedup/cooldown key the spec defines as `(device, kind)` is tracked here
//! per device, since `kind` is only known once an alert is actually
//! classified — see `DESIGN.md` for the reasoning.

mod classify;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sentinel_common::config::CorrelatorConfig;
use sentinel_common::metrics::Counters;
use sentinel_common::types::{
    AlertPriority, BgpAnomaly, CorrelatedEvent, DeviceId, EnrichedAlert, FailureKind, JoinKind,
    Role, Severity, SnmpAnomaly, SourceAnomaly, Triage,
};
use sentinel_topology::Topology;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modality {
    Bgp,
    Snmp,
}

struct ArmedState {
    window_start: DateTime<Utc>,
    modality: Modality,
    bgp: Vec<BgpAnomaly>,
    snmp: Vec<SnmpAnomaly>,
}

impl ArmedState {
    fn from_bgp(a: BgpAnomaly) -> Self {
        Self {
            window_start: a.ts,
            modality: Modality::Bgp,
            bgp: vec![a],
            snmp: Vec::new(),
        }
    }

    fn from_snmp(a: SnmpAnomaly) -> Self {
        Self {
            window_start: a.ts,
            modality: Modality::Snmp,
            bgp: Vec::new(),
            snmp: vec![a],
        }
    }

    fn latest_bgp(&self) -> Option<&BgpAnomaly> {
        self.bgp.last()
    }

    fn latest_snmp(&self) -> Option<&SnmpAnomaly> {
        self.snmp.last()
    }
}

/// Owns every per-device correlation state machine plus the dedup/cooldown
/// table. Not `Send`-shared: one correlator task owns this exclusively
/// (spec §5 "Correlator state is owned by the correlator task").
pub struct Correlator {
    topology: Arc<Topology>,
    config: CorrelatorConfig,
    correlation_window: ChronoDuration,
    cooldown: ChronoDuration,
    spine_blast_threshold: usize,
    tor_blast_threshold: usize,
    armed: HashMap<DeviceId, ArmedState>,
    cooldowns: HashMap<DeviceId, (DateTime<Utc>, FailureKind)>,
    counters: Arc<Counters>,
}

impl Correlator {
    pub fn new(
        topology: Arc<Topology>,
        config: CorrelatorConfig,
        correlation_window_secs: u64,
        cooldown_seconds: u64,
        spine_blast_threshold: usize,
        tor_blast_threshold: usize,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            topology,
            config,
            correlation_window: ChronoDuration::seconds(correlation_window_secs as i64),
            cooldown: ChronoDuration::seconds(cooldown_seconds as i64),
            spine_blast_threshold,
            tor_blast_threshold,
            armed: HashMap::new(),
            cooldowns: HashMap::new(),
            counters,
        }
    }

    pub fn on_bgp_anomaly(&mut self, anomaly: BgpAnomaly) -> Option<EnrichedAlert> {
        self.ingest(anomaly.device.clone(), anomaly.ts, Modality::Bgp, SourceAnomaly::Bgp(anomaly))
    }

    pub fn on_snmp_anomaly(&mut self, anomaly: SnmpAnomaly) -> Option<EnrichedAlert> {
        self.ingest(anomaly.device.clone(), anomaly.ts, Modality::Snmp, SourceAnomaly::Snmp(anomaly))
    }

    fn ingest(
        &mut self,
        device: DeviceId,
        ts: DateTime<Utc>,
        modality: Modality,
        anomaly: SourceAnomaly,
    ) -> Option<EnrichedAlert> {
        if let Some((until, _)) = self.cooldowns.get(&device) {
            if ts < *until {
                Counters::incr(&self.counters.dedup_suppressed);
                return None;
            }
            self.cooldowns.remove(&device);
        }

        if let Some(armed) = self.armed.get_mut(&device) {
            if ts - armed.window_start > self.correlation_window {
                // Stale armed state the housekeeping tick hasn't swept yet;
                // treat this anomaly as the start of a fresh arm.
                self.armed.remove(&device);
            } else if armed.modality != modality {
                let armed = self.armed.remove(&device).unwrap();
                return Some(self.confirm(device, armed, modality, anomaly, ts, 0.0));
            } else {
                match anomaly {
                    SourceAnomaly::Bgp(a) => armed.bgp.push(a),
                    SourceAnomaly::Snmp(a) => armed.snmp.push(a),
                }
                return None;
            }
        }

        if self.config.adjacency_hops >= 1 {
            if let Some(alert) = self.try_adjacent_confirm(&device, modality, &anomaly, ts) {
                return Some(alert);
            }
        }

        let state = match anomaly {
            SourceAnomaly::Bgp(a) => ArmedState::from_bgp(a),
            SourceAnomaly::Snmp(a) => ArmedState::from_snmp(a),
        };
        self.armed.insert(device, state);
        None
    }

    /// Checks whether any 1-hop neighbor of `device` is armed with the
    /// opposite modality inside the correlation window, and if so confirms
    /// that neighbor's incident using this anomaly as cross-modal evidence
    /// (spec §4.5 "Adjacent device... joinable").
    fn try_adjacent_confirm(
        &mut self,
        device: &str,
        modality: Modality,
        anomaly: &SourceAnomaly,
        ts: DateTime<Utc>,
    ) -> Option<EnrichedAlert> {
        let neighbor = self
            .topology
            .neighbors(device)
            .find(|n| {
                self.armed
                    .get(n.as_str())
                    .map(|a| a.modality != modality && ts - a.window_start <= self.correlation_window)
                    .unwrap_or(false)
            })
            .cloned()?;
        let armed = self.armed.remove(&neighbor).unwrap();
        Some(self.confirm(neighbor, armed, modality, anomaly.clone(), ts, self.config.w_adj))
    }

    /// `Armed -> Confirmed -> Emitted(multimodal)` (spec §4.5).
    fn confirm(
        &mut self,
        device: DeviceId,
        armed: ArmedState,
        incoming_modality: Modality,
        incoming: SourceAnomaly,
        ts: DateTime<Utc>,
        adjacency_bonus: f64,
    ) -> EnrichedAlert {
        let (bgp, snmp) = match incoming_modality {
            Modality::Bgp => (Some(into_bgp(incoming)), armed.snmp.last().cloned()),
            Modality::Snmp => (armed.bgp.last().cloned(), Some(into_snmp(incoming))),
        };

        let delta_t = (ts - armed.window_start).num_milliseconds().max(0) as f64 / 1000.0;
        let mean_conf = mean_confidence(bgp.as_ref(), snmp.as_ref());
        let strength = classify::correlation_strength(
            self.config.w_time,
            self.config.w_conf,
            self.config.w_adj,
            delta_t,
            self.correlation_window.num_seconds() as f64,
            mean_conf,
            adjacency_bonus,
        );

        self.emit(
            device,
            JoinKind::Multimodal,
            strength,
            armed.window_start,
            ts,
            bgp,
            snmp,
            armed.bgp.len().max(1),
        )
    }

    /// Force-expire armed states whose window has elapsed, emitting a
    /// single-source alert for any that clear the minimum severity/
    /// confidence bar (spec §4.5 "Armed -> Emitted(single_source)").
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<EnrichedAlert> {
        let expired: Vec<DeviceId> = self
            .armed
            .iter()
            .filter(|(_, a)| now - a.window_start > self.correlation_window)
            .map(|(d, _)| d.clone())
            .collect();

        let mut emitted = Vec::new();
        for device in expired {
            let armed = self.armed.remove(&device).unwrap();
            if let Some(alert) = self.emit_single_source_if_qualifies(device, armed) {
                emitted.push(alert);
            }
        }
        emitted
    }

    fn emit_single_source_if_qualifies(
        &mut self,
        device: DeviceId,
        armed: ArmedState,
    ) -> Option<EnrichedAlert> {
        let qualifies = match armed.modality {
            Modality::Snmp => armed
                .latest_snmp()
                .map(|s| s.severity >= self.config.single_source_snmp_min_severity)
                .unwrap_or(false),
            Modality::Bgp => armed
                .latest_bgp()
                .map(|b| b.confidence >= self.config.single_source_bgp_min_confidence)
                .unwrap_or(false),
        };
        if !qualifies {
            return None;
        }

        let (bgp, snmp, conf, join_kind, repeats) = match armed.modality {
            Modality::Bgp => {
                let b = armed.latest_bgp().cloned().unwrap();
                let conf = b.confidence;
                (Some(b), None, conf, JoinKind::BgpOnly, armed.bgp.len())
            }
            Modality::Snmp => {
                let s = armed.latest_snmp().cloned().unwrap();
                let conf = s.confidence;
                (None, Some(s), conf, JoinKind::SnmpOnly, 1)
            }
        };

        Some(self.emit(
            device,
            join_kind,
            conf.clamp(0.0, 1.0),
            armed.window_start,
            armed.window_start + self.correlation_window,
            bgp,
            snmp,
            repeats,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &mut self,
        device: DeviceId,
        join_kind: JoinKind,
        strength: f64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        bgp: Option<BgpAnomaly>,
        snmp: Option<SnmpAnomaly>,
        bgp_repeat_count: usize,
    ) -> EnrichedAlert {
        let kind = classify::classify(bgp.as_ref(), snmp.as_ref(), bgp_repeat_count);
        let severity = classify::overall_severity(bgp.as_ref(), snmp.as_ref());

        let known = self.topology.contains(&device);
        let (role, blast_radius, affected_layers, spof, priority) = if known {
            let role = self.topology.role(&device);
            let blast_radius = self.topology.blast_radius(&device);
            let affected_layers = self.topology.affected_layers(&device);
            let spof = self.topology.is_spof(&device);
            let priority = classify::priority(
                role,
                blast_radius,
                join_kind,
                severity,
                self.spine_blast_threshold,
                self.tor_blast_threshold,
            );
            (role, blast_radius, affected_layers, spof, priority)
        } else {
            Counters::incr(&self.counters.topology_unknown_device);
            let mut layers = BTreeSet::new();
            layers.insert(sentinel_common::types::Layer::Server);
            (Role::Unknown, 1, layers, false, AlertPriority::P3)
        };

        let redundancy = if spof {
            "single-homed".to_string()
        } else if known {
            "redundant".to_string()
        } else {
            "unknown".to_string()
        };

        let evidence = build_evidence(bgp.as_ref(), snmp.as_ref());
        let confidence = strength.clamp(0.0, 1.0);

        self.cooldowns.insert(device.clone(), (window_end + self.cooldown, kind));

        EnrichedAlert {
            alert_id: Uuid::new_v4(),
            ts: window_end,
            kind,
            severity,
            priority,
            confidence,
            correlated: CorrelatedEvent {
                device: device.clone(),
                join_kind,
                strength,
                window_start,
                window_end,
                bgp,
                snmp,
            },
            triage: Triage {
                device: device.clone(),
                role,
                blast_radius,
                affected_layers,
                spof,
                redundancy,
            },
            probable_root_cause: root_cause(kind, &device),
            evidence,
            recommended_actions: recommended_actions(kind),
            estimated_resolution: estimated_resolution(kind, severity),
        }
    }
}

fn into_bgp(a: SourceAnomaly) -> BgpAnomaly {
    match a {
        SourceAnomaly::Bgp(b) => b,
        SourceAnomaly::Snmp(_) => unreachable!("modality mismatch in confirm()"),
    }
}

fn into_snmp(a: SourceAnomaly) -> SnmpAnomaly {
    match a {
        SourceAnomaly::Snmp(s) => s,
        SourceAnomaly::Bgp(_) => unreachable!("modality mismatch in confirm()"),
    }
}

fn mean_confidence(bgp: Option<&BgpAnomaly>, snmp: Option<&SnmpAnomaly>) -> f64 {
    match (bgp, snmp) {
        (Some(b), Some(s)) => (b.confidence + s.confidence) / 2.0,
        (Some(b), None) => b.confidence,
        (None, Some(s)) => s.confidence,
        (None, None) => 0.0,
    }
}

fn build_evidence(bgp: Option<&BgpAnomaly>, snmp: Option<&SnmpAnomaly>) -> Vec<String> {
    let mut evidence = Vec::new();
    if let Some(b) = bgp {
        for series in &b.detected_series {
            evidence.push(series.to_string());
        }
    }
    if let Some(s) = snmp {
        evidence.extend(s.contributing_features.iter().cloned());
    }
    evidence
}

fn root_cause(kind: FailureKind, device: &str) -> String {
    match kind {
        FailureKind::LinkFailure => {
            format!("correlated BGP withdrawal burst and interface error rate on {device} point to a failing link")
        }
        FailureKind::HardwareDegradation => {
            format!("rising temperature/CPU on {device} with no BGP impact suggests hardware stress")
        }
        FailureKind::BgpFlapping => {
            format!("repeated BGP churn on {device} with stable SNMP baseline suggests route flapping")
        }
        FailureKind::RouterOverload => {
            format!("elevated CPU/memory on {device} coincident with BGP churn suggests control-plane overload")
        }
        FailureKind::UnclassifiedAnomaly => {
            format!("anomalous behavior on {device} did not match a known failure pattern")
        }
    }
}

fn recommended_actions(kind: FailureKind) -> Vec<String> {
    match kind {
        FailureKind::LinkFailure => vec![
            "inspect physical/optical link status".to_string(),
            "check upstream and downstream interface counters".to_string(),
        ],
        FailureKind::HardwareDegradation => vec![
            "check chassis environmentals and fan status".to_string(),
            "schedule hardware inspection".to_string(),
        ],
        FailureKind::BgpFlapping => vec![
            "review peer session stability and dampening policy".to_string(),
        ],
        FailureKind::RouterOverload => vec![
            "review control-plane policing and process load".to_string(),
        ],
        FailureKind::UnclassifiedAnomaly => vec!["investigate device logs manually".to_string()],
    }
}

fn estimated_resolution(kind: FailureKind, severity: Severity) -> String {
    let base = match kind {
        FailureKind::LinkFailure => "15-30m",
        FailureKind::HardwareDegradation => "1-4h",
        FailureKind::BgpFlapping => "30-60m",
        FailureKind::RouterOverload => "30-60m",
        FailureKind::UnclassifiedAnomaly => "unknown",
    };
    format!("{base} ({severity})")
}
