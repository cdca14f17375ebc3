//! Core data model shared by every stage of the pipeline (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type DeviceId = String;
pub type PeerId = String;

/// A device's position in the fabric, used to derive criticality and
/// affected layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Spine,
    Tor,
    Leaf,
    Server,
    Rr,
    Edge,
    /// Assigned when a device id is not present in the loaded topology
    /// (spec §4.5 failure semantics, §7 item 7).
    #[serde(skip)]
    Unknown,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Spine => "spine",
            Role::Tor => "tor",
            Role::Leaf => "leaf",
            Role::Server => "server",
            Role::Rr => "rr",
            Role::Edge => "edge",
            Role::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// A coarse priority a device's role is configured with in the topology
/// file; distinct from `AlertPriority` below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePriority {
    Critical,
    High,
    Medium,
    Low,
}

/// The fabric layer a device belongs to, derived from its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Spine,
    Tor,
    Leaf,
    Server,
}

/// BGP message kinds (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BgpMessageKind {
    Update,
    Withdraw,
    Notification,
    Keepalive,
}

/// One decoded BGP update record, as handed to the core by the ingress
/// boundary. Not stored; consumed once by the feature aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgpUpdate {
    pub ts: DateTime<Utc>,
    pub peer: PeerId,
    #[serde(rename = "type")]
    pub kind: BgpMessageKind,
    pub announce: Vec<String>,
    pub withdraw: Vec<String>,
    pub as_path: Vec<u32>,
    pub next_hop: Option<String>,
}

/// One FeatureBin per device per completed time bin (spec §3, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureBin {
    pub device: DeviceId,
    pub bin_start: DateTime<Utc>,
    pub bin_end: DateTime<Utc>,
    pub withdrawals_total: u64,
    pub announcements_total: u64,
    /// Fraction of distinct AS-path strings over update count, in [0, 1].
    pub as_path_churn: f64,
    pub peer_count: u32,
}

impl FeatureBin {
    pub fn empty(device: DeviceId, bin_start: DateTime<Utc>, bin_end: DateTime<Utc>) -> Self {
        Self {
            device,
            bin_start,
            bin_end,
            withdrawals_total: 0,
            announcements_total: 0,
            as_path_churn: 0.0,
            peer_count: 0,
        }
    }
}

/// One raw SNMP sample (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpSample {
    pub ts: DateTime<Utc>,
    pub device: DeviceId,
    pub metrics: SnmpMetrics,
}

/// Named SNMP metrics for one sample. Any field may be absent (sensor
/// outage, polling miss) — the feature extractor imputes missing values to
/// the per-feature training mean recorded in the Isolation Forest model's
/// metadata (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SnmpMetrics {
    pub cpu_util: Option<f64>,
    pub mem_util: Option<f64>,
    pub temperature_c: Option<f64>,
    pub if_error_rate: Option<f64>,
    pub if_utilization: Option<f64>,
}

/// Fixed-schema feature names, in the order they appear in
/// `SnmpFeatureVector::values` and in the Isolation Forest model.
pub const SNMP_FEATURE_NAMES: [&str; 8] = [
    "cpu_mean",
    "cpu_max",
    "mem_mean",
    "mem_max",
    "temp_mean",
    "temp_max",
    "if_error_rate",
    "if_utilization",
];

/// A fixed-length, schema-versioned feature vector over one sample
/// interval for one device (spec §3, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpFeatureVector {
    pub ts: DateTime<Utc>,
    pub device: DeviceId,
    pub values: Vec<f64>,
    pub schema_hash: String,
}

/// Severity bucket, shared between SNMP anomalies and enriched alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Alert priority, deterministic function of (role, blast_radius, join_kind,
/// severity) per spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertPriority {
    P4 = 1,
    P3 = 2,
    P2 = 3,
    P1 = 4,
}

impl std::fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertPriority::P1 => "P1",
            AlertPriority::P2 => "P2",
            AlertPriority::P3 => "P3",
            AlertPriority::P4 => "P4",
        };
        write!(f, "{s}")
    }
}

/// BGP series monitored by the Matrix Profile detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BgpSeries {
    Withdrawals,
    Announcements,
    Churn,
}

impl std::fmt::Display for BgpSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BgpSeries::Withdrawals => "withdrawals",
            BgpSeries::Announcements => "announcements",
            BgpSeries::Churn => "as_path_churn",
        };
        write!(f, "{s}")
    }
}

/// Emitted by the Matrix Profile detector (spec §3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgpAnomaly {
    pub ts: DateTime<Utc>,
    pub device: DeviceId,
    pub confidence: f64,
    pub detected_series: Vec<BgpSeries>,
    pub min_distance: f64,
    pub per_series_distance: Vec<(BgpSeries, f64)>,
}

/// Emitted by the Isolation Forest detector (spec §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpAnomaly {
    pub ts: DateTime<Utc>,
    pub device: DeviceId,
    pub confidence: f64,
    pub severity: Severity,
    pub contributing_features: Vec<String>,
    pub score: f64,
}

/// Either side of a correlated event, kept for evidence assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceAnomaly {
    Bgp(BgpAnomaly),
    Snmp(SnmpAnomaly),
}

impl SourceAnomaly {
    pub fn device(&self) -> &DeviceId {
        match self {
            SourceAnomaly::Bgp(a) => &a.device,
            SourceAnomaly::Snmp(a) => &a.device,
        }
    }

    pub fn ts(&self) -> DateTime<Utc> {
        match self {
            SourceAnomaly::Bgp(a) => a.ts,
            SourceAnomaly::Snmp(a) => a.ts,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            SourceAnomaly::Bgp(a) => a.confidence,
            SourceAnomaly::Snmp(a) => a.confidence,
        }
    }
}

/// How a correlated event was formed (spec §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    BgpOnly,
    SnmpOnly,
    Multimodal,
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JoinKind::BgpOnly => "bgp_only",
            JoinKind::SnmpOnly => "snmp_only",
            JoinKind::Multimodal => "multimodal",
        };
        write!(f, "{s}")
    }
}

/// Ephemeral, consumed to form an alert (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedEvent {
    pub device: DeviceId,
    pub join_kind: JoinKind,
    pub strength: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub bgp: Option<BgpAnomaly>,
    pub snmp: Option<SnmpAnomaly>,
}

/// The classified probable failure category (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    LinkFailure,
    HardwareDegradation,
    BgpFlapping,
    RouterOverload,
    UnclassifiedAnomaly,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::LinkFailure => "link_failure",
            FailureKind::HardwareDegradation => "hardware_degradation",
            FailureKind::BgpFlapping => "bgp_flapping",
            FailureKind::RouterOverload => "router_overload",
            FailureKind::UnclassifiedAnomaly => "unclassified_anomaly",
        };
        write!(f, "{s}")
    }
}

/// Topology-derived context attached to an alert (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triage {
    pub device: DeviceId,
    pub role: Role,
    pub blast_radius: usize,
    pub affected_layers: BTreeSet<Layer>,
    pub spof: bool,
    pub redundancy: String,
}

/// The single externally-visible output of the core (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedAlert {
    pub alert_id: Uuid,
    pub ts: DateTime<Utc>,
    pub kind: FailureKind,
    pub severity: Severity,
    pub priority: AlertPriority,
    pub confidence: f64,
    pub correlated: CorrelatedEvent,
    pub triage: Triage,
    pub probable_root_cause: String,
    pub evidence: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub estimated_resolution: String,
}
