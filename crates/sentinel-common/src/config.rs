//! Runtime configuration for Fabric Sentinel (spec §6 "Roles configuration").

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from the `--config` TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub binning: BinningConfig,
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub correlator: CorrelatorConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinningConfig {
    pub bin_seconds: u64,
    pub window_bins: usize,
    /// SNMP sample window in seconds (spec §4.3 "Given a sample window
    /// (default 60s per device)"). Not named in spec.md §6's runtime
    /// config block, which only lists BGP binning fields; added here since
    /// the SNMP feature extractor needs an equivalent knob (see
    /// `DESIGN.md`).
    #[serde(default = "default_snmp_interval_secs")]
    pub snmp_interval_secs: u64,
}

fn default_snmp_interval_secs() -> u64 {
    60
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            bin_seconds: 30,
            window_bins: 64,
            snmp_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// τ_mp — z-normalized standard-deviation units (spec §4.2).
    pub mp_discord: f64,
    /// Contamination rate `c` the Isolation Forest threshold is calibrated to.
    pub if_contamination: f64,
    /// Δ_corr in seconds (spec §4.5).
    pub correlation_window_secs: u64,
    pub cooldown_seconds: u64,
    pub spine_blast_threshold: usize,
    pub tor_blast_threshold: usize,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            mp_discord: 2.5,
            if_contamination: 0.02,
            correlation_window_secs: 60,
            cooldown_seconds: 120,
            spine_blast_threshold: 12,
            tor_blast_threshold: 4,
        }
    }
}

/// Correlator-specific tuning that is not part of the priority/dedup
/// thresholds above (spec §4.5 join rules and weights).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// How many topology hops a BGP/SNMP pair may be apart and still join.
    /// Spec default is 1; operators may set 0 to disable cross-device joins.
    pub adjacency_hops: u32,
    pub w_time: f64,
    pub w_conf: f64,
    pub w_adj: f64,
    /// Minimum severity/confidence to emit on window expiry without
    /// cross-modal confirmation (spec §4.5 `Armed -> Emitted(single_source)`).
    pub single_source_snmp_min_severity: crate::types::Severity,
    pub single_source_bgp_min_confidence: f64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            adjacency_hops: 1,
            w_time: 0.4,
            w_conf: 0.5,
            w_adj: 0.1,
            single_source_snmp_min_severity: crate::types::Severity::Critical,
            single_source_bgp_min_confidence: 0.85,
        }
    }
}

/// Transport retry tuning (spec §7 item 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
    pub transport_fatal_after_secs: u64,
    pub shutdown_drain_secs: u64,
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_secs: 30,
            transport_fatal_after_secs: 300,
            shutdown_drain_secs: 5,
            channel_capacity: 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binning: BinningConfig::default(),
            thresholds: ThresholdsConfig::default(),
            correlator: CorrelatorConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> crate::error::Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
