//! Process-wide counters named throughout spec.md, plus per-task health
//! aggregation (grounded in the gateway's `HealthLevel`/`ComponentHealth`
//! aggregation pattern).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// The counters §4.1–§4.5 and §7 name explicitly. Each is a monotonic
/// process-lifetime count, exported as a `metrics` counter when the
/// optional `METRICS_ADDR` endpoint is enabled.
#[derive(Debug, Default)]
pub struct Counters {
    pub bgp_lag_drops: AtomicU64,
    pub mp_compute_errors: AtomicU64,
    pub snmp_imputations: AtomicU64,
    pub schema_mismatches: AtomicU64,
    pub topology_unknown_device: AtomicU64,
    pub dedup_suppressed: AtomicU64,
    pub malformed_input_records: AtomicU64,
    pub transport_retries: AtomicU64,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HashMap<&'static str, u64> {
        let mut m = HashMap::new();
        m.insert("bgp_lag_drops", self.bgp_lag_drops.load(Ordering::Relaxed));
        m.insert(
            "mp_compute_errors",
            self.mp_compute_errors.load(Ordering::Relaxed),
        );
        m.insert(
            "snmp_imputations",
            self.snmp_imputations.load(Ordering::Relaxed),
        );
        m.insert(
            "schema_mismatches",
            self.schema_mismatches.load(Ordering::Relaxed),
        );
        m.insert(
            "topology_unknown_device",
            self.topology_unknown_device.load(Ordering::Relaxed),
        );
        m.insert(
            "dedup_suppressed",
            self.dedup_suppressed.load(Ordering::Relaxed),
        );
        m.insert(
            "malformed_input_records",
            self.malformed_input_records.load(Ordering::Relaxed),
        );
        m.insert(
            "transport_retries",
            self.transport_retries.load(Ordering::Relaxed),
        );
        m
    }
}

/// Health level of one pipeline task, aggregated into overall process health
/// for the optional `/healthz` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

impl HealthLevel {
    pub fn as_score(&self) -> u8 {
        match self {
            HealthLevel::Healthy => 100,
            HealthLevel::Degraded => 50,
            HealthLevel::Critical => 10,
            HealthLevel::Unknown => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthLevel,
    pub message: String,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub overall: HealthLevel,
    pub components: HashMap<String, ComponentHealth>,
    pub last_check: DateTime<Utc>,
    pub uptime_seconds: u64,
}

impl HealthStatus {
    pub fn new(uptime_seconds: u64) -> Self {
        Self {
            overall: HealthLevel::Unknown,
            components: HashMap::new(),
            last_check: Utc::now(),
            uptime_seconds,
        }
    }

    pub fn calculate_overall(&mut self) {
        if self.components.is_empty() {
            self.overall = HealthLevel::Unknown;
            return;
        }
        let critical = self
            .components
            .values()
            .filter(|c| c.status == HealthLevel::Critical)
            .count();
        let degraded = self
            .components
            .values()
            .filter(|c| c.status == HealthLevel::Degraded)
            .count();
        self.overall = if critical > 0 {
            HealthLevel::Critical
        } else if degraded > 0 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Healthy
        };
    }
}
