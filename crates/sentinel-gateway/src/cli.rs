//! Command-line surface (spec §6 "CLI surface (minimum)").

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sentinel-gateway", version, about = "Fabric Sentinel: topology-aware BGP/SNMP anomaly correlation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Start the BGP detector, SNMP detector, and correlator tasks.
    Run {
        /// Roles/thresholds configuration file (TOML).
        #[arg(long)]
        config: PathBuf,

        /// Isolation Forest model file.
        #[arg(long)]
        model: PathBuf,

        /// Topology + role graph file (YAML). Defaults to `topology.yaml`
        /// next to `--config` when omitted.
        #[arg(long)]
        topology: Option<PathBuf>,

        /// Disable the SNMP detector and run on BGP anomalies alone when
        /// the Isolation Forest model fails to load (spec §7 item 2),
        /// instead of treating the failure as fatal at startup.
        #[arg(long)]
        allow_bgp_only: bool,

        /// Overrides `LOG_LEVEL` for this process only.
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Validate a topology + roles configuration without starting anything.
    ValidateConfig {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        topology: Option<PathBuf>,
    },
}

/// Process exit codes (spec §6 "Exit codes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    InvalidConfiguration = 2,
    ModelLoadFailure = 3,
    TransportUnavailable = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

pub fn default_topology_path(config: &std::path::Path) -> PathBuf {
    config
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join("topology.yaml")
}

/// Reads `METRICS_ADDR` (spec §6 "Environment variables"), returning `None`
/// when unset or empty so the health/metrics endpoint stays disabled.
pub fn health_addr_from_env() -> Option<String> {
    std::env::var("METRICS_ADDR")
        .ok()
        .filter(|addr| !addr.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // std::env mutation is process-global, so these run serially to avoid
    // racing other tests that read or write METRICS_ADDR.
    #[test]
    #[serial]
    fn missing_env_var_disables_endpoint() {
        std::env::remove_var("METRICS_ADDR");
        assert_eq!(health_addr_from_env(), None);
    }

    #[test]
    #[serial]
    fn empty_env_var_disables_endpoint() {
        std::env::set_var("METRICS_ADDR", "");
        assert_eq!(health_addr_from_env(), None);
        std::env::remove_var("METRICS_ADDR");
    }

    #[test]
    #[serial]
    fn set_env_var_enables_endpoint() {
        std::env::set_var("METRICS_ADDR", "127.0.0.1:9900");
        assert_eq!(health_addr_from_env(), Some("127.0.0.1:9900".to_string()));
        std::env::remove_var("METRICS_ADDR");
    }
}
