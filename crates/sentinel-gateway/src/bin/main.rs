//! `sentinel-gateway` executable (spec §6 "CLI surface").

use clap::Parser;
use sentinel_common::config::Config;
use sentinel_common::metrics::{Counters, HealthStatus};
use sentinel_common::observability::init_tracing;
use sentinel_gateway::cli::{Cli, CliCommand, ExitCode};
use sentinel_gateway::health::SharedHealth;
use sentinel_gateway::Gateway;
use sentinel_ingest::{load_if_model, load_topology, InProcessBoundary};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::ValidateConfig { config, topology } => {
            init_tracing(None);
            let exit = validate_config(&config, topology.as_deref());
            std::process::exit(exit.into());
        }
        CliCommand::Run {
            config,
            model,
            topology,
            allow_bgp_only,
            log_level,
        } => {
            init_tracing(log_level.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            let exit = rt.block_on(run(config, model, topology, allow_bgp_only));
            std::process::exit(exit.into());
        }
    }
}

fn validate_config(config_path: &std::path::Path, topology_path: Option<&std::path::Path>) -> ExitCode {
    let topology_path = topology_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| sentinel_gateway::cli::default_topology_path(config_path));

    let config_text = match std::fs::read_to_string(config_path) {
        Ok(t) => t,
        Err(e) => {
            error!(path = %config_path.display(), error = %e, "cannot read config file");
            return ExitCode::InvalidConfiguration;
        }
    };
    if Config::from_toml_str(&config_text).is_err() {
        error!(path = %config_path.display(), "invalid roles/thresholds configuration");
        return ExitCode::InvalidConfiguration;
    }
    match load_topology(&topology_path) {
        Ok(topo) => {
            info!(devices = topo.device_count(), "topology validated successfully");
            ExitCode::Success
        }
        Err(e) => {
            error!(path = %topology_path.display(), error = %e, "invalid topology configuration");
            ExitCode::InvalidConfiguration
        }
    }
}

async fn run(
    config_path: std::path::PathBuf,
    model_path: std::path::PathBuf,
    topology_path: Option<std::path::PathBuf>,
    allow_bgp_only: bool,
) -> ExitCode {
    let topology_path =
        topology_path.unwrap_or_else(|| sentinel_gateway::cli::default_topology_path(&config_path));

    let config_text = match std::fs::read_to_string(&config_path) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "cannot read config file");
            return ExitCode::InvalidConfiguration;
        }
    };
    let config = match Config::from_toml_str(&config_text) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid roles/thresholds configuration");
            return ExitCode::InvalidConfiguration;
        }
    };

    let topology = match load_topology(&topology_path) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "invalid topology configuration");
            return ExitCode::InvalidConfiguration;
        }
    };

    let model = match load_if_model(&model_path) {
        Ok(m) => Some(m),
        Err(e) if allow_bgp_only => {
            warn!(error = %e, "model load failed; continuing BGP-only per --allow-bgp-only");
            None
        }
        Err(e) => {
            error!(error = %e, "model load failure");
            return ExitCode::ModelLoadFailure;
        }
    };

    let counters = Arc::new(Counters::default());
    let gateway = Gateway {
        config: config.clone(),
        topology: Arc::new(topology),
        model,
        counters: counters.clone(),
    };

    let (boundary, _producers, mut published_rx) =
        InProcessBoundary::new(config.transport.clone(), counters.clone());
    let boundary: Arc<dyn sentinel_ingest::Boundary> = Arc::new(boundary);

    tokio::spawn(async move {
        while let Some(alert) = published_rx.recv().await {
            info!(
                alert_id = %alert.alert_id,
                device = %alert.triage.device,
                kind = %alert.kind,
                priority = %alert.priority,
                "alert published"
            );
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received ctrl-c, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let health: Option<SharedHealth> = sentinel_gateway::cli::health_addr_from_env().map(|addr| {
        let health = Arc::new(RwLock::new(HealthStatus::new(0)));
        let health_clone = health.clone();
        let counters_clone = counters.clone();
        tokio::spawn(async move {
            if let Err(e) = sentinel_gateway::health::serve(&addr, health_clone, counters_clone).await {
                error!(error = %e, "health/metrics endpoint failed");
            }
        });
        health
    });

    match gateway.run(boundary, shutdown_rx, health).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            error!(error = %e, "transport unavailable, exiting");
            ExitCode::TransportUnavailable
        }
    }
}
