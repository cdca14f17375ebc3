//! Tracing initialization, following the env-filter setup the gateway
//! binary uses, scoped to this workspace's crates instead.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. `LOG_LEVEL` (spec §6) is
/// consulted first; `RUST_LOG` is honored if set, since `EnvFilter` reads
/// it by default. `explicit_level` (the CLI's `--log-level`) wins over both.
pub fn init_tracing(explicit_level: Option<&str>) {
    let filter = if let Some(level) = explicit_level {
        EnvFilter::new(format!(
            "sentinel_common={level},sentinel_topology={level},sentinel_bgp={level},\
             sentinel_snmp={level},sentinel_correlator={level},sentinel_ingest={level},\
             sentinel_gateway={level}"
        ))
    } else if let Ok(log_level) = std::env::var("LOG_LEVEL") {
        EnvFilter::new(format!(
            "sentinel_common={log_level},sentinel_topology={log_level},sentinel_bgp={log_level},\
             sentinel_snmp={log_level},sentinel_correlator={log_level},sentinel_ingest={log_level},\
             sentinel_gateway={log_level}"
        ))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "sentinel_common=info,sentinel_topology=info,sentinel_bgp=info,\
                 sentinel_snmp=info,sentinel_correlator=info,sentinel_ingest=info,\
                 sentinel_gateway=info",
            )
        })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}
