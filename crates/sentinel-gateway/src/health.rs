//! Optional `/healthz` + `/metrics` HTTP surface, started only when
//! `METRICS_ADDR` is set (spec §6 "Environment variables"). Grounded in the
//! teacher gateway's `server.rs` middleware-stack pattern; the CORS/
//! rate-limit/request-id layers there are dropped since this is an internal
//! scrape endpoint, not a public API (see `DESIGN.md`).

use axum::{extract::State, routing::get, Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sentinel_common::metrics::{Counters, HealthStatus};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

pub type SharedHealth = Arc<RwLock<HealthStatus>>;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// The global Prometheus recorder can only be installed once per process;
/// every caller after the first gets the same handle back.
fn prometheus_handle() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("install global Prometheus recorder")
    })
}

#[derive(Clone)]
struct AppState {
    health: SharedHealth,
    counters: Arc<Counters>,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.health.read().await.clone())
}

async fn metrics(State(state): State<AppState>) -> String {
    for (name, value) in state.counters.snapshot() {
        metrics::counter!(name).absolute(value);
    }
    prometheus_handle().render()
}

fn router(health: SharedHealth, counters: Arc<Counters>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { health, counters })
}

/// Binds and serves the health/metrics router on `addr` until the process
/// exits. Intended to run as its own `tokio::spawn`ed task alongside the
/// three pipeline tasks (spec §5).
pub async fn serve(addr: &str, health: SharedHealth, counters: Arc<Counters>) -> anyhow::Result<()> {
    // Install the recorder up front so the first scrape doesn't race the
    // `get_or_init` against a second concurrent request.
    let _ = prometheus_handle();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "metrics/health endpoint listening");
    axum::serve(listener, router(health, counters)).await?;
    Ok(())
}
