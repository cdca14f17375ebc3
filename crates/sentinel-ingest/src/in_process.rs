//! In-process channel-backed reference `Boundary` implementation, used by
//! integration tests and as the default transport when no external bus is
//! configured. Production deployments swap this for an adapter over the
//! pub/sub bus named by `TRANSPORT_URL` (spec §6); the core is unaware of
//! the difference.

use crate::boundary::Boundary;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use sentinel_common::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use sentinel_common::error::{Error, Result};
use sentinel_common::metrics::Counters;
use sentinel_common::retry::Backoff;
use sentinel_common::types::{BgpUpdate, EnrichedAlert, SnmpSample};
use sentinel_common::config::TransportConfig;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Producer-facing handles for feeding the core from an external source
/// (tests, or a real adapter's receive loop).
pub struct InProcessProducers {
    pub bgp_tx: mpsc::Sender<BgpUpdate>,
    pub snmp_tx: mpsc::Sender<SnmpSample>,
}

/// The `Boundary` implementation backed by bounded in-process channels
/// (spec §5 "bounded channels, capacity default 1024").
pub struct InProcessBoundary {
    bgp_rx: tokio::sync::Mutex<Option<mpsc::Receiver<BgpUpdate>>>,
    snmp_rx: tokio::sync::Mutex<Option<mpsc::Receiver<SnmpSample>>>,
    published: mpsc::Sender<EnrichedAlert>,
    breaker: CircuitBreaker,
    transport_config: TransportConfig,
    counters: Arc<Counters>,
}

impl InProcessBoundary {
    /// Builds a boundary plus the producer handles used to feed it, and a
    /// receiver that observes every alert the core publishes.
    pub fn new(
        transport_config: TransportConfig,
        counters: Arc<Counters>,
    ) -> (Self, InProcessProducers, mpsc::Receiver<EnrichedAlert>) {
        let capacity = transport_config.channel_capacity;
        let (bgp_tx, bgp_rx) = mpsc::channel(capacity);
        let (snmp_tx, snmp_rx) = mpsc::channel(capacity);
        let (published_tx, published_rx) = mpsc::channel(capacity);

        let boundary = Self {
            bgp_rx: tokio::sync::Mutex::new(Some(bgp_rx)),
            snmp_rx: tokio::sync::Mutex::new(Some(snmp_rx)),
            published: published_tx,
            breaker: CircuitBreaker::new("publish_alert", CircuitBreakerConfig::default()),
            transport_config,
            counters,
        };
        (boundary, InProcessProducers { bgp_tx, snmp_tx }, published_rx)
    }
}

#[async_trait]
impl Boundary for InProcessBoundary {
    fn subscribe_bgp(&self) -> BoxStream<'static, BgpUpdate> {
        let rx = self
            .bgp_rx
            .try_lock()
            .expect("subscribe_bgp called concurrently")
            .take()
            .expect("subscribe_bgp called more than once");
        ReceiverStream::new(rx).boxed()
    }

    fn subscribe_snmp(&self) -> BoxStream<'static, SnmpSample> {
        let rx = self
            .snmp_rx
            .try_lock()
            .expect("subscribe_snmp called concurrently")
            .take()
            .expect("subscribe_snmp called more than once");
        ReceiverStream::new(rx).boxed()
    }

    async fn publish_alert(&self, alert: EnrichedAlert) -> Result<()> {
        if !self.breaker.should_allow_call().await {
            return Err(Error::Transport("circuit open".to_string()));
        }

        let mut backoff = Backoff::new(&self.transport_config);
        loop {
            match self.published.send(alert.clone()).await {
                Ok(()) => {
                    self.breaker.record_result(true).await;
                    return Ok(());
                }
                Err(_) => {
                    self.breaker.record_result(false).await;
                    Counters::incr(&self.counters.transport_retries);
                    match backoff.next_delay() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err(Error::Transport("publish_alert exhausted retries".to_string())),
                    }
                }
            }
        }
    }
}
