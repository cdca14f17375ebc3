//! Ingress/Egress Boundary (spec §4.7): the narrow interface the core
//! requires from the surrounding transport. Everything else (the BMP
//! listener, SNMP poller, pub/sub bus) is an external collaborator.

use async_trait::async_trait;
use futures::stream::BoxStream;
use sentinel_common::error::Result;
use sentinel_common::types::{BgpUpdate, EnrichedAlert, SnmpSample};

/// Implemented once per transport (e.g. an in-process channel bridge for
/// tests, or a pub/sub adapter in production). Streams are restartable and
/// at-least-once; duplicates are tolerated by the consumer.
#[async_trait]
pub trait Boundary: Send + Sync {
    fn subscribe_bgp(&self) -> BoxStream<'static, BgpUpdate>;
    fn subscribe_snmp(&self) -> BoxStream<'static, SnmpSample>;

    /// At-least-once, idempotent via `alert_id` on the receiving side.
    async fn publish_alert(&self, alert: EnrichedAlert) -> Result<()>;
}
