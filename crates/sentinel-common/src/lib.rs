//! Shared data model, error handling, configuration and resilience
//! primitives used across every Fabric Sentinel crate.

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod retry;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::Config;
pub use error::{Error, Result};
pub use metrics::{Counters, HealthLevel, HealthStatus};
pub use retry::Backoff;
pub use types::*;
