//! Circuit breaker guarding the egress transport call (`publish_alert`),
//! adapted from the gateway-wide circuit breaker pattern used elsewhere in
//! this codebase's lineage.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Arc<RwLock<Inner>>,
}

struct Inner {
    current: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    next_attempt: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Arc::new(RwLock::new(Inner {
                current: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                next_attempt: None,
            })),
        }
    }

    pub async fn should_allow_call(&self) -> bool {
        let mut state = self.state.write().await;
        match state.current {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => match state.next_attempt {
                Some(at) if Instant::now() >= at => {
                    info!(breaker = %self.name, "transitioning to half-open");
                    state.current = CircuitState::HalfOpen;
                    state.consecutive_successes = 0;
                    true
                }
                _ => false,
            },
        }
    }

    pub async fn record_result(&self, success: bool) {
        let mut state = self.state.write().await;
        match (&state.current, success) {
            (CircuitState::Closed, true) => {
                state.consecutive_failures = 0;
            }
            (CircuitState::Closed, false) => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    warn!(breaker = %self.name, failures = state.consecutive_failures, "opening circuit");
                    state.current = CircuitState::Open;
                    state.next_attempt = Some(Instant::now() + self.config.timeout);
                }
            }
            (CircuitState::HalfOpen, true) => {
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.config.success_threshold {
                    info!(breaker = %self.name, "closing circuit");
                    state.current = CircuitState::Closed;
                    state.consecutive_failures = 0;
                }
            }
            (CircuitState::HalfOpen, false) => {
                warn!(breaker = %self.name, "reopening circuit after half-open failure");
                state.current = CircuitState::Open;
                state.next_attempt = Some(Instant::now() + self.config.timeout);
                state.consecutive_successes = 0;
            }
            (CircuitState::Open, _) => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.read().await.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(
            "publish_alert",
            CircuitBreakerConfig {
                failure_threshold: 2,
                success_threshold: 1,
                timeout: Duration::from_millis(20),
            },
        );
        assert_eq!(cb.state().await, CircuitState::Closed);
        cb.record_result(false).await;
        cb.record_result(false).await;
        assert_eq!(cb.state().await, CircuitState::Open);
        assert!(!cb.should_allow_call().await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cb.should_allow_call().await);
        assert_eq!(cb.state().await, CircuitState::HalfOpen);
        cb.record_result(true).await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }
}
