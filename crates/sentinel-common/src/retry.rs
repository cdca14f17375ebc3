//! Exponential backoff for the transport boundary (spec §7 item 3:
//! "retried with exponential backoff (base 1s, cap 30s, jitter); if backoff
//! exceeds `transport_fatal_after` the process exits non-zero").

use crate::config::TransportConfig;
use rand::Rng;
use std::time::{Duration, Instant};

/// Tracks successive backoff delays for one retried operation (a single
/// `subscribe_*`/`publish_alert` call site), and whether the operation has
/// been failing long enough to be treated as fatal.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    fatal_after: Duration,
    attempt: u32,
    first_failure: Option<Instant>,
}

impl Backoff {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            cap: Duration::from_secs(config.max_delay_secs),
            fatal_after: Duration::from_secs(config.transport_fatal_after_secs),
            attempt: 0,
            first_failure: None,
        }
    }

    /// Record a failed attempt and return the jittered delay to wait before
    /// retrying, or `None` if the failure streak has exceeded
    /// `transport_fatal_after` and the caller should treat this as fatal.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let now = Instant::now();
        let first_failure = *self.first_failure.get_or_insert(now);
        if now.duration_since(first_failure) >= self.fatal_after {
            return None;
        }

        let exp = self.base.saturating_mul(1 << self.attempt.min(16));
        let delay = exp.min(self.cap);
        self.attempt += 1;

        let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..=0.2);
        let jittered = delay.mul_f64(1.0 + jitter_frac);
        Some(jittered.min(self.cap))
    }

    /// Reset the streak after a successful attempt.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.first_failure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let config = TransportConfig {
            base_delay_ms: 1_000,
            max_delay_secs: 30,
            transport_fatal_after_secs: 300,
            shutdown_drain_secs: 5,
            channel_capacity: 1024,
        };
        let mut backoff = Backoff::new(&config);
        let d1 = backoff.next_delay().unwrap();
        assert!(d1 >= Duration::from_secs(1));
        for _ in 0..20 {
            let d = backoff.next_delay().unwrap();
            assert!(d <= Duration::from_secs(30) + Duration::from_millis(1));
        }
    }

    #[test]
    fn reset_restarts_streak() {
        let config = TransportConfig::default();
        let mut backoff = Backoff::new(&config);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt, 0);
    }
}
