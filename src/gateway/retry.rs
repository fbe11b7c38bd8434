//! Retry policy for transient provider failures.
//!
//! Epistemic foundation:
//! - K_i: Only failures classified retryable are re-attempted
//! - K_i: Attempts are bounded; exhaustion surfaces the last cause
//! - I^B: Network availability unknowable → exponential backoff between
//!   attempts, overridden by a provider-supplied retry-after hint

use std::time::Duration;

use crate::models::{GatewayConfig, GatewayError};

/// Classification-driven retry policy.
///
/// `max_attempts` counts the initial attempt: the default of 3 means one
/// call plus up to two retries. Backoff after the n-th failed attempt is
/// `base_delay * multiplier^(n-1)`: with the defaults, 500 ms then 1 s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit settings.
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
        }
    }

    /// Build from gateway configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
            config.backoff_multiplier,
        )
    }

    /// Total attempts allowed per call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt should follow `error`, given how many
    /// attempts have already been made.
    pub fn should_retry(&self, error: &GatewayError, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts && error.is_retryable()
    }

    /// Backoff delay after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        self.base_delay.mul_f64(self.multiplier.powi(exponent))
    }

    /// Backoff delay after `error`, honoring a provider retry-after hint
    /// when one was supplied.
    pub fn delay_after(&self, error: &GatewayError, attempt: u32) -> Duration {
        match error.retry_after() {
            Some(secs) if secs > 0.0 => Duration::from_secs_f64(secs),
            _ => self.delay_for(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_half_second_then_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
    }

    #[test]
    fn fatal_failures_are_never_retried() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(&GatewayError::AuthenticationFailed, 1));
        assert!(!policy.should_retry(&GatewayError::InvalidInput("bad".into()), 1));
    }

    #[test]
    fn retryable_failures_stop_at_max_attempts() {
        let policy = RetryPolicy::default();
        let err = GatewayError::Timeout(Duration::from_secs(1));
        assert!(policy.should_retry(&err, 1));
        assert!(policy.should_retry(&err, 2));
        assert!(!policy.should_retry(&err, 3));
    }

    #[test]
    fn provider_hint_overrides_computed_backoff() {
        let policy = RetryPolicy::default();
        let hinted = GatewayError::RateLimited {
            retry_after_secs: Some(4.0),
        };
        assert_eq!(policy.delay_after(&hinted, 1), Duration::from_secs(4));

        let unhinted = GatewayError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(
            policy.delay_after(&unhinted, 1),
            Duration::from_millis(500)
        );
    }
}
