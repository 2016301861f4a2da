//! Exponential backoff for the primary connect cycle.
//!
//! `delay(n) = min(initial × multiplier^(n-1), max)`. Unlike a jittered
//! policy, the schedule is fully deterministic so retry timing can be
//! asserted exactly under paused time.

use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::infrastructure::config::ReconnectionConfig;

/// Capped exponential retry delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    initial: Duration,
    multiplier: f64,
    max: Duration,
}

impl BackoffPolicy {
    /// Create a policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `initial` is zero or
    /// `multiplier` is not a finite number greater than one.
    pub fn new(initial: Duration, multiplier: f64, max: Duration) -> Result<Self> {
        if initial.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "reconnection.initial_delay_ms",
                reason: "must be > 0".to_string(),
            }
            .into());
        }
        if !multiplier.is_finite() || multiplier <= 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnection.backoff_multiplier",
                reason: "must be a finite number > 1".to_string(),
            }
            .into());
        }
        Ok(Self {
            initial,
            multiplier,
            // A cap below the first delay would make the schedule decrease.
            max: max.max(initial),
        })
    }

    /// Build a policy from reconnection settings.
    ///
    /// # Errors
    ///
    /// See [`BackoffPolicy::new`].
    pub fn from_config(config: &ReconnectionConfig) -> Result<Self> {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            config.backoff_multiplier,
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `attempt = 0` is treated as `1`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);

        let max_ms = self.max.as_millis() as f64;
        let delay_ms = self.initial.as_millis() as f64 * factor;
        // `factor` overflows to +inf for large attempts; min() keeps it capped.
        Duration::from_millis(delay_ms.min(max_ms) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_ms: u64, multiplier: f64, max_ms: u64) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(initial_ms),
            multiplier,
            Duration::from_millis(max_ms),
        )
        .unwrap()
    }

    #[test]
    fn test_delay_follows_formula() {
        let backoff = policy(1000, 2.0, 30_000);
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay(3), Duration::from_millis(4000));
        assert_eq!(backoff.delay(5), Duration::from_millis(16_000));
        assert_eq!(backoff.delay(6), Duration::from_millis(30_000));
    }

    #[test]
    fn test_default_schedule() {
        let backoff = BackoffPolicy::from_config(&ReconnectionConfig::default()).unwrap();
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(2), Duration::from_millis(1500));
        assert_eq!(backoff.delay(3), Duration::from_millis(2250));
    }

    #[test]
    fn test_delay_is_non_decreasing_and_capped() {
        let backoff = policy(250, 1.7, 10_000);
        let mut previous = Duration::ZERO;
        for attempt in 1..200 {
            let delay = backoff.delay(attempt);
            assert!(delay >= previous, "attempt {attempt} decreased");
            assert!(delay <= Duration::from_millis(10_000));
            previous = delay;
        }
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn test_attempt_zero_is_first_attempt() {
        let backoff = policy(1000, 1.5, 30_000);
        assert_eq!(backoff.delay(0), backoff.delay(1));
    }

    #[test]
    fn test_rejects_zero_initial_delay() {
        assert!(BackoffPolicy::new(Duration::ZERO, 2.0, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_rejects_multiplier_at_or_below_one() {
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        assert!(BackoffPolicy::new(initial, 1.0, max).is_err());
        assert!(BackoffPolicy::new(initial, 0.5, max).is_err());
        assert!(BackoffPolicy::new(initial, f64::NAN, max).is_err());
        assert!(BackoffPolicy::new(initial, f64::INFINITY, max).is_err());
    }
}
