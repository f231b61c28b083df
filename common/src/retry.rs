// Retry strategy for transient content-service failures
//
// Retries happen inside one execution attempt of a schedule entry. If the
// strategy is exhausted the claim is released and the entry stays pending
// for the next scan, so delays here stay short.

use rand::Rng;
use std::time::Duration;

/// Retry strategy trait for calculating retry delays
pub trait RetryStrategy: Send + Sync {
    /// Calculate the delay before the next retry attempt
    /// Returns None if the attempt budget is exhausted
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Check if more retries are allowed
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }

    /// Bounded attempt count for one execution
    fn max_attempts(&self) -> u32;
}

/// Exponential backoff with jitter.
/// Sequence: base, base*2, base*4, ... capped at max_delay, with a random
/// jitter fraction added to spread concurrent retries.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    max_attempts: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_factor: 0.1,
            max_attempts: 5,
        }
    }
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(base_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            jitter_factor: 0.1,
            max_attempts,
        }
    }

    fn calculate_base_delay_ms(&self, attempt: u32) -> u64 {
        let factor = 2_u64.saturating_pow(attempt);
        self.base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms)
    }

    fn add_jitter_ms(&self, base_delay_ms: u64) -> u64 {
        if self.jitter_factor == 0.0 {
            return base_delay_ms;
        }

        let jitter_range_ms = (base_delay_ms as f64 * self.jitter_factor) as u64;
        if jitter_range_ms == 0 {
            return base_delay_ms;
        }

        let jitter_ms = rand::thread_rng().gen_range(0..=jitter_range_ms);
        base_delay_ms + jitter_ms
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let base = self.calculate_base_delay_ms(attempt);
        Some(Duration::from_millis(self.add_jitter_ms(base)))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Fixed delay retry strategy (used by tests and embedded setups)
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: u32,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_sequence() {
        let strategy = ExponentialBackoff {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_factor: 0.0,
            max_attempts: 10,
        };

        assert_eq!(strategy.calculate_base_delay_ms(0), 500);
        assert_eq!(strategy.calculate_base_delay_ms(1), 1_000);
        assert_eq!(strategy.calculate_base_delay_ms(2), 2_000);
        assert_eq!(strategy.calculate_base_delay_ms(3), 4_000);
        assert_eq!(strategy.calculate_base_delay_ms(6), 30_000); // capped
    }

    #[test]
    fn test_attempt_budget_enforcement() {
        let strategy = ExponentialBackoff::with_config(500, 30_000, 5);

        for attempt in 0..5 {
            assert!(
                strategy.next_delay(attempt).is_some(),
                "attempt {} should be allowed",
                attempt
            );
        }
        assert!(strategy.next_delay(5).is_none());
        assert!(strategy.next_delay(6).is_none());
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let strategy = ExponentialBackoff::default();

        for _ in 0..20 {
            let delay = strategy.next_delay(0).unwrap().as_millis() as u64;
            assert!((500..=550).contains(&delay), "delay {}ms out of range", delay);
        }
    }

    #[test]
    fn test_should_retry() {
        let strategy = ExponentialBackoff::with_config(500, 30_000, 3);

        assert!(strategy.should_retry(0));
        assert!(strategy.should_retry(2));
        assert!(!strategy.should_retry(3));
        assert!(!strategy.should_retry(4));
    }

    #[test]
    fn test_fixed_delay_strategy() {
        let delay = Duration::from_millis(10);
        let strategy = FixedDelay::new(delay, 4);

        for attempt in 0..4 {
            assert_eq!(strategy.next_delay(attempt), Some(delay));
        }
        assert_eq!(strategy.next_delay(4), None);
    }
}
