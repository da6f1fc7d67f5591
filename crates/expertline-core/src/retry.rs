//! Bounded exponential backoff for upstream API calls.

use std::time::Duration;

/// Statuses worth retrying by default: rate limits and server-side failures.
pub fn default_retry_on(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Retry policy applied uniformly to upstream requests: a bounded number of
/// retries with a doubling (or otherwise multiplied) delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Factor applied to the delay on each subsequent retry.
    pub multiplier: f64,
    /// Which HTTP statuses justify another attempt.
    pub retry_on: fn(u16) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            retry_on: default_retry_on,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `base * multiplier^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.mul_f64(self.multiplier.powi(attempt as i32))
    }

    /// Whether retry number `attempt` (0-based) should happen for `status`.
    pub fn should_retry(&self, status: u16, attempt: u32) -> bool {
        attempt < self.max_retries && (self.retry_on)(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(429, 0));
        assert!(policy.should_retry(429, 2));
        assert!(!policy.should_retry(429, 3));
    }

    #[test]
    fn only_retryable_statuses_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(429, 0));
        assert!(policy.should_retry(503, 0));
        assert!(!policy.should_retry(400, 0));
        assert!(!policy.should_retry(401, 0));
    }

    #[test]
    fn custom_predicate_is_honored() {
        fn only_teapots(status: u16) -> bool {
            status == 418
        }
        let policy = RetryPolicy {
            retry_on: only_teapots,
            ..RetryPolicy::default()
        };
        assert!(policy.should_retry(418, 0));
        assert!(!policy.should_retry(429, 0));
    }
}
