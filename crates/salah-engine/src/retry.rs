//! Retry policy for remote timing requests.
//!
//! Up to three attempts with a growing pause between them (1x, 2x, 3x the
//! base delay). The execution loop lives in the resolver's state machine;
//! this module only owns the numbers.

use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base pause; the pause after attempt n is n times this.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Pause before the next attempt, given the 1-based attempt that just
    /// failed.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        self.base_delay.saturating_mul(failed_attempt.max(1))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let config = RetryConfig::new(3, 100);
        assert_eq!(config.delay_after(1), Duration::from_millis(100));
        assert_eq!(config.delay_after(2), Duration::from_millis(200));
        assert_eq!(config.delay_after(3), Duration::from_millis(300));
    }

    #[test]
    fn test_zero_attempt_treated_as_first() {
        let config = RetryConfig::new(3, 100);
        assert_eq!(config.delay_after(0), Duration::from_millis(100));
    }
}
