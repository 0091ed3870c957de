//! Connection retry schedule
//!
//! The delay sequence is a pure function of the attempt number so the retry
//! behavior can be tested without opening a single connection.

use std::time::Duration;

/// Retry policy for establishing the remote session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum number of connection attempts
    pub max_attempts: u32,
    /// Delay unit doubled from the second retry onwards
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// Policy with a custom attempt count and the default delay unit
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Delay applied before the given 0-indexed attempt
    ///
    /// The first attempt starts immediately; attempt `i` then waits
    /// `base_delay * 2^(i-1)`, so the default unit yields 0s, 1s, 2s, 4s, 8s.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (attempt - 1).min(32);
        Duration::from_millis((self.base_delay.as_millis() as u64).saturating_mul(factor))
    }

    /// Total time spent waiting when every attempt fails
    pub fn total_delay(&self) -> Duration {
        (0..self.max_attempts).map(|i| self.delay_for(i)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delay_sequence() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (0..5).map(|i| policy.delay_for(i).as_secs()).collect();
        assert_eq!(delays, vec![0, 1, 2, 4, 8]);
    }

    #[test]
    fn test_first_attempt_is_immediate() {
        let policy = BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_large_attempt_does_not_panic() {
        let policy = BackoffPolicy::default();
        assert!(policy.delay_for(64) > Duration::from_secs(1));
    }

    #[test]
    fn test_total_delay() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.total_delay(), Duration::from_secs(15));
    }
}
