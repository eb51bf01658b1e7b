use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Retry contract attached to an `EffectSpec` (§3, §4.4).
///
/// Backoff is computed as `min(max_interval, initial_interval *
/// backoff_coefficient^(attempt-1))` for `attempt` in `1..=max_attempts`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
    pub non_retryable_kinds: HashSet<ErrorKind>,
}

impl RetryPolicy {
    pub fn new(
        initial_interval: Duration,
        backoff_coefficient: f64,
        max_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_interval,
            backoff_coefficient,
            max_interval,
            max_attempts,
            non_retryable_kinds: HashSet::new(),
        }
    }

    pub fn non_retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.non_retryable_kinds.extend(kinds);
        self
    }

    /// Whether `kind` should ever be retried under this policy, combining
    /// the explicit non-retryable set with each kind's default (§4.4).
    pub fn is_retryable(&self, kind: &ErrorKind) -> bool {
        !self.non_retryable_kinds.contains(kind) && kind.retryable_by_default()
    }

    /// Whether another attempt is permitted given `attempts_so_far` (the
    /// number of attempts already made, including the one that just failed).
    pub fn has_attempts_remaining(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_attempts
    }

    /// Backoff duration to wait before attempt number `next_attempt`
    /// (1-indexed: the first retry is `next_attempt == 2`).
    pub fn backoff_for(&self, next_attempt: u32) -> Duration {
        debug_assert!(next_attempt >= 1);
        let exponent = (next_attempt.saturating_sub(1)) as i32;
        let scaled = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = scaled.min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(2),
            2.0,
            Duration::from_secs(30),
            3,
        )
        .non_retryable(vec![ErrorKind::ValidationError])
    }

    #[test]
    fn backoff_doubles_and_caps_at_max_interval() {
        let p = policy();
        assert_eq!(p.backoff_for(1), Duration::from_secs(2));
        assert_eq!(p.backoff_for(2), Duration::from_secs(4));
        assert_eq!(p.backoff_for(3), Duration::from_secs(8));
        // 2 * 2^5 = 64s, capped to the 30s max_interval.
        assert_eq!(p.backoff_for(6), Duration::from_secs(30));
    }

    #[test]
    fn explicit_non_retryable_kind_overrides_default() {
        let p = policy();
        assert!(!p.is_retryable(&ErrorKind::ValidationError));
        assert!(p.is_retryable(&ErrorKind::Transient));
    }

    #[test]
    fn kinds_that_are_never_retryable_by_default() {
        let p = RetryPolicy::new(Duration::from_secs(1), 2.0, Duration::from_secs(10), 5);
        assert!(!p.is_retryable(&ErrorKind::NotFound));
        assert!(!p.is_retryable(&ErrorKind::IllegalState));
        assert!(p.is_retryable(&ErrorKind::Uncategorized));
    }

    #[test]
    fn attempts_remaining_respects_max_attempts() {
        let p = policy();
        assert!(p.has_attempts_remaining(0));
        assert!(p.has_attempts_remaining(2));
        assert!(!p.has_attempts_remaining(3));
    }
}
