//! Backoff Policy
//!
//! Retry delays as a pure function of the attempt number. The supervisor
//! owns the loop, the cancellation check, and the sleep; this module only
//! answers "how long after attempt `n`, if at all".

use std::time::Duration;

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after every failed attempt.
    pub delay: Duration,
    /// Maximum number of attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5), 0)
    }
}

impl BackoffPolicy {
    /// Fixed delay between attempts.
    ///
    /// `max_attempts = 0` retries forever.
    #[must_use]
    pub const fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }

    /// Whether the policy retries forever.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }

    /// Delay to wait after the 1-based `attempt` has failed.
    ///
    /// Returns `None` once `attempt` reaches `max_attempts`: the caller has
    /// used up its budget and must give up.
    #[must_use]
    pub const fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if !self.is_unbounded() && attempt >= self.max_attempts {
            return None;
        }
        Some(self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_policy_is_constant() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(5), 0);
        for attempt in [1, 2, 10, 1_000, u32::MAX] {
            assert_eq!(
                policy.delay_for_attempt(attempt),
                Some(Duration::from_secs(5))
            );
        }
    }

    #[test]
    fn bounded_policy_stops_at_max_attempts() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(5), 10);

        let delays: Vec<_> = (1..=10).map(|a| policy.delay_for_attempt(a)).collect();

        // Nine sleeps between ten attempts; nothing after the tenth.
        assert!(delays[..9].iter().all(Option::is_some));
        assert_eq!(delays[9], None);
        assert_eq!(policy.delay_for_attempt(11), None);
    }

    #[test]
    fn single_attempt_policy_never_sleeps() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(5), 1);
        assert_eq!(policy.delay_for_attempt(1), None);
    }

    proptest! {
        #[test]
        fn unbounded_policy_always_yields_a_delay(attempt in 0u32..u32::MAX) {
            let policy = BackoffPolicy::fixed(Duration::from_millis(250), 0);
            prop_assert_eq!(policy.delay_for_attempt(attempt), Some(Duration::from_millis(250)));
        }
    }
}
