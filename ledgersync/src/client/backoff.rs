//! Exponential backoff policy for retryable API failures.

use std::time::Duration;

use rand::Rng;

/// Backoff schedule: `base * 2^attempt`, capped, with uniform jitter added on
/// top. A `Retry-After` hint from the service overrides the computed delay
/// when it is longer.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    pub fn from_millis(base_ms: u64, cap_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(cap_ms))
    }

    /// Deterministic delay for a zero-based attempt index, before jitter.
    pub fn delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exponent = attempt.min(31);
        let computed = self
            .base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.cap)
            .min(self.cap);

        match hint {
            Some(hint) if hint > computed => hint.min(self.cap),
            _ => computed,
        }
    }

    /// Delay with up to 10% uniform jitter added, still capped.
    pub fn jittered_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let delay = self.delay(attempt, hint);
        let jitter_ceiling = (delay.as_millis() as u64) / 10;
        if jitter_ceiling == 0 {
            return delay;
        }

        let jitter = rand::thread_rng().gen_range(0..=jitter_ceiling);
        (delay + Duration::from_millis(jitter)).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_cap() {
        let policy = BackoffPolicy::from_millis(500, 30_000);

        assert_eq!(policy.delay(0, None), Duration::from_millis(500));
        assert_eq!(policy.delay(1, None), Duration::from_millis(1_000));
        assert_eq!(policy.delay(2, None), Duration::from_millis(2_000));
        assert_eq!(policy.delay(10, None), Duration::from_millis(30_000));
    }

    #[test]
    fn hint_extends_but_never_exceeds_cap() {
        let policy = BackoffPolicy::from_millis(500, 30_000);

        // A hint longer than the computed delay wins.
        assert_eq!(
            policy.delay(0, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        // A hint shorter than the computed delay is ignored.
        assert_eq!(
            policy.delay(4, Some(Duration::from_secs(1))),
            Duration::from_secs(8)
        );
        // The cap binds the hint too.
        assert_eq!(
            policy.delay(0, Some(Duration::from_secs(300))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn jitter_stays_within_cap() {
        let policy = BackoffPolicy::from_millis(500, 30_000);
        for attempt in 0..12 {
            let delay = policy.jittered_delay(attempt, None);
            assert!(delay <= Duration::from_millis(30_000));
            assert!(delay >= policy.delay(attempt, None).min(Duration::from_millis(30_000)));
        }
    }

    #[test]
    fn huge_attempt_index_does_not_overflow() {
        let policy = BackoffPolicy::from_millis(500, 30_000);
        assert_eq!(policy.delay(u32::MAX, None), Duration::from_millis(30_000));
    }
}
