// src/engine/backoff.rs

//! Exponential backoff with jitter, shared by the supervisor (store/queue
//! retries) and the retrying dispatcher.

use std::time::Duration;

use rand::Rng;

/// Default exponential multiplier.
pub const DEFAULT_MULTIPLIER: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Un-jittered delay before retry number `attempt` (1-based):
    /// `base * 2^(attempt - 1)`, capped at `max`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = DEFAULT_MULTIPLIER.saturating_pow(attempt - 1);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Jittered delay in `[ceiling / 2, ceiling]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        let half = ceiling / 2;
        let spread = (ceiling - half).as_millis() as u64;
        if spread == 0 {
            return ceiling;
        }
        let jitter = rand::thread_rng().gen_range(0..=spread);
        half + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(Duration::from_millis(100), Duration::from_secs(1))
    }

    #[test]
    fn ceiling_grows_exponentially_and_caps() {
        let b = backoff();
        assert_eq!(b.ceiling(0), Duration::ZERO);
        assert_eq!(b.ceiling(1), Duration::from_millis(100));
        assert_eq!(b.ceiling(2), Duration::from_millis(200));
        assert_eq!(b.ceiling(4), Duration::from_millis(800));
        assert_eq!(b.ceiling(5), Duration::from_secs(1));
        assert_eq!(b.ceiling(60), Duration::from_secs(1));
    }

    #[test]
    fn delay_stays_within_jitter_window() {
        let b = backoff();
        for attempt in 1..8 {
            let ceiling = b.ceiling(attempt);
            for _ in 0..50 {
                let d = b.delay(attempt);
                assert!(d >= ceiling / 2 && d <= ceiling, "{d:?} outside window for {ceiling:?}");
            }
        }
    }
}
