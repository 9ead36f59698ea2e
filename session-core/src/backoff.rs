//! Retry policy for profile lookups during reconciliation.
//!
//! When the provider reports a signed-in identity, the synchronizer fetches
//! the profile before deciding anything. Transient failures are retried with
//! exponential backoff plus jitter; once attempts run out the session fails
//! closed. A policy with `max_attempts == 1` fails closed immediately.

use std::time::Duration;

/// Bounded exponential backoff with random jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Treated as at least 1.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound on the exponential part of the delay.
    pub max_delay: Duration,
    /// Upper bound on the random jitter added to every delay.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn fail_closed() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Whether another attempt is allowed after `attempt` attempts failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }

    /// Delay to wait after `attempt` failed attempts (1-based).
    ///
    /// Formula: min(max_delay, base_delay * 2^(attempt-1)) + random(0..=jitter)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        base + Duration::from_millis(random_jitter_ms(self.jitter.as_millis() as u64))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            jitter: Duration::from_millis(100),
        }
    }
}

/// Random jitter between 0 and `max_ms` milliseconds inclusive.
///
/// Falls back to no jitter if the OS random source is unavailable.
fn random_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return 0;
    }
    u64::from_le_bytes(bytes) % (max_ms + 1)
}
