//! Bounded retry policy shared by the storage backends.

use std::time::Duration;

const MAX_BACKOFF_STEPS: u32 = 10;

/// How many times a contended operation is attempted before giving up with
/// [`StoreError::Contention`](crate::StoreError::Contention).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Sleep between attempts, multiplied by the attempt number (capped at
    /// ten times this value). Zero means spin without sleeping.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Sleep before retry number `attempt` (1-based, the attempt that just failed).
    pub(crate) fn pause(&self, attempt: u32) {
        if self.backoff.is_zero() {
            std::hint::spin_loop();
        } else {
            std::thread::sleep(self.backoff * attempt.min(MAX_BACKOFF_STEPS));
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1024, Duration::ZERO)
    }
}
