use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::classify::ErrorKind;

/// Attempts per record, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
/// Backoff base delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

/// Exponential backoff with ±20% jitter: `base * 2^attempt`, scaled by a
/// uniform factor in `[0.8, 1.2]`.
///
/// The random source is owned by the policy so runs can be made
/// deterministic with [`Backoff::seeded`]. There is no upper cap; callers
/// bound the number of attempts instead.
pub struct Backoff {
    base: Duration,
    rng: Mutex<StdRng>,
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff").field("base", &self.base).finish()
    }
}

impl Backoff {
    /// Backoff seeded from the operating system.
    pub fn new(base: Duration) -> Self {
        Self::with_rng(base, StdRng::from_os_rng())
    }

    /// Backoff with a fixed seed; the same seed yields the same delay sequence.
    pub fn seeded(base: Duration, seed: u64) -> Self {
        Self::with_rng(base, StdRng::seed_from_u64(seed))
    }

    fn with_rng(base: Duration, rng: StdRng) -> Self {
        Self {
            base,
            rng: Mutex::new(rng),
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Un-jittered delay for a 0-based attempt. Saturates instead of overflowing.
    pub fn nominal(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }

    /// Jittered delay for a 0-based attempt, drawn from the policy's own RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.delay_with_rng(attempt, &mut *rng)
    }

    /// Jittered delay drawn from a caller-supplied RNG.
    pub fn delay_with_rng<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let nanos = u64::try_from(self.nominal(attempt).as_nanos()).unwrap_or(u64::MAX);
        let spread = nanos / 5;
        let jitter = rng.random_range(0..=spread.saturating_mul(2));
        Duration::from_nanos((nanos - spread).saturating_add(jitter))
    }
}

/// Decision returned by the retry policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The failure is terminal; do not retry.
    NoRetry,
    /// The failure is transient but the attempt budget is spent.
    Exhausted,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Attempt budget plus backoff.
#[derive(Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Backoff::new(DEFAULT_BASE_DELAY))
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt and is clamped to at least 1.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Decide what to do after attempt `attempt` (0-based) failed with `kind`.
    ///
    /// Terminal kinds win over an exhausted budget, so a 404 on the last
    /// attempt is reported as-is.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if !kind.is_transient() {
            return RetryDecision::NoRetry;
        }
        if attempt.saturating_add(1) >= self.max_attempts {
            return RetryDecision::Exhausted;
        }
        RetryDecision::RetryAfter(self.backoff.delay(attempt))
    }
}
