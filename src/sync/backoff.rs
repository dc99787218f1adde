//! Retry delays for reconnects and reloads.
//!
//! ```text
//! attempt:  1     2      3      4      5      ...
//! delay:    0     base   2×base 4×base 8×base ... capped at max
//! ```
//!
//! The first retry after a drop is immediate; later ones back off
//! exponentially.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Backoff Constants and Calculation
// ============================================================================

/// Default base delay in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 250;

/// Default maximum delay in milliseconds.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 5_000;

/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Multiplier for exponential backoff.
pub const BACKOFF_MULTIPLIER: u64 = 2;

/// Exponential delay for a 1-indexed attempt: `base * 2^(attempt-1)`,
/// capped at `max_ms`.
///
/// ```rust,ignore
/// assert_eq!(calculate_backoff(1, 250, 5000), Duration::from_millis(250));
/// assert_eq!(calculate_backoff(3, 250, 5000), Duration::from_millis(1000));
/// ```
#[must_use]
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let multiplier = BACKOFF_MULTIPLIER.saturating_pow(exponent);
    let delay = base_ms.saturating_mul(multiplier);
    Duration::from_millis(delay.min(max_ms))
}

/// Reconnect schedule: one immediate retry, then exponential backoff,
/// within a fixed attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_BACKOFF_BASE_MS,
            max_ms: DEFAULT_BACKOFF_MAX_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(base_ms: u64, max_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_ms,
            max_ms,
            max_attempts,
        }
    }

    /// Delay before the given 1-indexed attempt, or `None` once the budget
    /// is spent.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        if attempt == 1 {
            return Some(Duration::ZERO);
        }
        Some(calculate_backoff(attempt - 1, self.base_ms, self.max_ms))
    }
}

/// Bounded retry for idempotent reads (task list reloads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub retries: u32,
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            base_ms: 200,
            max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-indexed).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        calculate_backoff(retry, self.base_ms, self.max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff_doubles_and_caps() {
        assert_eq!(calculate_backoff(1, 250, 5000), Duration::from_millis(250));
        assert_eq!(calculate_backoff(2, 250, 5000), Duration::from_millis(500));
        assert_eq!(calculate_backoff(3, 250, 5000), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(10, 250, 5000), Duration::from_millis(5000));
    }

    #[test]
    fn test_calculate_backoff_no_overflow() {
        assert_eq!(
            calculate_backoff(u32::MAX, u64::MAX, 5000),
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn test_reconnect_first_retry_immediate() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Some(Duration::ZERO));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_reconnect_budget_exhausted() {
        let policy = ReconnectPolicy::new(10, 100, 3);
        assert!(policy.delay_for(3).is_some());
        assert_eq!(policy.delay_for(4), None);
        assert_eq!(policy.delay_for(0), None);
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(RetryPolicy::none().retries, 0);
    }
}
