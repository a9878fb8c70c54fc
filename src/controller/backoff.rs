//! Per-key exponential backoff for failed reconciles

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);

/// Retries never wait longer than this
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);

/// Exponential backoff: `base * 2^attempt`, capped at `max`
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

/// Tracks consecutive failures per item and hands out growing delays
#[derive(Debug)]
pub struct ItemExponentialBackoff<T> {
    base: Duration,
    max: Duration,
    failures: HashMap<T, u32>,
}

impl<T: Eq + Hash + Clone> ItemExponentialBackoff<T> {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: HashMap::new(),
        }
    }

    /// Delay before `item` may be retried; each call counts as one more failure
    pub fn when(&mut self, item: &T) -> Duration {
        let attempts = self.failures.entry(item.clone()).or_insert(0);
        let delay = calculate_backoff(*attempts, self.base, self.max);
        *attempts = attempts.saturating_add(1);
        delay
    }

    /// Number of times `item` has been retried since it was last forgotten
    pub fn num_requeues(&self, item: &T) -> u32 {
        self.failures.get(item).copied().unwrap_or(0)
    }

    /// Reset the failure count of `item`
    pub fn forget(&mut self, item: &T) {
        self.failures.remove(item);
    }
}

impl<T: Eq + Hash + Clone> Default for ItemExponentialBackoff<T> {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}
