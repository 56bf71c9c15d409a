//! Retry policy for upstream calls

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

/// How hard the fetcher tries before giving up on a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first; zero is treated as one
    pub max_attempts: u32,
    /// Hard limit on a single attempt
    pub attempt_timeout: Duration,
    /// Delay before the second attempt; doubles per retry
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Rate gate deferral after a 429 without `Retry-After`
    pub rate_limit_cooldown: Duration,
    /// Upper bound on any 429 deferral, whatever `Retry-After` asks for
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            rate_limit_cooldown: Duration::from_secs(5),
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max;
        self
    }

    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    pub fn with_max_retry_after(mut self, max_retry_after: Duration) -> Self {
        self.max_retry_after = max_retry_after;
        self
    }

    /// Gate deferral for a 429, clamped to `max_retry_after`
    pub fn rate_limit_deferral(&self, retry_after: Option<Duration>) -> Duration {
        retry_after
            .unwrap_or(self.rate_limit_cooldown)
            .min(self.max_retry_after)
    }

    /// Effective attempt count, never below one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delays slept between failed attempts: `base`, `2·base`, `4·base`, ...
    /// capped at `max_backoff`
    pub fn backoff_schedule(&self) -> impl Iterator<Item = Duration> {
        // tokio-retry yields factor·2, factor·4, ... so the doubled cap and the
        // halving restore a schedule that starts at base.
        let base_ms = u64::try_from(self.base_backoff.as_millis()).unwrap_or(u64::MAX);
        ExponentialBackoff::from_millis(2)
            .factor(base_ms)
            .max_delay(self.max_backoff.saturating_mul(2))
            .map(|delay| delay / 2)
    }
}
