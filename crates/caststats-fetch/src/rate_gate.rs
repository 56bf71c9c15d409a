//! Process-wide pacing shared by every upstream call

use governor::{DefaultDirectRateLimiter, Quota};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Longest deferral the gate accepts from a single call
pub const MAX_DEFERRAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Shared gate every attempt passes before touching the network
///
/// Holds a `next_allowed` watermark that only moves forward. A provider that
/// answers 429 pushes the watermark out, and every caller sharing the gate
/// waits for it. An optional `governor` quota paces steady-state traffic.
pub struct RateGate {
    origin: Instant,
    /// Milliseconds after `origin`
    next_allowed_ms: AtomicU64,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl RateGate {
    /// A gate pacing at `requests_per_second`; zero disables pacing
    pub fn new(requests_per_second: u32) -> Self {
        let limiter = NonZeroU32::new(requests_per_second)
            .map(|rps| DefaultDirectRateLimiter::direct(Quota::per_second(rps)));

        Self {
            origin: Instant::now(),
            next_allowed_ms: AtomicU64::new(0),
            limiter,
        }
    }

    /// A gate that only enforces 429 deferrals
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Push the watermark to `now + delay`; an earlier target is ignored
    ///
    /// `delay` is clamped to [`MAX_DEFERRAL`].
    pub fn defer_for(&self, delay: Duration) {
        if delay > MAX_DEFERRAL {
            warn!("Rate gate deferral of {:?} clamped to {:?}", delay, MAX_DEFERRAL);
        }
        let delay = delay.min(MAX_DEFERRAL);
        let now = Instant::now();
        let target = match now.checked_add(delay) {
            Some(until) => self.offset_ms(until),
            None => self.offset_ms(now),
        };
        let previous = self.next_allowed_ms.fetch_max(target, Ordering::AcqRel);
        if target > previous {
            debug!("Rate gate deferred by {:?}", delay);
        }
    }

    /// The earliest instant a request may start
    pub fn next_allowed(&self) -> Instant {
        let offset = Duration::from_millis(self.next_allowed_ms.load(Ordering::Acquire));
        self.origin.checked_add(offset).unwrap_or(self.origin)
    }

    /// How long a request starting now would wait on the watermark
    pub fn remaining(&self) -> Duration {
        self.next_allowed().saturating_duration_since(Instant::now())
    }

    /// Wait for the watermark, then for a pacing permit
    pub async fn wait_ready(&self) {
        // The watermark can move while we sleep.
        loop {
            let next = self.next_allowed();
            if next <= Instant::now() {
                break;
            }
            debug!("Waiting {:?} on rate gate", next.saturating_duration_since(Instant::now()));
            sleep_until(next).await;
        }

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    fn offset_ms(&self, instant: Instant) -> u64 {
        let offset = instant.saturating_duration_since(self.origin);
        // Round up so a waiter never wakes before the deferral ends.
        u64::try_from(offset.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl fmt::Debug for RateGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateGate")
            .field("remaining", &self.remaining())
            .field("paced", &self.limiter.is_some())
            .finish()
    }
}
