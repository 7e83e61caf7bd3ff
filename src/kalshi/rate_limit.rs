//! Process-wide request pacing.
//!
//! One [`RateLimiter`] is created at startup and handed (behind an `Arc`) to
//! every client that talks to the same endpoint. Each outbound attempt calls
//! [`RateLimiter::acquire`] right before it is signed and sent.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Minimum-spacing gate shared by all callers.
///
/// Grants are at least `min_interval` apart, measured from one grant to the
/// next (not from response to request), and are handed out in the order
/// callers arrived. Waiters queue on a fair mutex and the holder sleeps while
/// keeping it, so the elapsed check and the timestamp update cannot be split
/// by another caller.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with the given dispatch-to-dispatch spacing
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Create a limiter from a spacing in milliseconds
    pub fn from_millis(min_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_interval_ms))
    }

    /// Wait until dispatch is permitted and return the instant it was granted.
    ///
    /// Dropping the returned future while it waits leaves the limiter as if
    /// the call had never been made.
    pub async fn acquire(&self) -> Instant {
        let mut last_dispatch = self.last_dispatch.lock().await;

        if let Some(previous) = *last_dispatch {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                trace!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "Waiting for rate limit slot"
                );
                sleep_until(ready_at).await;
            }
        }

        let granted = Instant::now();
        *last_dispatch = Some(granted);
        granted
    }

    /// Instant of the most recent grant, if any
    pub async fn last_dispatch(&self) -> Option<Instant> {
        *self.last_dispatch.lock().await
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_millis(150)
    }
}
