//! Minimum-interval rate limiter for external geocoding providers.
//!
//! The public Nominatim instance allows at most one request per second.
//! [`RateLimiter::wait`] hands out permits no closer together than the
//! configured interval. The last-permit instant sits behind an async mutex,
//! so a single limiter can be shared by several tasks and still serialize
//! their requests.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces out requests by at least `min_interval`.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_permit: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter with the given minimum spacing.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_permit: Mutex::new(None),
        }
    }

    /// Creates a limiter from a millisecond interval (as configured in the
    /// service TOML).
    #[must_use]
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// The configured minimum spacing.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next request may be sent.
    ///
    /// The first call returns immediately.
    pub async fn wait(&self) {
        let mut last = self.last_permit.lock().await;

        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                log::trace!(
                    "Rate limiter sleeping {:?}",
                    ready_at.saturating_duration_since(Instant::now())
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}
