//! Minimum spacing between outbound fetches.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum delay since the *last* request issued through this
/// limiter, regardless of target URL.
///
/// The lock is held across the sleep so concurrent fetch tasks serialize on
/// the spacing instead of all sleeping against the same stale timestamp.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: Mutex::new(None),
        }
    }

    /// Waits until at least `delay` has elapsed since the previous request,
    /// then records the current instant as the new reference point.
    pub async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let next_allowed = previous + self.delay;
            let now = Instant::now();
            if next_allowed > now {
                tokio::time::sleep(next_allowed - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}
