//! Fixed-window rate limiting for outbound Bot API calls.
//!
//! One limiter is created at startup and shared by every [`TelegramClient`]
//! through an `Arc`, so clients built with different tokens still draw from
//! the same budget.
//!
//! The window is fixed, not sliding: up to `max_calls` may start at the very
//! end of one window and another `max_calls` at the start of the next.
//!
//! [`TelegramClient`]: crate::client::TelegramClient

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum number of calls that may start in one window.
    pub max_calls: u32,
    /// Length of a window.
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self { max_calls, window }
    }

    /// N calls per second.
    pub fn per_second(max_calls: u32) -> Self {
        Self::new(max_calls, Duration::from_secs(1))
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_second(30)
    }
}

/// Windows too long for the clock to represent are cut to this.
const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug)]
struct Window {
    count: u32,
    ends_at: Instant,
}

/// Shared fixed-window limiter.
///
/// The count/window pair sits behind a single tokio mutex that is held while
/// a caller waits for the next window. Tokio's mutex is fair, so callers are
/// admitted strictly in the order they arrived.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            window: Mutex::new(Window {
                count: 0,
                ends_at: Instant::now(),
            }),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Wait until a call may start, then count it against the current window.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;

        let now = Instant::now();
        if now >= window.ends_at {
            window.count = 0;
            window.ends_at = self.window_end(now);
        }

        if window.count >= self.limit.max_calls {
            debug!(
                "Rate limit of {} calls reached, waiting {:?} for the next window",
                self.limit.max_calls,
                window.ends_at.saturating_duration_since(now)
            );
            tokio::time::sleep_until(window.ends_at).await;
            // This call opens the fresh window.
            window.count = 1;
            window.ends_at = self.window_end(Instant::now());
        } else {
            window.count += 1;
        }
    }

    fn window_end(&self, start: Instant) -> Instant {
        start
            .checked_add(self.limit.window)
            .or_else(|| start.checked_add(MAX_WINDOW))
            .unwrap_or(start)
    }

    /// Calls counted in the current window so far.
    #[cfg(test)]
    pub(crate) async fn current_count(&self) -> u32 {
        self.window.lock().await.count
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimit::default())
    }
}
