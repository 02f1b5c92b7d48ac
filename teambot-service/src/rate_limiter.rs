//! Sliding-window rate limiter for outbound model calls.
//!
//! Records the time of every granted call. Once `max_calls` calls fall inside
//! the window, the next caller is given the slot at which the oldest of them
//! leaves the window and sleeps until then. Slots are reserved under the lock,
//! so concurrent waiters never oversubscribe the window.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default sliding window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// A sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum calls per window
    max_calls: usize,
    window: Duration,
    /// Granted (or reserved) call times, oldest first
    calls: Mutex<VecDeque<Instant>>,
    /// Name for logging
    name: String,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` calls per minute.
    pub fn new(name: impl Into<String>, requests_per_minute: u32) -> Self {
        Self::with_window(name, requests_per_minute, DEFAULT_WINDOW)
    }

    /// Create a limiter with a custom window length.
    pub fn with_window(name: impl Into<String>, max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls: (max_calls as usize).max(1),
            window,
            calls: Mutex::new(VecDeque::new()),
            name: name.into(),
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Wait until a call is allowed, then record it.
    ///
    /// Returns how long the caller was held back.
    pub async fn acquire(&self) -> Duration {
        let (slot, now) = {
            let mut calls = self.calls.lock().await;
            let now = Instant::now();
            self.prune(&mut calls, now);

            let slot = if calls.len() >= self.max_calls {
                let oldest = calls[calls.len() - self.max_calls];
                (oldest + self.window).max(now)
            } else {
                now
            };
            calls.push_back(slot);
            (slot, now)
        };

        let wait = slot.saturating_duration_since(now);
        if !wait.is_zero() {
            debug!(
                limiter = %self.name,
                wait_ms = wait.as_millis() as u64,
                "Rate limit reached, waiting for window slot"
            );
            tokio::time::sleep_until(slot).await;
        }
        wait
    }

    /// Number of calls recorded inside the current window, reservations included.
    pub async fn in_window(&self) -> usize {
        let mut calls = self.calls.lock().await;
        self.prune(&mut calls, Instant::now());
        calls.len()
    }

    fn prune(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = calls.front() {
            if now.saturating_duration_since(front) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_under_limit_is_immediate() {
        let limiter = RateLimiter::new("test", 3);
        let start = Instant::now();

        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.in_window().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_over_limit_waits_for_oldest_to_expire() {
        let limiter = RateLimiter::new("test", 2);
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.acquire().await;

        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::from_secs(50));
        assert!(start.elapsed() >= DEFAULT_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_frees_slots() {
        let limiter = RateLimiter::with_window("test", 1, Duration::from_secs(5));

        limiter.acquire().await;
        assert_eq!(limiter.in_window().await, 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(limiter.in_window().await, 0);
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_get_distinct_slots() {
        let limiter = Arc::new(RateLimiter::with_window("test", 1, Duration::from_secs(10)));
        limiter.acquire().await;

        let a = tokio::spawn({
            let limiter = Arc::clone(&limiter);
            async move { limiter.acquire().await }
        });
        let b = tokio::spawn({
            let limiter = Arc::clone(&limiter);
            async move { limiter.acquire().await }
        });

        let mut waits = vec![a.await.unwrap(), b.await.unwrap()];
        waits.sort();
        assert_eq!(waits, vec![Duration::from_secs(10), Duration::from_secs(20)]);
    }
}
