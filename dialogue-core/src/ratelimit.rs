//! Keyed sliding-count rate limiter used for history requests (§4.2).

use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry {
    count: u32,
    reset_at: Instant,
}

/// A fixed-window counter per key. Cloning shares the underlying map, the
/// same pattern the teacher uses for its `RedisClient` wrapper
/// (`broz-shared/src/clients/redis.rs`): a thin `Clone` struct over shared
/// state rather than passing `&mut` state around.
#[derive(Clone)]
pub struct RateLimiter {
    entries: std::sync::Arc<DashMap<String, Entry>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: std::sync::Arc::new(DashMap::new()),
            max_requests,
            window,
        }
    }

    /// Default history rate limit: 20 requests per 60s per connection (§5).
    pub fn history_default() -> Self {
        Self::new(20, Duration::from_secs(60))
    }

    /// `isAllowed(key)`.
    pub fn is_allowed(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            count: 0,
            reset_at: now,
        });

        if entry.count == 0 || now >= entry.reset_at {
            entry.count = 1;
            entry.reset_at = now + self.window;
            return true;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }

    /// `remaining(key)`.
    pub fn remaining(&self, key: &str) -> u32 {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if now < entry.reset_at => {
                self.max_requests.saturating_sub(entry.count)
            }
            _ => self.max_requests,
        }
    }

    /// Sweep expired entries so the map does not grow unbounded. Intended
    /// to be driven by a detached `tokio::time::interval` loop (§9:
    /// "use a non-blocking ticker; detach it").
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| now < entry.reset_at);
    }

    /// Spawn the sweeper on the current tokio runtime. The returned handle
    /// is intentionally left undetached-but-unawaited by callers; dropping
    /// it does not stop the task, matching "must not prevent process exit".
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_requests_per_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.is_allowed("conn-1"));
        assert!(limiter.is_allowed("conn-1"));
        assert!(limiter.is_allowed("conn-1"));
        assert!(!limiter.is_allowed("conn-1"));
    }

    #[test]
    fn remaining_reflects_consumed_budget() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        assert_eq!(limiter.remaining("conn-1"), 5);
        limiter.is_allowed("conn-1");
        limiter.is_allowed("conn-1");
        assert_eq!(limiter.remaining("conn-1"), 3);
    }

    #[test]
    fn distinct_keys_have_independent_budgets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.is_allowed("a"));
        assert!(limiter.is_allowed("b"));
        assert!(!limiter.is_allowed("a"));
    }

    #[test]
    fn resets_after_window_elapses() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.is_allowed("conn-1"));
        assert!(!limiter.is_allowed("conn-1"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.is_allowed("conn-1"));
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        limiter.is_allowed("conn-1");
        std::thread::sleep(Duration::from_millis(30));
        limiter.sweep();
        assert!(limiter.entries.is_empty());
    }
}
