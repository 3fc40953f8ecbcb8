//! In-process fixed-window rate limiter keyed by (scope, client).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Window count above which expired windows are swept.
const SWEEP_THRESHOLD: usize = 4096;

/// A quota such as "30 per minute".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub window: Duration,
}

impl Quota {
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(3600),
        }
    }

    /// Human form used in 429 messages, e.g. "30 per 1 minute".
    pub fn describe(&self) -> String {
        let secs = self.window.as_secs();
        if secs % 3600 == 0 {
            format!("{} per {} hour", self.limit, secs / 3600)
        } else if secs % 60 == 0 {
            format!("{} per {} minute", self.limit, secs / 60)
        } else {
            format!("{} per {} second", self.limit, secs)
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    length: Duration,
    count: u32,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(&'static str, String), Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one hit for `client` under `scope` and report whether it fits the quota.
    pub async fn check(&self, scope: &'static str, client: &str, quota: Quota) -> Decision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < w.length);
        }

        let window = windows
            .entry((scope, client.to_string()))
            .or_insert(Window {
                started: now,
                length: quota.window,
                count: 0,
            });

        if now.duration_since(window.started) >= quota.window {
            window.started = now;
            window.length = quota.window;
            window.count = 0;
        }

        let reset_after = quota
            .window
            .saturating_sub(now.duration_since(window.started));

        if window.count >= quota.limit {
            return Decision {
                allowed: false,
                limit: quota.limit,
                remaining: 0,
                reset_after,
            };
        }

        window.count += 1;
        Decision {
            allowed: true,
            limit: quota.limit,
            remaining: quota.limit - window.count,
            reset_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_describe() {
        assert_eq!(Quota::per_minute(30).describe(), "30 per 1 minute");
        assert_eq!(Quota::per_hour(100).describe(), "100 per 1 hour");
        assert_eq!(
            Quota {
                limit: 5,
                window: Duration::from_secs(10)
            }
            .describe(),
            "5 per 10 second"
        );
    }

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new();
        let quota = Quota::per_minute(3);

        for expected_remaining in [2, 1, 0] {
            let d = tokio_test::block_on(limiter.check("weather", "10.0.0.1", quota));
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }

        let d = tokio_test::block_on(limiter.check("weather", "10.0.0.1", quota));
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.limit, 3);
        assert!(d.reset_after <= Duration::from_secs(60));
    }

    #[test]
    fn test_clients_and_scopes_are_independent() {
        let limiter = RateLimiter::new();
        let quota = Quota::per_minute(1);

        assert!(tokio_test::block_on(limiter.check("weather", "a", quota)).allowed);
        assert!(!tokio_test::block_on(limiter.check("weather", "a", quota)).allowed);
        assert!(tokio_test::block_on(limiter.check("weather", "b", quota)).allowed);
        assert!(tokio_test::block_on(limiter.check("forecast", "a", quota)).allowed);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimiter::new();
        let quota = Quota {
            limit: 1,
            window: Duration::from_millis(20),
        };

        assert!(limiter.check("bulk", "a", quota).await.allowed);
        assert!(!limiter.check("bulk", "a", quota).await.allowed);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check("bulk", "a", quota).await.allowed);
    }

    #[tokio::test]
    async fn test_sweep_keeps_windows_of_longer_quotas() {
        let limiter = RateLimiter::new();
        let hourly = Quota::per_hour(1);
        let short = Quota {
            limit: 1,
            window: Duration::from_millis(10),
        };

        assert!(limiter.check("index", "victim", hourly).await.allowed);
        assert!(!limiter.check("index", "victim", hourly).await.allowed);

        for i in 0..SWEEP_THRESHOLD - 1 {
            limiter.check("weather", &format!("client-{}", i), short).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Reaching the threshold sweeps only the expired short windows.
        assert!(limiter.check("weather", "trigger", short).await.allowed);
        assert_eq!(limiter.windows.lock().await.len(), 2);

        assert!(!limiter.check("index", "victim", hourly).await.allowed);
    }
}
