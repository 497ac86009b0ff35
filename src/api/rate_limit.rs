//! Sliding-window rate limiting.
//!
//! Four windows are checked in order per request — burst, minute, hour,
//! day — and the request is rejected at the first exceeded window with a
//! retry hint equal to that window's size. Bookkeeping sits behind a store
//! trait so the in-memory default can be swapped for a shared store.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Outcome of a single window check.
#[derive(Debug, Clone, Copy)]
pub struct WindowUsage {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

/// Sliding-window bookkeeping: evict entries older than `now - window`,
/// admit while the count is under `limit`, record the hit when admitted.
pub trait RateLimitStore: Send {
    fn hit(&mut self, key: &str, limit: u32, window: Duration, now: Instant) -> WindowUsage;

    /// Drop idle keys to bound memory. Called opportunistically on access.
    fn purge(&mut self, now: Instant);
}

/// In-memory store, one timestamp queue per key.
#[derive(Default)]
pub struct MemoryRateStore {
    windows: HashMap<String, VecDeque<Instant>>,
}

impl RateLimitStore for MemoryRateStore {
    fn hit(&mut self, key: &str, limit: u32, window: Duration, now: Instant) -> WindowUsage {
        let queue = self.windows.entry(key.to_string()).or_default();
        while queue
            .front()
            .is_some_and(|ts| now.duration_since(*ts) >= window)
        {
            queue.pop_front();
        }

        let count = queue.len() as u32;
        let allowed = count < limit;
        if allowed {
            queue.push_back(now);
        }
        WindowUsage {
            allowed,
            limit,
            remaining: limit.saturating_sub(count + u32::from(allowed)),
        }
    }

    fn purge(&mut self, now: Instant) {
        const IDLE: Duration = Duration::from_secs(24 * 3600);
        self.windows
            .retain(|_, queue| queue.back().is_some_and(|ts| now.duration_since(*ts) < IDLE));
    }
}

/// Window limits for one class of routes.
#[derive(Debug, Clone, Copy)]
pub struct RateProfile {
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    pub burst_size: u32,
    pub burst_window: Duration,
}

pub const DEFAULT_PROFILE: RateProfile = RateProfile {
    requests_per_minute: 60,
    requests_per_hour: 1000,
    requests_per_day: 10_000,
    burst_size: 10,
    burst_window: Duration::from_secs(10),
};

/// Credential endpoints get the tightest budget.
pub const AUTH_PROFILE: RateProfile = RateProfile {
    requests_per_minute: 10,
    requests_per_hour: 100,
    requests_per_day: 500,
    burst_size: 3,
    burst_window: Duration::from_secs(60),
};

pub const PUBLIC_PROFILE: RateProfile = RateProfile {
    requests_per_minute: 30,
    requests_per_hour: 300,
    requests_per_day: 1000,
    burst_size: 5,
    burst_window: Duration::from_secs(10),
};

const ROUTE_PROFILES: &[(&str, &RateProfile)] = &[
    ("/api/v1/auth/login", &AUTH_PROFILE),
    ("/api/v1/auth/register", &AUTH_PROFILE),
    ("/api/v1/auth/refresh", &AUTH_PROFILE),
    ("/api/v1/company/contact", &PUBLIC_PROFILE),
    ("/api/v1/company/info", &PUBLIC_PROFILE),
    ("/api/v1/company/services", &PUBLIC_PROFILE),
    ("/api/v1/lab-tests", &PUBLIC_PROFILE),
];

/// Select the profile for a request path by prefix match.
pub fn profile_for_path(path: &str) -> &'static RateProfile {
    for (prefix, profile) in ROUTE_PROFILES {
        if path.starts_with(prefix) {
            return profile;
        }
    }
    &DEFAULT_PROFILE
}

/// Verdict for one request across all four windows.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    /// Minute-window limit and remaining, used for response headers.
    pub limit: u32,
    pub remaining: u32,
    /// Size of the exceeded window, when rejected.
    pub retry_after: Option<u64>,
}

pub struct RateLimiter {
    store: Box<dyn RateLimitStore>,
    last_purge: Instant,
}

const PURGE_INTERVAL: Duration = Duration::from_secs(300);

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_store(Box::new(MemoryRateStore::default()))
    }

    pub fn with_store(store: Box<dyn RateLimitStore>) -> Self {
        Self {
            store,
            last_purge: Instant::now(),
        }
    }

    pub fn check(&mut self, key: &str, profile: &RateProfile) -> RateDecision {
        self.check_at(key, profile, Instant::now())
    }

    pub fn check_at(&mut self, key: &str, profile: &RateProfile, now: Instant) -> RateDecision {
        if now.duration_since(self.last_purge) >= PURGE_INTERVAL {
            self.store.purge(now);
            self.last_purge = now;
        }

        let windows: [(&str, u32, Duration); 4] = [
            ("burst", profile.burst_size, profile.burst_window),
            ("minute", profile.requests_per_minute, Duration::from_secs(60)),
            ("hour", profile.requests_per_hour, Duration::from_secs(3600)),
            ("day", profile.requests_per_day, Duration::from_secs(86_400)),
        ];

        let mut minute_usage: Option<WindowUsage> = None;
        for (name, limit, window) in windows {
            let usage = self.store.hit(&format!("{key}:{name}"), limit, window, now);
            if name == "minute" {
                minute_usage = Some(usage);
            }
            if !usage.allowed {
                return RateDecision {
                    allowed: false,
                    limit: usage.limit,
                    remaining: 0,
                    retry_after: Some(window.as_secs()),
                };
            }
        }

        let minute = minute_usage.expect("minute window always checked");
        RateDecision {
            allowed: true,
            limit: minute.limit,
            remaining: minute.remaining,
            retry_after: None,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(per_minute: u32, burst: u32) -> RateProfile {
        RateProfile {
            requests_per_minute: per_minute,
            requests_per_hour: 1000,
            requests_per_day: 10_000,
            burst_size: burst,
            burst_window: Duration::from_secs(10),
        }
    }

    #[test]
    fn nth_plus_one_request_is_rejected() {
        let mut limiter = RateLimiter::new();
        let profile = profile(3, 100);
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("user:1", &profile, now).allowed);
        }
        let rejected = limiter.check_at("user:1", &profile, now);
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after, Some(60));
        assert_eq!(rejected.remaining, 0);
    }

    #[test]
    fn window_expiry_resets_remaining() {
        let mut limiter = RateLimiter::new();
        let profile = profile(2, 100);
        let start = Instant::now();

        assert!(limiter.check_at("user:1", &profile, start).allowed);
        assert!(limiter.check_at("user:1", &profile, start).allowed);
        assert!(!limiter.check_at("user:1", &profile, start).allowed);

        // Advance past the minute window: allowed again, remaining reset to N-1.
        let later = start + Duration::from_secs(61);
        let decision = limiter.check_at("user:1", &profile, later);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, profile.requests_per_minute - 1);
    }

    #[test]
    fn burst_window_rejects_first() {
        let mut limiter = RateLimiter::new();
        let profile = profile(100, 2);
        let now = Instant::now();

        assert!(limiter.check_at("ip:1.2.3.4", &profile, now).allowed);
        assert!(limiter.check_at("ip:1.2.3.4", &profile, now).allowed);
        let rejected = limiter.check_at("ip:1.2.3.4", &profile, now);
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after, Some(10));
        assert_eq!(rejected.limit, 2);
    }

    #[test]
    fn keys_are_isolated() {
        let mut limiter = RateLimiter::new();
        let profile = profile(1, 100);
        let now = Instant::now();

        assert!(limiter.check_at("user:1", &profile, now).allowed);
        assert!(limiter.check_at("user:2", &profile, now).allowed);
        assert!(!limiter.check_at("user:1", &profile, now).allowed);
    }

    #[test]
    fn remaining_counts_down() {
        let mut limiter = RateLimiter::new();
        let profile = profile(5, 100);
        let now = Instant::now();

        assert_eq!(limiter.check_at("user:1", &profile, now).remaining, 4);
        assert_eq!(limiter.check_at("user:1", &profile, now).remaining, 3);
    }

    #[test]
    fn purge_drops_idle_keys() {
        let mut store = MemoryRateStore::default();
        let now = Instant::now();
        store.hit("user:1:minute", 10, Duration::from_secs(60), now);
        assert_eq!(store.windows.len(), 1);

        store.purge(now + Duration::from_secs(25 * 3600));
        assert!(store.windows.is_empty());
    }

    #[test]
    fn auth_routes_get_strict_profile() {
        assert_eq!(
            profile_for_path("/api/v1/auth/login").requests_per_minute,
            AUTH_PROFILE.requests_per_minute
        );
        assert_eq!(
            profile_for_path("/api/v1/lab-tests").requests_per_minute,
            PUBLIC_PROFILE.requests_per_minute
        );
        assert_eq!(
            profile_for_path("/api/v1/lab-tests/123").requests_per_minute,
            PUBLIC_PROFILE.requests_per_minute
        );
        assert_eq!(
            profile_for_path("/api/v1/reports").requests_per_minute,
            DEFAULT_PROFILE.requests_per_minute
        );
        assert_eq!(
            profile_for_path("/api/v1/auth/me").requests_per_minute,
            DEFAULT_PROFILE.requests_per_minute
        );
    }
}
