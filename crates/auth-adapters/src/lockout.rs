//! Failed sign-in tracking.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    /// Failures tolerated inside one window.
    pub max_failures: u32,
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self { max_failures: 5, window: Duration::minutes(15) }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    failures: u32,
    started: DateTime<Utc>,
}

/// Per-email failure counts in fixed windows.
pub struct AttemptTracker {
    policy: LockoutPolicy,
    windows: DashMap<String, Window>,
}

impl AttemptTracker {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self { policy, windows: DashMap::new() }
    }

    pub fn is_locked(&self, email: &str, now: DateTime<Utc>) -> bool {
        self.windows
            .get(email)
            .is_some_and(|w| now - w.started < self.policy.window && w.failures >= self.policy.max_failures)
    }

    /// Returns the failure count in the current window.
    pub fn record_failure(&self, email: &str, now: DateTime<Utc>) -> u32 {
        // Unknown emails never sign in successfully, so stale windows go here.
        let window = self.policy.window;
        self.windows.retain(|_, w| now - w.started < window);

        let mut entry = self
            .windows
            .entry(email.to_string())
            .or_insert(Window { failures: 0, started: now });
        if now - entry.started >= self.policy.window {
            *entry = Window { failures: 0, started: now };
        }
        entry.failures += 1;
        entry.failures
    }

    pub fn clear(&self, email: &str) {
        self.windows.remove(email);
    }
}
