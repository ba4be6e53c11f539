//! Per-administrator notification rate limiting.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

/// One administrator's counter within the current hour window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitTracker {
    pub count: u32,
    pub window_reset: DateTime<Utc>,
}

/// Sliding-hour rate limiter keyed by administrator id.
///
/// A notification *pass* (immediate delivery or batch flush) acquires one
/// slot per administrator regardless of how many channels it fans out to.
/// Once the window reset lies in the past the counter starts over on next
/// access.
pub struct RateLimiter {
    limit: u32,
    trackers: Mutex<HashMap<String, RateLimitTracker>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            trackers: Mutex::new(HashMap::new()),
        }
    }

    /// Try to take one slot for the administrator.
    ///
    /// Returns `false` when the limit for the current window is exhausted;
    /// the check and the increment are one atomic step.
    pub async fn try_acquire(&self, admin_id: &str) -> bool {
        let now = Utc::now();
        let mut trackers = self.trackers.lock().await;

        let tracker = trackers
            .entry(admin_id.to_string())
            .or_insert_with(|| RateLimitTracker {
                count: 0,
                window_reset: now + Duration::hours(1),
            });

        if tracker.window_reset <= now {
            tracker.count = 0;
            tracker.window_reset = now + Duration::hours(1);
        }

        if tracker.count >= self.limit {
            debug!(admin = admin_id, "Notification rate limit exhausted");
            return false;
        }

        tracker.count += 1;
        true
    }

    /// Current tracker snapshot for an administrator, if any.
    pub async fn tracker(&self, admin_id: &str) -> Option<RateLimitTracker> {
        self.trackers.lock().await.get(admin_id).copied()
    }
}
