//! Rate limiter for sign-in attempts
//!
//! Counts failed sign-ins per email address in a sliding window
//! (5 failures per 15 minutes by default).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const DEFAULT_MAX_FAILURES: usize = 5;
const DEFAULT_WINDOW_MINUTES: i64 = 15;

/// Login rate limiter
pub struct LoginRateLimiter {
    attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    max_failures: usize,
    window: Duration,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_FAILURES, Duration::minutes(DEFAULT_WINDOW_MINUTES))
    }

    pub fn with_limits(max_failures: usize, window: Duration) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_failures,
            window,
        }
    }

    /// Whether `email` has used up its failures for the current window
    pub async fn is_limited(&self, email: &str) -> bool {
        let mut attempts = self.attempts.write().await;
        let cutoff = Utc::now() - self.window;

        let entry = attempts.entry(email.to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);

        entry.len() >= self.max_failures
    }

    pub async fn record_failure(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts
            .entry(email.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures for `email` (after a successful sign-in)
    pub async fn clear(&self, email: &str) {
        self.attempts.write().await.remove(&email.to_lowercase());
    }

    /// Drop entries whose failures have all aged out
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
