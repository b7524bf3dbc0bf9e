//! In-memory rate limiting for client access-code attempts.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`,
//! keyed by remote address. The access code is the only secret a client
//! has, so verification is capped per address to slow down guessing.
//!
//! TRADE-OFFS
//! ==========
//! State is per process and lost on restart. Idle keys are not evicted;
//! the key space is bounded by the number of distinct client addresses.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("rate limit exceeded (max {limit} requests/{window_secs}s)")]
pub struct RateLimitExceeded {
    pub limit: usize,
    pub window_secs: u64,
}

impl crate::error::ErrorCode for RateLimitExceeded {
    fn error_code(&self) -> &'static str {
        "rate_limited"
    }

    fn status(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::TOO_MANY_REQUESTS
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), limit, window }
    }

    /// Check the key's window, then record the attempt.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] when the key already used its window.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimitExceeded> {
        self.check_and_record_at(key, Instant::now())
    }

    /// Check the key's window without recording an attempt.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] when the key already used its window.
    pub fn check(&self, key: &str) -> Result<(), RateLimitExceeded> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(deque) = inner.get_mut(key) else {
            return Ok(());
        };
        prune_window(deque, now, self.window);
        if deque.len() >= self.limit {
            return Err(RateLimitExceeded { limit: self.limit, window_secs: self.window.as_secs() });
        }
        Ok(())
    }

    /// Check + record with an explicit timestamp (for testing).
    fn check_and_record_at(&self, key: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let deque = inner.entry(key.to_owned()).or_default();
        prune_window(deque, now, self.window);
        if deque.len() >= self.limit {
            return Err(RateLimitExceeded { limit: self.limit, window_secs: self.window.as_secs() });
        }
        deque.push_back(now);
        Ok(())
    }

    /// Number of keys currently tracked.
    #[cfg(test)]
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
