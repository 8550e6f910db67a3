//! Generic per-key request throttle shared by the domain handlers.
//!
//! Two independent disciplines, used per the upstream's published limits:
//! a sliding window (`can_proceed`) and a fixed minimum interval
//! (`try_reserve`). State lives for the process lifetime only.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Default)]
struct KeyState {
    /// Timestamps of granted requests inside the current window.
    window: Vec<Instant>,
    last_request: Option<Instant>,
}

/// In-memory per-key rate limiter. Cheap to share behind an `Arc`; every
/// operation takes one short-lived lock, so single-key reads and writes are
/// linearizable.
#[derive(Default)]
pub struct RateLimiter {
    keys: Mutex<HashMap<String, KeyState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sliding-window check: true when fewer than `max_requests` were
    /// granted inside the trailing `window`. The attempt is recorded only
    /// when it is granted.
    pub fn can_proceed(&self, key: &str, max_requests: usize, window: Duration) -> bool {
        let now = Instant::now();
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        let state = keys.entry(key.to_string()).or_default();

        state.window.retain(|t| now.duration_since(*t) < window);

        if state.window.len() >= max_requests {
            return false;
        }

        state.window.push(now);
        state.last_request = Some(now);
        true
    }

    /// Minimum-interval reservation: when at least `min_interval` has
    /// passed since the last granted request for `key`, stamps the slot and
    /// returns zero. Otherwise returns the remaining wait without stamping,
    /// so the caller sleeps and retries. The check and the stamp happen
    /// under one lock; two concurrent callers can never both see a clear
    /// slot. Independent of the sliding-window check.
    pub fn try_reserve(&self, key: &str, min_interval: Duration) -> Duration {
        let now = Instant::now();
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        let state = keys.entry(key.to_string()).or_default();

        if let Some(last) = state.last_request {
            let wait = min_interval.saturating_sub(now.duration_since(last));
            if !wait.is_zero() {
                return wait;
            }
        }

        state.last_request = Some(now);
        Duration::ZERO
    }

    pub fn clear(&self) {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
