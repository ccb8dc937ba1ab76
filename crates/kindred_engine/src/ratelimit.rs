//! Per-identity sliding-window admission control.
//!
//! Evaluated before any store or model work. Advisory by design: losing the
//! window map on restart is acceptable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Admit or reject one message for this identity. Admission records the
    /// timestamp; rejection must not mutate the window.
    async fn allow(&self, identity: &str) -> bool;
}

pub struct SlidingWindowLimiter {
    windows: Mutex<HashMap<String, Vec<Instant>>>,
    window: Duration,
    max_messages: usize,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_messages: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            max_messages,
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn allow(&self, identity: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry(identity.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);
        if timestamps.len() >= self.max_messages {
            tracing::debug!(identity, "Rate limit window full, rejecting");
            return false;
        }
        timestamps.push(now);
        true
    }
}

/// Limiter that admits everything. For tests and the web dashboard path.
pub struct UnlimitedLimiter;

#[async_trait]
impl RateLimiter for UnlimitedLimiter {
    async fn allow(&self, _identity: &str) -> bool {
        true
    }
}
