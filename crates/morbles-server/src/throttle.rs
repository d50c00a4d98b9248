//! Per-name login throttling.
//!
//! Each login name gets a token bucket; every attempt, successful or not,
//! costs one token. This slows down password guessing against a single
//! account without affecting other players.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone)]
struct Allowance {
    tokens: f64,
    refilled_at: Instant,
}

#[derive(Clone)]
pub struct LoginThrottle {
    allowances: Arc<Mutex<HashMap<String, Allowance>>>,
    rate: f64,
    capacity: f64,
}

/// Bucket key for a login name. Matches how the directory looks names up:
/// surrounding whitespace is ignored, case is significant.
fn throttle_key(name: &str) -> &str {
    name.trim()
}

impl LoginThrottle {
    /// `rate` tokens per second, bursts of up to `capacity` attempts.
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            allowances: Arc::new(Mutex::new(HashMap::new())),
            rate,
            capacity,
        }
    }

    /// Record an attempt for `name`; `false` means the caller must back off.
    pub async fn check(&self, name: &str) -> bool {
        let key = throttle_key(name);
        let now = Instant::now();
        let mut allowances = self.allowances.lock().await;
        let allowance = allowances.entry(key.to_string()).or_insert(Allowance {
            tokens: self.capacity,
            refilled_at: now,
        });

        let idle = now.duration_since(allowance.refilled_at).as_secs_f64();
        allowance.tokens = (allowance.tokens + idle * self.rate).min(self.capacity);
        allowance.refilled_at = now;

        if allowance.tokens < 1.0 {
            warn!(name = key, "Login throttled");
            return false;
        }
        allowance.tokens -= 1.0;
        true
    }

    /// Forget names with no attempt in the last `max_idle_secs`.
    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let now = Instant::now();
        self.allowances
            .lock()
            .await
            .retain(|_, a| now.duration_since(a.refilled_at).as_secs_f64() < max_idle_secs);
    }
}

impl Default for LoginThrottle {
    /// One attempt every five seconds sustained, burst of 5.
    fn default() -> Self {
        Self::new(0.2, 5.0)
    }
}
