use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

/// Sliding-window limiter keyed by client address.
#[derive(Debug, Clone)]
pub struct ClientRateLimiter {
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    max_requests: usize,
}

impl ClientRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests: max_requests.max(1),
        }
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let mut guard = self.windows.lock();
        let hits = guard.entry(client.to_string()).or_default();

        while hits
            .front()
            .is_some_and(|front| now.duration_since(*front) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests {
            let oldest = hits.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.duration_since(oldest));
            return RateDecision::Limited { retry_after };
        }

        hits.push_back(now);
        RateDecision::Allowed
    }

    /// Drops clients with no hits inside the window.
    pub fn prune(&self) {
        let now = Instant::now();
        self.windows.lock().retain(|_, hits| {
            hits.back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });
    }
}
