use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Width of the admission window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Global sliding-window rate limiter.
///
/// Every admitted request is remembered until it falls out of the window, and a
/// request is admitted only while fewer than `limit` remain. One instance is shared
/// by all callers regardless of channel or recipient.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            admitted: Mutex::new(VecDeque::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit one request if fewer than `limit` were admitted within the window.
    ///
    /// Eviction, comparison and recording happen under one lock acquisition, so
    /// concurrent callers can never overshoot the limit.
    pub fn admit(&self, limit: u32) -> bool {
        let now = Instant::now();
        let mut admitted = self.admitted.lock();
        evict_expired(&mut admitted, now, self.window);

        if admitted.len() >= limit as usize {
            warn!(
                "Rate limit exceeded: {} requests in the last {:?}",
                admitted.len(),
                self.window
            );
            return false;
        }

        admitted.push_back(now);
        debug!("Rate limit check passed, {} of {} used", admitted.len(), limit);
        true
    }

    /// Number of admissions currently inside the window.
    pub fn len(&self) -> usize {
        let mut admitted = self.admitted.lock();
        evict_expired(&mut admitted, Instant::now(), self.window);
        admitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Timestamps are pushed in order, so expired ones are always at the front.
fn evict_expired(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = admitted.front() {
        if now.duration_since(oldest) < window {
            break;
        }
        admitted.pop_front();
    }
}
