//! Per-family pacing for outbound calls.
//!
//! One process-wide limiter; each provider family gets its own bucket
//! with a minimum spacing between call *starts*. A caller reserves the
//! next start slot under the lock, then sleeps outside it, so concurrent
//! callers queue up at `spacing` intervals instead of stampeding.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::Family;

pub struct RateLimiter {
    spacing: Duration,
    next_start: Mutex<HashMap<Family, Instant>>,
}

impl RateLimiter {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_start: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until this family's next start slot. Local tools skip the
    /// limiter entirely.
    pub async fn acquire(&self, family: Family) {
        if family == Family::Local {
            return;
        }

        let start = {
            let mut slots = self.next_start.lock();
            let now = Instant::now();
            let slot = slots.entry(family).or_insert(now);
            let start = (*slot).max(now);
            *slot = start + self.spacing;
            start
        };

        tokio::time::sleep_until(start).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn enforces_minimum_spacing() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let t0 = Instant::now();
        limiter.acquire(Family::Search).await;
        limiter.acquire(Family::Search).await;
        limiter.acquire(Family::Search).await;
        assert!(t0.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn families_do_not_interfere() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let t0 = Instant::now();
        limiter.acquire(Family::Search).await;
        limiter.acquire(Family::Weather).await;
        assert!(t0.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn local_family_is_unthrottled() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let t0 = Instant::now();
        limiter.acquire(Family::Local).await;
        limiter.acquire(Family::Local).await;
        assert!(t0.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_queue_in_slots() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(100)));
        let t0 = Instant::now();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let l = limiter.clone();
                tokio::spawn(async move {
                    l.acquire(Family::Amadeus).await;
                    t0.elapsed()
                })
            })
            .collect();
        let mut elapsed: Vec<Duration> = Vec::new();
        for h in handles {
            elapsed.push(h.await.unwrap());
        }
        elapsed.sort();
        assert!(elapsed[2] >= Duration::from_millis(200));
    }
}
