//! Per-turn deadline and cancellation.
//!
//! One [`TurnClock`] lives for the duration of a turn. Every await in the
//! turn is bounded through [`TurnClock::bound`], which clamps the caller's
//! budget to the remaining turn budget, and the clock's token propagates
//! to tools so in-flight I/O aborts when the turn is over. Dropping the
//! clock cancels the token, which also retires the watchdog task.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use wf_domain::{Error, Result};

pub struct TurnClock {
    deadline: Instant,
    signal: CancellationToken,
}

impl TurnClock {
    pub fn new(budget: Duration) -> Self {
        let deadline = Instant::now() + budget;
        let signal = CancellationToken::new();

        // Watchdog: fire the signal at the deadline so tools observing the
        // token abort promptly even mid-I/O.
        let watch = signal.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = watch.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => watch.cancel(),
            }
        });

        Self { deadline, signal }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero() || self.signal.is_cancelled()
    }

    /// The cancellation signal handed to tools.
    pub fn signal(&self) -> CancellationToken {
        self.signal.clone()
    }

    /// The per-step budget for an actor LLM call:
    /// `clamp(remaining − 500 ms, 1.5 s, 15 s)`.
    pub fn step_budget(&self) -> Duration {
        let remaining = self.remaining().saturating_sub(Duration::from_millis(500));
        remaining.clamp(Duration::from_millis(1_500), Duration::from_secs(15))
    }

    /// Await `fut` for at most `min(budget, remaining)`.
    pub async fn bound<T, F>(&self, budget: Duration, what: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let effective = budget.min(self.remaining());
        if effective.is_zero() {
            return Err(Error::Timeout(format!("{what}: turn budget exhausted")));
        }
        match tokio::time::timeout(effective, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{what}: exceeded {} ms",
                effective.as_millis()
            ))),
        }
    }
}

impl Drop for TurnClock {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remaining_counts_down() {
        let clock = TurnClock::new(Duration::from_secs(10));
        assert!(clock.remaining() > Duration::from_secs(9));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(clock.remaining() <= Duration::from_secs(6));
        assert!(!clock.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_fires_signal_at_deadline() {
        let clock = TurnClock::new(Duration::from_secs(2));
        let signal = clock.signal();
        assert!(!signal.is_cancelled());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(signal.is_cancelled());
        assert!(clock.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_signal() {
        let clock = TurnClock::new(Duration::from_secs(60));
        let signal = clock.signal();
        drop(clock);
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn step_budget_clamps() {
        let clock = TurnClock::new(Duration::from_secs(60));
        assert_eq!(clock.step_budget(), Duration::from_secs(15));

        let clock = TurnClock::new(Duration::from_secs(3));
        let budget = clock.step_budget();
        assert!(budget >= Duration::from_millis(1_500) && budget <= Duration::from_millis(2_500));
    }

    #[tokio::test(start_paused = true)]
    async fn bound_times_out_slow_futures() {
        let clock = TurnClock::new(Duration::from_secs(10));
        let result: Result<()> = clock
            .bound(Duration::from_secs(1), "slow op", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn bound_clamps_to_remaining() {
        let clock = TurnClock::new(Duration::from_millis(100));
        // Asking for 10s still times out at the turn deadline.
        let start = Instant::now();
        let result: Result<()> = clock
            .bound(Duration::from_secs(10), "op", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
