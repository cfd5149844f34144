use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

/// Fixed politeness schedule: a short sleep after every call and a longer
/// one after every `batch_size` calls. No adaptive throttling.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    batch_size: u64,
    batch_pause: Duration,
    calls: AtomicU64,
}

impl RateLimiter {
    pub fn new(delay: Duration, batch_size: u64, batch_pause: Duration) -> Self {
        Self {
            delay,
            batch_size,
            batch_pause,
            calls: AtomicU64::new(0),
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, 0, Duration::ZERO)
    }

    /// Counts calls but never sleeps.
    pub fn disabled() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Records one completed call and sleeps for its share of the schedule.
    pub async fn pause(&self) {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let wait = self.wait_after(call);
        if wait > self.delay {
            info!("Taking a longer break after {} requests", call);
        }
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    fn wait_after(&self, call: u64) -> Duration {
        if self.batch_size > 0 && call % self.batch_size == 0 {
            self.delay + self.batch_pause
        } else {
            self.delay
        }
    }
}
