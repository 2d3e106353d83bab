//! Continuously-refilling token bucket.

use std::time::Duration;
use tokio::time::Instant;

/// Token bucket with capacity = per-minute limit and continuous refill
/// at `capacity / 60` tokens per second. Starts full.
#[derive(Debug)]
pub(crate) struct TokenBucket {
    capacity: f64,
    available: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub(crate) fn new(per_minute: u32, now: Instant) -> Self {
        let capacity = per_minute as f64;
        Self {
            capacity,
            available: capacity,
            refill_per_sec: capacity / 60.0,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.available =
            (self.available + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Return tokens taken by an admission that was later rejected.
    pub(crate) fn put_back(&mut self, amount: f64) {
        self.available = (self.available + amount).min(self.capacity);
    }

    /// Take `amount` tokens, or report how long until they refill.
    ///
    /// Requests larger than the bucket capacity are clamped to the
    /// capacity so they remain admissible at all.
    pub(crate) fn try_take(&mut self, amount: f64, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        let amount = amount.min(self.capacity);
        if self.available >= amount {
            self.available -= amount;
            Ok(())
        } else {
            let deficit = amount - self.available;
            Err(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }
}
