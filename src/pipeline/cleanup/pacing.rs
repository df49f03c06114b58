//! Pacing and cancellation for the sequential cleanup worker.
//!
//! The agent endpoints are shared and rate-limited upstream, so records are
//! admitted through a token bucket instead of a fixed sleep: time already
//! spent processing a record counts toward the spacing of the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Cooperative cancellation shared by the runner, the batch controller and
/// the agent invokers.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless cancelled first. Returns false on cancel.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_cancelled();
        }
        tokio::select! {
            _ = self.cancelled() => false,
            _ = tokio::time::sleep(duration) => !self.is_cancelled(),
        }
    }
}

/// Token bucket admitting at most `capacity` records per `refill_every`
/// window on average. A zero interval disables limiting.
pub struct RateLimiter {
    capacity: u32,
    refill_every: Duration,
    tokens: u32,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_every,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// One record per `interval`, with no burst allowance.
    pub fn per_interval(interval: Duration) -> Self {
        Self::new(1, interval)
    }

    fn refill(&mut self, now: Instant) {
        if self.tokens >= self.capacity {
            self.last_refill = now;
            return;
        }
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = (elapsed.as_nanos() / self.refill_every.as_nanos()) as u32;
        if earned > 0 {
            self.tokens = (self.tokens + earned).min(self.capacity);
            self.last_refill += self.refill_every * earned;
            if self.tokens == self.capacity {
                self.last_refill = now;
            }
        }
    }

    /// Wait for a token. Returns false if cancelled while waiting.
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> bool {
        if self.refill_every.is_zero() {
            return !cancel.is_cancelled();
        }
        loop {
            let now = Instant::now();
            self.refill(now);
            if self.tokens > 0 {
                self.tokens -= 1;
                return !cancel.is_cancelled();
            }
            let next = self.last_refill + self.refill_every;
            let wait = next.saturating_duration_since(now);
            if !cancel.sleep(wait).await {
                return false;
            }
        }
    }
}
