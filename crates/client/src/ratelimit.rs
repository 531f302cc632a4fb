//! Token-bucket rate limiter shared by every outbound fetch.
//!
//! Callers that find the bucket empty are delayed, never rejected: each
//! [`RateLimiter::acquire`] reserves a token up front (driving the
//! balance negative if needed) and sleeps until that token would have
//! been refilled. If the waiting future is dropped, for example by a
//! timeout or cancellation `select!`, the reservation is handed back.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Default refill interval: one token every 5 seconds.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Default bucket capacity.
pub const DEFAULT_BURST: u32 = 4;

pub struct RateLimiter {
    interval: Duration,
    burst: u32,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    /// May go negative while callers hold outstanding reservations.
    tokens: f64,
    updated: Instant,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_BURST)
    }
}

impl RateLimiter {
    /// Create a limiter that refills one token per `interval` and holds
    /// at most `burst` tokens. The bucket starts full. A zero interval
    /// disables limiting.
    pub fn new(interval: Duration, burst: u32) -> Self {
        let burst = burst.max(1);
        Self {
            interval,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                updated: Instant::now(),
            }),
        }
    }

    /// Wait until a token is available and consume it.
    pub async fn acquire(&self) {
        let wait = self.reserve(Instant::now());
        if wait.is_zero() {
            return;
        }

        tracing::debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit token");

        let mut reservation = Reservation {
            limiter: self,
            committed: false,
        };
        tokio::time::sleep(wait).await;
        reservation.committed = true;
    }

    /// Tokens currently in the bucket (negative when oversubscribed).
    pub fn available(&self) -> f64 {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    fn reserve(&self, now: Instant) -> Duration {
        let mut bucket = self.lock();
        self.refill(&mut bucket, now);
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 || self.interval.is_zero() {
            Duration::ZERO
        } else {
            self.interval.mul_f64(-bucket.tokens)
        }
    }

    fn release(&self) {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens = (bucket.tokens + 1.0).min(f64::from(self.burst));
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let capacity = f64::from(self.burst);
        if self.interval.is_zero() {
            bucket.tokens = capacity;
        } else {
            let elapsed = now.saturating_duration_since(bucket.updated);
            let earned = elapsed.as_secs_f64() / self.interval.as_secs_f64();
            bucket.tokens = (bucket.tokens + earned).min(capacity);
        }
        bucket.updated = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Bucket> {
        self.bucket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Returns the reserved token if the wait is abandoned.
struct Reservation<'a> {
    limiter: &'a RateLimiter,
    committed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.limiter.release();
        }
    }
}
