//! Token-bucket limiter for request origination.
//!
//! Tokens refill continuously at `rate` per second up to `burst`. The bucket
//! starts full, so a run may originate up to `burst` requests immediately and
//! then settles at the target rate. Precision is best-effort: waits are timer
//! sleeps and scheduler jitter is not compensated beyond refilling from the
//! real elapsed time.

use load_common::{LoadError, LoadResult};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default burst covers this much time at the target rate.
const BURST_WINDOW: Duration = Duration::from_millis(100);

/// Absorbs float error so a token refilled to 0.999999... still counts.
const TOKEN_EPSILON: f64 = 1e-9;

/// Shortest sleep between attempts; the timer cannot resolve less.
const MIN_WAIT: Duration = Duration::from_millis(1);

pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl RateLimiter {
    /// Limiter for `rps` requests per second with the default burst.
    pub fn new(rps: u32) -> Self {
        let burst = (rps as f64 * BURST_WINDOW.as_secs_f64()).floor().max(1.0);
        Self::with_burst(rps, burst as u32)
    }

    pub fn with_burst(rps: u32, burst: u32) -> Self {
        let burst = burst.max(1) as f64;
        Self {
            rate: rps.max(1) as f64,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                refilled_at: Instant::now(),
            }),
        }
    }

    pub fn burst(&self) -> u32 {
        self.burst as u32
    }

    /// Take a token now, or report how long until one is available.
    fn try_take(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        let refill = now.duration_since(bucket.refilled_at).as_secs_f64() * self.rate;
        bucket.tokens = (bucket.tokens + refill).min(self.burst);
        bucket.refilled_at = now;

        if bucket.tokens + TOKEN_EPSILON >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let wait = Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate);
            Err(wait.max(MIN_WAIT))
        }
    }

    /// Wait until one origination is admitted.
    ///
    /// Returns `LoadError::Cancelled` as soon as `cancel` fires, including
    /// mid-wait.
    pub async fn acquire(&self, cancel: &CancellationToken) -> LoadResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(LoadError::Cancelled);
            }
            match self.try_take() {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    trace!(wait_us = wait.as_micros() as u64, "Rate limiter waiting");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(LoadError::Cancelled),
                        _ = sleep(wait) => {}
                    }
                }
            }
        }
    }
}
