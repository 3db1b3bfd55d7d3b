//! Request pacing for source adapters
//!
//! [`RequestGate`] enforces a minimum spacing between consecutive requests from
//! one adapter instance. [`MinuteQuota`] adds a token bucket for sources that
//! also publish a per-minute limit.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Last-request gate
///
/// Callers are serialized on the gate: each `wait` returns only once
/// `min_interval` has elapsed since the previous caller was released.
#[derive(Debug)]
pub struct RequestGate {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RequestGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    pub fn from_millis(min_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_interval_ms))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspend until a request may be sent
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Per-minute token bucket
pub struct MinuteQuota {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    per_minute: NonZeroU32,
}

impl MinuteQuota {
    /// `per_minute` of zero is raised to one
    pub fn new(per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            per_minute,
        }
    }

    pub fn per_minute(&self) -> u32 {
        self.per_minute.get()
    }

    /// Suspend until a token is available
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            tracing::debug!(per_minute = self.per_minute.get(), "Per-minute quota reached, waiting");
            self.limiter.until_ready().await;
        }
    }
}
