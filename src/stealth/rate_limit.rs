//! Shared token-bucket rate limiter.
//!
//! One instance gates all outbound call volume: every concurrent race task
//! and every fan-out page task waits on the same bucket.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use tokio_util::sync::CancellationToken;

use super::StealthError;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token-bucket limiter with a steady rate and a burst capacity.
#[derive(Debug)]
pub struct RateLimiter {
    inner: DirectLimiter,
}

impl RateLimiter {
    /// `per_second` is the steady refill rate; `burst` is the bucket depth.
    /// Non-positive inputs are clamped to the smallest legal quota.
    pub fn new(per_second: f64, burst: u32) -> Self {
        let period = if per_second > 0.0 {
            Duration::from_secs_f64(1.0 / per_second)
        } else {
            Duration::from_secs(1)
        };
        let burst = NonZeroU32::new(burst.max(1)).expect("burst clamped to >= 1");
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).expect("non-zero")))
            .allow_burst(burst);
        Self {
            inner: governor::RateLimiter::direct(quota),
        }
    }

    /// Block until a token is available, or until the cancellation signal
    /// fires, whichever comes first.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), StealthError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StealthError::Canceled),
            _ = self.inner.until_ready() => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_tokens_are_granted_immediately() {
        let limiter = RateLimiter::new(1.0, 3);
        let cancel = CancellationToken::new();
        let start = std::time::Instant::now();
        for _ in 0..3 {
            limiter.wait(&cancel).await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn wait_observes_cancellation() {
        // Rate so slow the second token cannot arrive during the test.
        let limiter = RateLimiter::new(0.01, 1);
        let cancel = CancellationToken::new();
        limiter.wait(&cancel).await.unwrap();

        let waiter = {
            let cancel = cancel.clone();
            async move { limiter.wait(&cancel).await }
        };
        let handle = tokio::spawn(waiter);
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        match handle.await.unwrap() {
            Err(StealthError::Canceled) => {}
            other => panic!("expected Canceled, got {other:?}"),
        }
    }
}
