//! Global request-rate limiter.
//!
//! A background ticker releases one token every `1 / requests_per_second`.
//! At most one unclaimed token is banked, so an idle period cannot turn into
//! a burst. Every worker takes one token before it may queue for the
//! concurrency gate. Rates above [`MAX_REQUESTS_PER_SECOND`] are capped to it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Highest rate the ticker runs at; one token per microsecond.
pub const MAX_REQUESTS_PER_SECOND: u32 = 1_000_000;

#[derive(Debug)]
pub struct RateLimiter {
    tokens: Option<Arc<Semaphore>>,
    ticker: Option<JoinHandle<()>>,
}

impl RateLimiter {
    /// Start a limiter; `0` means unlimited. Must be called inside a tokio runtime.
    pub fn new(requests_per_second: u32) -> Self {
        if requests_per_second == 0 {
            return Self {
                tokens: None,
                ticker: None,
            };
        }
        let period = Duration::from_secs(1) / requests_per_second.min(MAX_REQUESTS_PER_SECOND);
        let tokens = Arc::new(Semaphore::new(0));
        let ticker = tokio::spawn(tick(Arc::clone(&tokens), period));
        Self {
            tokens: Some(tokens),
            ticker: Some(ticker),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.tokens.is_none()
    }

    /// Wait for one token. Returns `false` if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        let Some(tokens) = &self.tokens else {
            return !cancel.is_cancelled();
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            permit = tokens.acquire() => match permit {
                Ok(p) => {
                    p.forget();
                    true
                }
                Err(_) => false,
            },
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

async fn tick(tokens: Arc<Semaphore>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if tokens.available_permits() == 0 {
            tokens.add_permits(1);
        }
    }
}
