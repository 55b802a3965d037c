//! Token-bucket throttle for upstream calls
//!
//! The bucket starts full. A background task adds up to `refill_rate`
//! tokens every `refill_duration`, never exceeding `max_capacity`.
//! `acquire` consumes one token, suspending until one is available.

use crate::cancel::CancellationToken;
use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::{Instant, Interval, MissedTickBehavior};

const DEFAULT_REFILL_DURATION_MS: u64 = 1000;

fn default_refill_duration_ms() -> u64 {
    DEFAULT_REFILL_DURATION_MS
}

/// Errors from [`RateLimiter::acquire`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("rate limiter wait cancelled")]
    Cancelled,
    #[error("rate limiter stopped")]
    Stopped,
}

impl From<RateLimitError> for QueryError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Cancelled => QueryError::cancelled(),
            RateLimitError::Stopped => QueryError::other(err.to_string()),
        }
    }
}

/// Bucket parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_capacity: usize,
    pub refill_rate: usize,
    #[serde(default = "default_refill_duration_ms")]
    pub refill_duration_ms: u64,
}

impl RateLimitConfig {
    pub fn new(max_capacity: usize, refill_rate: usize) -> Self {
        Self {
            max_capacity,
            refill_rate,
            refill_duration_ms: DEFAULT_REFILL_DURATION_MS,
        }
    }

    /// Refill period, rounded down to whole milliseconds and never below
    /// one millisecond.
    pub fn with_refill_duration(mut self, duration: Duration) -> Self {
        self.refill_duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    /// The refill period. A zero period reads as one millisecond.
    pub fn refill_duration(&self) -> Duration {
        Duration::from_millis(self.refill_duration_ms.max(1))
    }
}

/// A shared token bucket.
///
/// Tokens are semaphore permits that are forgotten on acquire and
/// re-added by the refill loop.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Semaphore,
}

impl RateLimiter {
    /// Create a full bucket and start its refill loop.
    ///
    /// The loop runs until `cancel` fires; afterwards every `acquire`
    /// fails with [`RateLimitError::Stopped`]. Must be called within a
    /// tokio runtime.
    pub fn start(config: RateLimitConfig, cancel: CancellationToken) -> Arc<Self> {
        let limiter = Arc::new(Self {
            config,
            bucket: Semaphore::new(config.max_capacity),
        });

        // The first refill is due one period after construction, not after
        // the spawned task is first polled.
        let period = config.refill_duration();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let refill = Arc::clone(&limiter);
        tokio::spawn(async move { refill.refill_loop(ticker, cancel).await });

        limiter
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Tokens currently in the bucket
    pub fn available(&self) -> usize {
        self.bucket.available_permits()
    }

    async fn refill_loop(&self, mut ticker: Interval, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let room = self.config.max_capacity.saturating_sub(self.bucket.available_permits());
                    let added = room.min(self.config.refill_rate);
                    if added > 0 {
                        self.bucket.add_permits(added);
                    }
                }
            }
        }

        tracing::debug!(
            max_capacity = self.config.max_capacity,
            "rate limiter refill loop stopped"
        );
        self.bucket.close();
    }

    /// Take one token, waiting for a refill if the bucket is empty.
    ///
    /// Returns how long the caller waited.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Duration, RateLimitError> {
        let start = Instant::now();

        let permit = tokio::select! {
            _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
            permit = self.bucket.acquire() => permit.map_err(|_| RateLimitError::Stopped)?,
        };
        permit.forget();

        let waited = start.elapsed();
        tracing::trace!(waited_ms = waited.as_millis() as u64, "rate limiter token acquired");
        Ok(waited)
    }
}
