//! Retry with exponential backoff for rate-limited requests.
//!
//! The policy is independent of how requests are built: it only sees a
//! closure returning `Result<T, ProviderError>`. Sleeping goes through the
//! [`Sleeper`] trait so tests can record delays instead of waiting.

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, warn};

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry, in seconds.
pub const DEFAULT_BASE_DELAY_SECS: f64 = 5.0;

/// Default factor applied to the delay after each retry.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Upper bound on attempts accepted by config validation.
pub const MAX_RETRY_ATTEMPTS: u32 = 20;

/// Longest single backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Something that can pause the current thread.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps for real.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested delays without sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Sum of all requested delays.
    pub fn total(&self) -> Duration {
        self.delays().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    /// Every attempt was rate limited.
    #[error("rate limited on all {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ProviderError },

    /// A non-retryable error ended the loop early.
    #[error("attempt {attempt} failed: {error}")]
    Fatal { attempt: u32, error: ProviderError },
}

/// Exponential backoff without jitter: the n-th retry waits
/// `base_delay * multiplier^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds.
    pub base_delay_secs: f64,
    /// Factor applied to the delay after each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_secs: DEFAULT_BASE_DELAY_SECS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_secs: f64, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay_secs,
            backoff_multiplier,
        }
    }

    /// Delay after the given failed attempt (1-based), capped at
    /// [`MAX_RETRY_DELAY`]. Negative or NaN delays become zero.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay_secs * self.backoff_multiplier.powi(exponent);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }

    /// Run `operation` until it succeeds, fails with a non-rate-limit error,
    /// or runs out of attempts. There is no sleep after the final attempt.
    pub fn run<T, F>(&self, sleeper: &dyn Sleeper, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Result<T, ProviderError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last = ProviderError::EmptyResponse;

        for attempt in 1..=attempts {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() => {
                    if attempt < attempts {
                        let delay = self.delay_after(attempt);
                        warn!(
                            "Rate limit hit (attempt {}/{}). Retrying in {:.1}s",
                            attempt,
                            attempts,
                            delay.as_secs_f64()
                        );
                        sleeper.sleep(delay);
                    }
                    last = err;
                }
                Err(err) => {
                    error!("Request failed on attempt {}: {}", attempt, err);
                    return Err(RetryError::Fatal {
                        attempt,
                        error: err,
                    });
                }
            }
        }

        Err(RetryError::Exhausted { attempts, last })
    }
}
