//! Bounded exponential-backoff retry.
//!
//! The delay schedule is a pure function of the retry index; the executor
//! is generic over the fallible operation and knows nothing about LLMs.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::ClassifyError;

/// Longest single backoff delay, whatever the multiplier says.
const MAX_DELAY: Duration = Duration::from_secs(3600);

/// Retry budget and backoff shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,

    /// Base delay. Default: 1s.
    pub initial_delay: Duration,

    /// Growth factor per retry. Default: 2.0.
    pub multiplier: f64,

    /// Upper bound of the uniform random jitter added to each wait. Default: 1s.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default jitter.
    pub fn new(max_retries: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            multiplier,
            ..Default::default()
        }
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, 1.0).with_jitter(Duration::ZERO)
    }

    /// Set the jitter bound (zero disables jitter).
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `retry_index` (0 = the first retry), without jitter.
    ///
    /// The first retry goes out immediately; after that the wait is
    /// `initial_delay * multiplier^retry_index`, capped at one hour.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        if retry_index == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(retry_index.min(i32::MAX as u32) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= MAX_DELAY.as_secs_f64() {
            return MAX_DELAY;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// The full jitter-free schedule, one entry per retry.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries).map(|i| self.delay_for(i)).collect()
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let fraction: f64 = rand::rng().random_range(0.0..1.0);
        self.max_jitter.mul_f64(fraction)
    }
}

/// Errors that know whether another attempt could help.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for ClassifyError {
    fn is_transient(&self) -> bool {
        ClassifyError::is_transient(self)
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Non-transient failure; propagated as soon as it happened.
    Permanent { attempts: u32, error: E },

    /// Every attempt failed transiently; carries the last failure.
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// Attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

impl From<RetryError<ClassifyError>> for ClassifyError {
    fn from(err: RetryError<ClassifyError>) -> Self {
        match err {
            RetryError::Permanent { error, .. } => error,
            RetryError::Exhausted { attempts, last } => ClassifyError::RetryExhausted {
                attempts,
                source: Box::new(last),
            },
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget runs out.
///
/// There is no delay before the first attempt. Before retry `i` the executor
/// sleeps `policy.delay_for(i)` plus jitter.
pub async fn invoke_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !error.is_transient() {
            return Err(RetryError::Permanent { attempts, error });
        }
        if attempts >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts,
                last: error,
            });
        }

        let delay = policy.delay_for(attempts - 1) + policy.jitter();
        warn!(
            error = %error,
            attempt = attempts,
            max_attempts = max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
