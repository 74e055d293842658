//! Bounded retry policy shared by every upstream call that is retried.
//!
//! The policy owns the attempt budget and the delay schedule; the delay
//! itself goes through a [`Sleeper`] so tests can observe it without
//! waiting. Failures classify themselves through [`Retryable`].

mod cancel;

pub use cancel::*;

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Failure classification for the retry loop.
pub trait Retryable {
    /// `false` ends the loop immediately.
    fn is_retryable(&self) -> bool;
}

/// Something that can wait. Production code uses [`TokioSleeper`].
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry policy for upstream calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    /// 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay_ms: 300,
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Fixed delay between attempts.
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        Duration::from_millis((self.initial_delay_ms as f64 * factor).round() as u64)
    }
}

/// How a retried operation ended.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success { value: T, attempts: u32 },
    /// A non-retryable failure; no further attempts were made
    Terminal { error: E, attempts: u32 },
    /// Every attempt failed with a retryable error
    Exhausted { error: E, attempts: u32 },
    Cancelled { attempts: u32 },
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Retrier that sleeps on the tokio timer.
    pub fn with_tokio(policy: RetryPolicy) -> Self {
        Self::new(policy, Arc::new(TokioSleeper))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails terminally, runs out of attempts,
    /// or `cancel` fires. `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        cancel: &CancelSignal,
        mut op: F,
    ) -> RetryOutcome<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled {
                    attempts: attempt - 1,
                };
            }

            let result = tokio::select! {
                result = op(attempt) => result,
                _ = cancel.cancelled() => {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
            };
            let error = match result {
                Ok(value) => return RetryOutcome::Success { value, attempts: attempt },
                Err(e) => e,
            };

            if !error.is_retryable() {
                return RetryOutcome::Terminal {
                    error,
                    attempts: attempt,
                };
            }

            if attempt == max_attempts {
                return RetryOutcome::Exhausted {
                    error,
                    attempts: attempt,
                };
            }

            let delay = self.policy.delay_after(attempt);
            debug!(
                "{}: attempt {}/{} failed ({}), retrying in {:?}",
                label, attempt, max_attempts, error, delay
            );

            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return RetryOutcome::Cancelled { attempts: attempt };
                }
            }
        }

        // The loop always returns on its last attempt.
        RetryOutcome::Cancelled {
            attempts: max_attempts,
        }
    }
}

/// Sleeper that records requested delays and returns immediately.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
