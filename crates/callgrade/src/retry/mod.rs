//! Bounded retries with exponential backoff.
//!
//! A unit of work is attempted up to `max_attempts` times. Failures are
//! classified through [`Retryable`]; only transient ones are retried, after a
//! backoff delay that suspends the calling task alone.

mod error;

pub use error::{is_retryable_message, Retryable, TaskError, RETRYABLE_SIGNATURES};

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cancel::CancelToken;

/// Retry behavior for one call site.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    /// Generic I/O policy.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy for scoring calls: fewer attempts, longer waits.
    pub fn analysis() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(3000),
            max_delay: Duration::from_millis(15_000),
            backoff_multiplier: 2.0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let delay_ms = base_ms * self.backoff_multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.min(max_ms).max(0.0) as u64)
    }
}

/// Run `op` under `policy`, retrying transient failures.
///
/// Returns the first success, or the last error once attempts are exhausted
/// or a non-retryable error occurs.
pub async fn run_with_retry<T, E, F, Fut>(policy: &RetryPolicy, context: &str, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    run_with_retry_cancellable(policy, context, &CancelToken::never(), op).await
}

/// Like [`run_with_retry`], but stops retrying once `cancel` fires.
///
/// Cancellation never interrupts an attempt in progress; it only skips the
/// backoff wait and any further attempts.
pub async fn run_with_retry_cancellable<T, E, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    cancel: &CancelToken,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        debug!(context, attempt, max_attempts, "attempt started");

        let err = match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(context, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let retryable = err.is_retryable();
        if !retryable || attempt >= max_attempts {
            warn!(
                context,
                attempt,
                max_attempts,
                retryable,
                error = %err,
                "attempt failed, giving up"
            );
            return Err(err);
        }

        if cancel.is_cancelled() {
            warn!(context, attempt, error = %err, "attempt failed, cancelled before retry");
            return Err(err);
        }

        let delay = policy.calculate_delay(attempt);
        warn!(
            context,
            attempt,
            max_attempts,
            error = %err,
            "attempt failed, retrying in {:?}",
            delay
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                warn!(context, attempt, "cancelled during backoff");
                return Err(err);
            }
        }

        attempt += 1;
    }
}
