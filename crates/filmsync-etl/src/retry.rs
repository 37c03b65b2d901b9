//! Retry with exponential backoff for calls to external systems
//!
//! Both the Postgres extractor and the Elasticsearch loader wrap their
//! network calls in [`retry_with_backoff`]. Only errors the caller
//! classifies as transient are retried; anything else returns immediately
//! as [`RetryError::Fatal`] so query and logic errors surface unchanged.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

/// Maximum number of attempts for one operation against an external system
pub const MAX_ATTEMPTS: u32 = 5;

/// Delay before the first retry; doubles after every failed attempt
pub const BASE_DELAY_MS: u64 = 100;

/// Cap on total elapsed time across all attempts and delays
pub const MAX_ELAPSED_SECS: u64 = 5;

/// Bounds for [`retry_with_backoff`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before giving up
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles per attempt
    pub base_delay: Duration,
    /// Total time budget; no retry is scheduled that would overrun it
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_elapsed: Duration::from_secs(MAX_ELAPSED_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given the 1-based attempt that just failed
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt.saturating_sub(1))
    }
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error, or the time budget ran out
    Exhausted { attempts: u32, last: E },
    /// The operation failed with an error retrying cannot fix
    Fatal(E),
}

impl<E> RetryError<E> {
    /// The underlying error, whichever way the retry ended
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal(error) => error,
        }
    }
}

/// Run `attempt_fn` until it succeeds, a non-transient error surfaces, or
/// the policy's attempt and time budgets are spent.
///
/// `operation` names the call in retry warnings, e.g. "connect to postgres".
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt_fn: F,
    is_transient: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut attempt = 1;

    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(error) if !is_transient(&error) => return Err(RetryError::Fatal(error)),
            Err(error) => {
                if attempt >= policy.max_attempts {
                    warn!(
                        operation,
                        attempts = attempt,
                        error = %error,
                        "giving up after final attempt"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }

                let delay = policy.delay_after(attempt);
                if started.elapsed() + delay > policy.max_elapsed {
                    warn!(
                        operation,
                        attempts = attempt,
                        error = %error,
                        "retry time budget spent, giving up"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }

                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
        }
    }
}
