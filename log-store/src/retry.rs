//! Exponential backoff for store writes.
//!
//! Only transport failures and `429`/`503` are retried. Every other non-2xx
//! status is final. Delays start at `initial_backoff` and double; there is no
//! sleep after the last attempt.

use std::{fmt::Display, future::Future, pin::Pin, time::Duration};

use reqwest::StatusCode;
use tracing::{error, warn};

use crate::errors::StoreError;

/// How many times to try and how long to wait in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << shift)
    }
}

/// Boxed future returned by [`Sleeper::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Waits between attempts; swapped out in tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, d: Duration) -> SleepFuture<'_>;
}

/// `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, d: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(d))
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpOutcome {
    pub status: StatusCode,
    pub body: String,
}

/// Statuses that signal a transient condition on the store side.
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

/// Runs `attempt` until it returns 2xx, a non-retryable status, or the policy is used up.
///
/// # Errors
/// - [`StoreError::Rejected`] for a non-retryable status
/// - [`StoreError::RetriesExhausted`] when every attempt hit a transient failure
pub async fn send_with_backoff<F, Fut, E>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    op: &'static str,
    mut attempt: F,
) -> Result<HttpOutcome, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<HttpOutcome, E>>,
    E: Display,
{
    let max = policy.max_attempts.max(1);
    let mut last = String::new();

    for n in 1..=max {
        match attempt().await {
            Ok(out) if out.status.is_success() => return Ok(out),
            Ok(out) if is_retryable(out.status) => {
                warn!(op, attempt = n, status = %out.status, "transient store status");
                last = format!("HTTP {}: {}", out.status, out.body);
            }
            Ok(out) => {
                error!(op, attempt = n, status = %out.status, body = %out.body, "store rejected request");
                return Err(StoreError::Rejected {
                    op,
                    status: out.status,
                    body: out.body,
                });
            }
            Err(e) => {
                warn!(op, attempt = n, error = %e, "transport failure");
                last = e.to_string();
            }
        }

        if n < max {
            sleeper.sleep(policy.delay_after(n)).await;
        }
    }

    error!(op, attempts = max, last = %last, "retries exhausted");
    Err(StoreError::RetriesExhausted {
        op,
        attempts: max,
        last,
    })
}
