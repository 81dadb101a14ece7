//! Bounded retry with exponential backoff and jitter.
//!
//! An operation reports each failure either as retryable or wrapped in a
//! stop signal. Stop signals short-circuit immediately; retryable failures
//! are attempted again until the budget is spent.
//!
//! Between attempts the sleep grows as `previous * 2 + uniform(0, previous)`.
//! Every sleep races the caller's [`CancellationToken`], so Ctrl-C is
//! observed at the next sleep boundary.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use std::time::Instant;

use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default sleep before the second attempt.
pub const DEFAULT_INITIAL_SLEEP: Duration = Duration::from_millis(100);

/// Elapsed time after which each further retry is logged.
pub const DEFAULT_NOTICE_AFTER: Duration = Duration::from_secs(10);

/// Retry budget and pacing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_sleep: Duration,
    pub notice_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_sleep: DEFAULT_INITIAL_SLEEP,
            notice_after: DEFAULT_NOTICE_AFTER,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_sleep(mut self, initial_sleep: Duration) -> Self {
        self.initial_sleep = initial_sleep;
        self
    }
}

/// Failure of a single attempt.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Transient; the engine may try again.
    Retryable(E),
    /// Terminal; propagate unchanged without further attempts.
    Stop(E),
}

impl<E> AttemptError<E> {
    pub fn into_inner(self) -> E {
        match self {
            AttemptError::Retryable(err) | AttemptError::Stop(err) => err,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AttemptError::Retryable(_))
    }
}

/// Why the retry loop gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    /// The operation returned a stop signal.
    #[error("{0}")]
    Stopped(E),

    /// Every attempt failed with a retryable error.
    #[error("{last}")]
    Exhausted { attempts: usize, last: E },

    /// The cancellation token fired before the loop finished.
    #[error("operation cancelled")]
    Cancelled,
}

impl<E> RetryError<E>
where
    E: fmt::Display + fmt::Debug,
{
    /// The last error produced by the operation, if any.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Stopped(err) | RetryError::Exhausted { last: err, .. } => Some(err),
            RetryError::Cancelled => None,
        }
    }
}

/// Runs `op` until it succeeds, returns a stop signal, or the budget is spent.
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
    E: fmt::Display + fmt::Debug,
{
    let max_attempts = policy.max_attempts.max(1);
    let started = Instant::now();
    let mut sleep = policy.initial_sleep;
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        attempt += 1;

        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Stop(err)) => return Err(RetryError::Stopped(err)),
            Err(AttemptError::Retryable(err)) => err,
        };

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        if started.elapsed() >= policy.notice_after {
            tracing::warn!(
                "Request failed ({err}), retrying in {sleep:?} (attempt {}/{max_attempts})",
                attempt + 1
            );
        } else {
            tracing::debug!("attempt {attempt}/{max_attempts} failed: {err}");
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(sleep) => {}
        }
        sleep = next_sleep(sleep);
    }
}

/// `previous * 2 + uniform(0, previous)`.
pub fn next_sleep(previous: Duration) -> Duration {
    let micros = u64::try_from(previous.as_micros()).unwrap_or(u64::MAX);
    let jitter = if micros == 0 {
        0
    } else {
        rand::rng().random_range(0..micros)
    };
    Duration::from_micros(micros.saturating_mul(2).saturating_add(jitter))
}
