//! Retry policy for per-tile network and store operations.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use zoomvault::job::RetryPolicy;
//!
//! // Three attempts, one second apart
//! let policy = RetryPolicy::fixed(3, Duration::from_secs(1));
//! assert_eq!(policy.max_attempts(), 3);
//! assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(1)));
//! assert_eq!(policy.delay_for_attempt(3), None);
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::PipelineResult;

/// Default initial delay for exponential backoff (100ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

/// Default maximum delay for exponential backoff (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// How a tile operation handles transient failures.
///
/// Only errors for which
/// [`PipelineError::is_retryable`](crate::error::PipelineError::is_retryable)
/// holds are retried.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RetryPolicy {
    /// No retries - fail immediately on error.
    #[default]
    None,

    /// Fixed number of attempts with constant delay between them.
    Fixed {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay between retry attempts.
        delay: Duration,
    },

    /// Exponential backoff, capped at `max_delay`.
    ExponentialBackoff {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay after the first failure.
        initial_delay: Duration,
        /// Upper bound on any single delay.
        max_delay: Duration,
        /// Multiplier applied after each failure.
        multiplier: f64,
    },
}

impl RetryPolicy {
    /// Creates an exponential backoff policy with the default delays.
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Creates a fixed retry policy.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` once the
    /// attempts are exhausted.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => (attempt < *max_attempts).then_some(*delay),
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                let delay_ms = (initial_delay.as_millis() as f64 * factor)
                    .min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(delay_ms as u64).min(*max_delay))
            }
        }
    }

    /// Maximum number of attempts for this policy.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => *max_attempts,
            Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the policy is exhausted.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> PipelineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() => match self.delay_for_attempt(attempt) {
                    Some(delay) => {
                        debug!(
                            operation,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Retrying after transient failure"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(error),
                },
                Err(error) => return Err(error),
            }
        }
    }
}
