//! Retry with exponential backoff and per-call degradation.
//!
//! Every adapter call in a reconciliation run goes through
//! [`run_adapter_call`], which models the call as a small state machine
//! (`Pending -> InFlight -> Done | RetryScheduled | Degraded`). Callers get
//! back either a value or a terminal error plus the attempt count; nothing in
//! this module panics or propagates through the pipeline.

use pactum_core::{ReconError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts for retryable errors
    pub max_attempts: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Backoff multiplier between attempts
    pub backoff_multiplier: f64,
    /// Jitter fraction applied to each delay (0.2 = up to ±20%)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    /// Creates the default retry configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Sets the jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Calculates the backoff delay before the given retry attempt (1-based),
    /// with jitter applied.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let jittered = if self.jitter > 0.0 {
            let factor = 1.0 + rand::rng().random_range(-self.jitter..=self.jitter);
            capped * factor
        } else {
            capped
        };

        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Terminal outcome of an adapter call after the retry ladder.
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// The call produced a value
    Done { value: T, attempts: usize },
    /// Retries exhausted; the caller should take its degradation path
    Degraded { error: ReconError, attempts: usize },
}

impl<T> CallOutcome<T> {
    /// Converts the outcome back into a `Result`, discarding attempt counts.
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Done { value, .. } => Ok(value),
            Self::Degraded { error, .. } => Err(error),
        }
    }
}

/// Runs an adapter call under a deadline and the retry ladder.
///
/// Transient errors (network, 5xx, rate limit, timeout, retryable repository
/// failures) are retried up to `retry.max_attempts` total attempts with
/// exponential backoff. Permanent adapter errors are retried exactly once to
/// tolerate flakes. Input errors and cancellation are never retried.
pub async fn run_adapter_call<T, F, Fut>(
    operation: &str,
    retry: &RetryConfig,
    deadline: Duration,
    mut call: F,
) -> CallOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    let mut permanent_retry_used = false;

    loop {
        attempts += 1;
        tracing::trace!(operation, attempt = attempts, "adapter call in flight");

        let result = match timeout(deadline, call()).await {
            Ok(result) => result,
            Err(_) => Err(ReconError::timeout(deadline.as_millis() as u64)),
        };

        match result {
            Ok(value) => {
                return CallOutcome::Done { value, attempts };
            }
            Err(error) if error.is_retryable() && attempts < retry.max_attempts => {
                let delay = retry.delay_for_attempt(attempts);
                tracing::warn!(
                    operation,
                    attempt = attempts,
                    max_attempts = retry.max_attempts,
                    ?delay,
                    %error,
                    "transient adapter failure, retry scheduled"
                );
                sleep(delay).await;
            }
            Err(error @ ReconError::AdapterPermanent { .. }) if !permanent_retry_used => {
                permanent_retry_used = true;
                tracing::warn!(operation, %error, "permanent adapter failure, retrying once");
            }
            Err(error) => {
                tracing::warn!(
                    operation,
                    attempts,
                    %error,
                    "adapter call degraded"
                );
                return CallOutcome::Degraded { error, attempts };
            }
        }
    }
}
