//! Bounded retry with linear backoff
//!
//! Wraps a single logical call in up to `max_attempts` tries. Between
//! attempts the calling task suspends for `base_delay * attempt` (linear
//! backoff); there is no suspension after the final attempt. Whether a
//! failure is worth retrying is the caller's call, expressed through a
//! [`RetryPolicy`]; non-retryable failures short-circuit immediately without
//! consuming the remaining attempts.
//!
//! An optional `max_total_time` deadline bounds the whole sequence: once it
//! elapses, remaining retries are aborted and the caller sees
//! [`RetryError::DeadlineExceeded`], which callers treat exactly like
//! exhaustion.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    #[error("All retry attempts exhausted after {attempts} tries")]
    AttemptsExhausted { attempts: u32 },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable {
        #[source]
        source: E,
    },

    /// The caller-supplied deadline elapsed before the operation succeeded
    #[error("Retry deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration },

    /// The retry configuration is invalid
    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl<E> RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// True for the exhaustion-class terminals (attempts spent, deadline hit,
    /// or a failure that was never worth retrying).
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::AttemptsExhausted { .. }
                | Self::DeadlineExceeded { .. }
                | Self::NonRetryable { .. }
        )
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E>: Send + Sync {
    /// Decide whether the error is worth another attempt
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation after the backoff delay
    Retry,
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating inter-attempt delays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Linear backoff: `base_delay * attempt` (attempt is 1-based)
    Linear { base_delay: Duration },
}

impl BackoffStrategy {
    /// Calculate the delay after the given completed attempt (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Linear { base_delay } => base_delay.saturating_mul(attempt),
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts for one logical call
    pub max_attempts: u32,
    /// Backoff strategy for inter-attempt delays
    pub backoff: BackoffStrategy,
    /// Maximum total time to spend on the call, including backoff
    pub max_total_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Linear { base_delay: Duration::from_millis(100) },
            max_total_time: None,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RetryError<std::convert::Infallible>> {
        if self.max_attempts == 0 {
            return Err(RetryError::InvalidConfiguration {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn linear_backoff(mut self, base_delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Linear { base_delay };
        self
    }

    pub fn max_total_time(mut self, duration: Duration) -> Self {
        self.config.max_total_time = Some(duration);
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryError<std::convert::Infallible>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The main retry executor
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Create with default configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            if let Some(max_time) = self.config.max_total_time {
                let elapsed = start.elapsed();
                if elapsed >= max_time {
                    warn!(?elapsed, attempts = attempt, "retry deadline exceeded");
                    return Err(RetryError::DeadlineExceeded { elapsed });
                }
            }

            attempt += 1;
            debug!(attempt, max_attempts = self.config.max_attempts, "executing operation");

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt >= self.config.max_attempts {
                        warn!(
                            attempts = attempt,
                            error = ?error,
                            "all retry attempts exhausted"
                        );
                        return Err(RetryError::AttemptsExhausted { attempts: attempt });
                    }

                    match self.policy.should_retry(&error, attempt) {
                        RetryDecision::Stop => {
                            debug!(error = ?error, "error is not retryable, stopping");
                            return Err(RetryError::NonRetryable { source: error });
                        }
                        RetryDecision::Retry => {
                            let mut delay = self.config.backoff.calculate_delay(attempt);
                            if let Some(max_time) = self.config.max_total_time {
                                // Never sleep past the deadline; the loop top
                                // turns the expiry into DeadlineExceeded.
                                delay = delay.min(max_time.saturating_sub(start.elapsed()));
                            }
                            warn!(attempt, ?delay, "operation failed, retrying after backoff");
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::*;

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry policy - never retries
    #[derive(Debug, Clone)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Predicate-based retry policy
    #[derive(Debug)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool + Send + Sync,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
