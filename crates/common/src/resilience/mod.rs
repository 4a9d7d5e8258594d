//! Resilience patterns for fault tolerance
//!
//! This module provides generic, reusable implementations of:
//! - **Circuit Breaker**: detects repeated downstream failures and stops
//!   calling a sick dependency until it has had time to recover
//! - **Retry Logic**: bounded retries with linear backoff and a retryability
//!   classification supplied by the caller
//!
//! The two compose explicitly: the breaker decides whether to even try, the
//! retry executor governs transient failures within one permitted call:
//!
//! ```ignore
//! breaker.execute(|| retry.execute(|| rpc_call(...))).await
//! ```
//!
//! The breaker therefore observes only the call-level outcome after retries
//! resolve, and a breaker rejection terminates the composed operation without
//! ever entering the retry loop.

pub mod circuit_breaker;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitBreakerRegistry, CircuitState, Clock, ConfigError, ConfigResult, MockClock,
    ResilienceError, SystemClock,
};
// Re-export retry types
pub use retry::{
    policies, BackoffStrategy, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy, RetryResult,
};
