//! Generic resilience utilities shared across Provana crates.
//!
//! The patterns here are deliberately generic over the caller's error type:
//! the domain-specific wiring (which failures are transient, which downstream
//! key a breaker guards) lives with the callers in `provana-core`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

// Re-export commonly used types and traits for convenience
pub use resilience::{
    BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitBreakerRegistry, CircuitState, Clock, ConfigError, MockClock, ResilienceError,
    RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy, RetryResult, SystemClock,
};
