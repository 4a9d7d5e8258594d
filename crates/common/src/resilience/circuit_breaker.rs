//! Circuit breaker for guarding calls to a downstream dependency
//!
//! One breaker tracks the health of one downstream dependency. The state
//! machine is a small tagged value behind a mutex: CLOSED counts consecutive
//! failures, OPEN rejects calls until the open window elapses, and HALF_OPEN
//! admits exactly one trial call whose outcome decides the next state.
//! State is never persisted; a cold-started breaker is CLOSED.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Breakers use real monotonic time in production and a controlled mock time
/// in tests, so open-window behavior can be tested without actual delays.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient cloning
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Allows tests to control time progression without actual delays.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Configuration validation error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced by breaker-guarded operations
///
/// Generic over the underlying operation error type `E` so the original
/// error is preserved when the call itself fails.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls without attempting them
    #[error("Circuit breaker is open, rejecting calls")]
    CircuitOpen,

    /// The underlying operation failed
    #[error("Operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, one trial request in flight
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time the circuit stays open before admitting the half-open trial
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, open_duration: Duration::from_secs(30) }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.open_duration.is_zero() {
            return Err(ConfigError::Invalid {
                message: "open_duration must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.config.open_duration = duration;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Circuit breaker metrics snapshot for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_calls: u64,
    pub rejected_calls: u64,
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Tagged state value protected by the breaker's mutex.
///
/// `HalfOpen` exists only while the single trial call is in flight; the
/// claiming caller transitions the state on resolution (or on drop).
#[derive(Debug, Clone, Copy)]
enum BreakerInner {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen,
}

/// Circuit breaker for one downstream dependency
///
/// Share between callers via `Arc` (or hand instances out through a
/// [`CircuitBreakerRegistry`]). All state transitions happen under the state
/// mutex, which also guarantees that exactly one caller can claim the
/// half-open trial; concurrent callers during HALF_OPEN are rejected as if
/// the circuit were still open.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerInner>,
    total_calls: AtomicU64,
    rejected_calls: AtomicU64,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a circuit breaker with default configuration
    pub fn with_defaults() -> Self {
        Self::from_parts(CircuitBreakerConfig::default(), Arc::new(SystemClock))
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, Arc::new(clock)))
    }

    fn from_parts(config: CircuitBreakerConfig, clock: Arc<C>) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerInner::Closed { consecutive_failures: 0 }),
            total_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
            clock,
        }
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Rejects immediately with [`ResilienceError::CircuitOpen`] when the
    /// circuit is open (or another caller holds the half-open trial); no call
    /// is attempted in that case. Otherwise the operation runs and its
    /// outcome drives the state machine.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let Some(permit) = self.try_acquire() else {
            self.rejected_calls.fetch_add(1, Ordering::Relaxed);
            debug!(state = %self.state(), "circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen);
        };

        self.total_calls.fetch_add(1, Ordering::Relaxed);

        match operation().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(error) => {
                permit.failure();
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Claim permission for one call, transitioning OPEN to HALF_OPEN when
    /// the open window has elapsed.
    fn try_acquire(&self) -> Option<CallPermit<'_, C>> {
        let mut state = self.state.lock();
        match *state {
            BreakerInner::Closed { .. } => {
                Some(CallPermit { breaker: self, trial: false, resolved: false })
            }
            BreakerInner::Open { opened_at } => {
                if self.clock.now().duration_since(opened_at) >= self.config.open_duration {
                    *state = BreakerInner::HalfOpen;
                    info!("circuit breaker half-open, admitting one trial call");
                    Some(CallPermit { breaker: self, trial: true, resolved: false })
                } else {
                    None
                }
            }
            // Trial already in flight; reject as if open.
            BreakerInner::HalfOpen => None,
        }
    }

    fn on_success(&self, trial: bool) {
        let mut state = self.state.lock();
        if trial {
            *state = BreakerInner::Closed { consecutive_failures: 0 };
            info!("circuit breaker closed after successful trial call");
        } else if let BreakerInner::Closed { ref mut consecutive_failures } = *state {
            *consecutive_failures = 0;
        }
    }

    fn on_failure(&self, trial: bool) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if trial {
            *state = BreakerInner::Open { opened_at: now };
            warn!("circuit breaker reopened after failed trial call");
            return;
        }

        match *state {
            BreakerInner::Closed { consecutive_failures } => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    *state = BreakerInner::Open { opened_at: now };
                    warn!(failures, "circuit breaker opened");
                } else {
                    *state = BreakerInner::Closed { consecutive_failures: failures };
                }
            }
            // Stale outcome from a call admitted before a transition; the
            // state machine has already moved on.
            BreakerInner::Open { .. } | BreakerInner::HalfOpen => {}
        }
    }

    /// Reopen the circuit when a half-open trial is dropped unresolved
    /// (for example when the caller's future is cancelled).
    fn abandon_trial(&self) {
        let mut state = self.state.lock();
        if matches!(*state, BreakerInner::HalfOpen) {
            *state = BreakerInner::Open { opened_at: self.clock.now() };
            warn!("half-open trial abandoned, reopening circuit");
        }
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        match *self.state.lock() {
            BreakerInner::Closed { .. } => CircuitState::Closed,
            BreakerInner::Open { .. } => CircuitState::Open,
            BreakerInner::HalfOpen => CircuitState::HalfOpen,
        }
    }

    /// Get a metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let (state, consecutive_failures) = match *self.state.lock() {
            BreakerInner::Closed { consecutive_failures } => {
                (CircuitState::Closed, consecutive_failures)
            }
            BreakerInner::Open { .. } => (CircuitState::Open, 0),
            BreakerInner::HalfOpen => (CircuitState::HalfOpen, 0),
        };

        CircuitBreakerMetrics {
            state,
            consecutive_failures,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        *self.state.lock() = BreakerInner::Closed { consecutive_failures: 0 };
        info!("circuit breaker manually reset to closed state");
    }
}

/// Permission for one breaker-guarded call.
///
/// Must be resolved with [`success`](Self::success) or
/// [`failure`](Self::failure); a trial permit dropped unresolved reopens the
/// circuit so the half-open slot cannot leak.
struct CallPermit<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    trial: bool,
    resolved: bool,
}

impl<C: Clock> CallPermit<'_, C> {
    fn success(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.trial);
    }

    fn failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.trial);
    }
}

impl<C: Clock> Drop for CallPermit<'_, C> {
    fn drop(&mut self) {
        if self.trial && !self.resolved {
            self.breaker.abandon_trial();
        }
    }
}

//==============================================================================
// Registry
//==============================================================================

/// Registry handing out one circuit breaker per downstream-dependency key
///
/// All breakers share the registry's configuration and clock. The first call
/// for a key creates its breaker; later calls return the same instance.
pub struct CircuitBreakerRegistry<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    clock: Arc<C>,
    breakers: DashMap<String, Arc<CircuitBreaker<C>>>,
}

impl CircuitBreakerRegistry<SystemClock> {
    /// Create a registry with the given per-breaker configuration
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreakerRegistry<C> {
    /// Create a registry with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, clock: Arc::new(clock), breakers: DashMap::new() })
    }

    /// Get or create the breaker for a downstream-dependency key
    pub fn breaker(&self, key: &str) -> Arc<CircuitBreaker<C>> {
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::from_parts(
                    self.config.clone(),
                    Arc::clone(&self.clock),
                ))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for circuit breaker state transitions, configuration
    //! validation, open-window timing, and the single-trial half-open
    //! property under concurrency.

    use std::io;

    use super::*;

    fn io_err() -> io::Error {
        io::Error::other("downstream failure")
    }

    fn breaker_with_mock(
        threshold: u32,
        open_duration: Duration,
        clock: MockClock,
    ) -> CircuitBreaker<MockClock> {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .open_duration(open_duration)
            .build()
            .unwrap();
        CircuitBreaker::with_clock(config, clock).unwrap()
    }

    async fn fail_once<C: Clock>(cb: &CircuitBreaker<C>) {
        let result = cb.execute(|| async { Err::<(), _>(io_err()) }).await;
        assert!(matches!(result, Err(ResilienceError::OperationFailed { .. })));
    }

    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_config_default() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.open_duration, Duration::from_secs(30));
    }

    #[test]
    fn test_config_validation() {
        assert!(CircuitBreakerConfig::builder().failure_threshold(0).build().is_err());
        assert!(CircuitBreakerConfig::builder()
            .open_duration(Duration::ZERO)
            .build()
            .is_err());
        assert!(CircuitBreakerConfig::builder().failure_threshold(3).build().is_ok());
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let cb = CircuitBreaker::with_defaults();
        let result = cb.execute(|| async { Ok::<_, io::Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_at_threshold() {
        let cb = breaker_with_mock(3, Duration::from_secs(30), MockClock::new());

        fail_once(&cb).await;
        fail_once(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed, "below threshold stays closed");

        fail_once(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open, "threshold failure opens circuit");
    }

    #[tokio::test]
    async fn test_open_rejects_without_calling() {
        let clock = MockClock::new();
        let cb = breaker_with_mock(1, Duration::from_secs(30), clock.clone());
        fail_once(&cb).await;

        let called = std::sync::atomic::AtomicBool::new(false);
        let result = cb
            .execute(|| async {
                called.store(true, Ordering::SeqCst);
                Ok::<_, io::Error>(())
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::CircuitOpen)));
        assert!(!called.load(Ordering::SeqCst), "open circuit must not attempt the call");
        assert_eq!(cb.metrics().rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker_with_mock(3, Duration::from_secs(30), MockClock::new());

        fail_once(&cb).await;
        fail_once(&cb).await;
        assert_eq!(cb.metrics().consecutive_failures, 2);

        let _ = cb.execute(|| async { Ok::<_, io::Error>(()) }).await;
        assert_eq!(cb.metrics().consecutive_failures, 0);

        // Two more failures still are not enough to reach the threshold.
        fail_once(&cb).await;
        fail_once(&cb).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_trial_success_closes_circuit() {
        let clock = MockClock::new();
        let cb = breaker_with_mock(1, Duration::from_secs(30), clock.clone());
        fail_once(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(31));

        let result = cb.execute(|| async { Ok::<_, io::Error>("recovered") }).await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_trial_failure_restarts_open_window() {
        let clock = MockClock::new();
        let cb = breaker_with_mock(1, Duration::from_secs(30), clock.clone());
        fail_once(&cb).await;

        clock.advance(Duration::from_secs(31));
        fail_once(&cb).await; // the trial call fails
        assert_eq!(cb.state(), CircuitState::Open);

        // The previous window has long expired, but the failed trial reset
        // opened_at, so the circuit must still reject.
        clock.advance(Duration::from_secs(15));
        let result = cb.execute(|| async { Ok::<_, io::Error>(()) }).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen)));

        clock.advance(Duration::from_secs(16));
        let result = cb.execute(|| async { Ok::<_, io::Error>(()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_window_not_elapsed_stays_open() {
        let clock = MockClock::new();
        let cb = breaker_with_mock(1, Duration::from_secs(30), clock.clone());
        fail_once(&cb).await;

        clock.advance(Duration::from_secs(29));
        let result = cb.execute(|| async { Ok::<_, io::Error>(()) }).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen)));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_half_open_admits_exactly_one_trial() {
        let clock = MockClock::new();
        let cb =
            Arc::new(breaker_with_mock(1, Duration::from_secs(30), clock.clone()));
        fail_once(&cb).await;
        clock.advance(Duration::from_secs(31));

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let trial_cb = Arc::clone(&cb);
        let trial = tokio::spawn(async move {
            trial_cb
                .execute(|| async {
                    // Hold the trial slot until the test releases it.
                    let _ = rx.await;
                    Ok::<_, io::Error>(())
                })
                .await
        });

        // Wait until the trial has claimed the half-open slot.
        while cb.state() != CircuitState::HalfOpen {
            tokio::task::yield_now().await;
        }

        // A concurrent caller is rejected as if the circuit were open.
        let result = cb.execute(|| async { Ok::<_, io::Error>(()) }).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen)));

        let _ = tx.send(());
        assert!(trial.await.unwrap().is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_abandoned_trial_reopens_circuit() {
        let clock = MockClock::new();
        let cb =
            Arc::new(breaker_with_mock(1, Duration::from_secs(30), clock.clone()));
        fail_once(&cb).await;
        clock.advance(Duration::from_secs(31));

        let (_tx, rx) = tokio::sync::oneshot::channel::<()>();
        let trial_cb = Arc::clone(&cb);
        let trial = tokio::spawn(async move {
            trial_cb
                .execute(|| async {
                    let _ = rx.await;
                    Ok::<_, io::Error>(())
                })
                .await
        });

        while cb.state() != CircuitState::HalfOpen {
            tokio::task::yield_now().await;
        }

        // Cancel the trial mid-flight; the permit drop must reopen the
        // circuit instead of leaking the half-open slot.
        trial.abort();
        let _ = trial.await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_reset_closes_circuit() {
        let cb = breaker_with_mock(1, Duration::from_secs(30), MockClock::new());
        fail_once(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_registry_isolates_keys() {
        let config = CircuitBreakerConfig::builder().failure_threshold(1).build().unwrap();
        let registry = CircuitBreakerRegistry::new(config).unwrap();

        let billing = registry.breaker("billing");
        fail_once(&billing).await;
        assert_eq!(billing.state(), CircuitState::Open);

        // A different dependency key has its own healthy breaker.
        let ledger = registry.breaker("ledger");
        assert_eq!(ledger.state(), CircuitState::Closed);

        // Same key returns the same instance.
        assert_eq!(registry.breaker("billing").state(), CircuitState::Open);
    }
}
