//! Provisioning client: breaker + retry composition with channel fallback
//!
//! The composition order is deliberate and explicit: the circuit breaker
//! decides whether to even try, the retry executor governs transient
//! failures within one permitted call, and the breaker observes only the
//! call-level outcome after retries resolve. On rejection or exhaustion the
//! client does not propagate an error; it defers the request through the
//! fallback publisher and reports `Deferred`. Only a failed fallback append
//! surfaces as `Failed` - at that point both paths are gone.

use std::sync::Arc;

use provana_common::resilience::{
    CircuitBreaker, CircuitBreakerConfig, Clock, ConfigError, ConfigResult, ResilienceError,
    RetryConfig, RetryDecision, RetryExecutor, RetryPolicy, SystemClock,
};
use provana_domain::types::ProvisioningOutcome;
use tracing::{error, info, instrument, warn};

use super::fallback::FallbackPublisher;
use super::metrics::PipelineMetrics;
use super::ports::{AccountProvisioner, BillingCallError, EventProducer};

/// Breaker key for the billing dependency
pub const BILLING_BREAKER_KEY: &str = "billing-service";

/// Retry policy admitting only transient billing failures
#[derive(Debug, Clone, Default)]
pub struct TransientBillingFailures;

impl RetryPolicy<BillingCallError> for TransientBillingFailures {
    fn should_retry(&self, error: &BillingCallError, _attempt: u32) -> RetryDecision {
        if error.is_transient() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Client for provisioning downstream billing accounts
pub struct ProvisioningClient<C: Clock = SystemClock> {
    rpc: Arc<dyn AccountProvisioner>,
    fallback: FallbackPublisher,
    breaker: Arc<CircuitBreaker<C>>,
    retry: RetryExecutor<TransientBillingFailures>,
    metrics: Arc<PipelineMetrics>,
}

impl ProvisioningClient<SystemClock> {
    /// Assemble a client from configuration via the builder
    pub fn builder(
        rpc: Arc<dyn AccountProvisioner>,
        producer: Arc<dyn EventProducer>,
    ) -> ProvisioningClientBuilder {
        ProvisioningClientBuilder {
            rpc,
            producer,
            breaker: None,
            breaker_config: CircuitBreakerConfig::default(),
            retry_config: RetryConfig::default(),
            metrics: None,
        }
    }
}

impl<C: Clock> ProvisioningClient<C> {
    /// Assemble a client from already-built parts.
    ///
    /// Useful for sharing a breaker from a registry or injecting a mock
    /// clock in tests; production wiring normally goes through the builder.
    pub fn from_parts(
        rpc: Arc<dyn AccountProvisioner>,
        fallback: FallbackPublisher,
        breaker: Arc<CircuitBreaker<C>>,
        retry: RetryExecutor<TransientBillingFailures>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self { rpc, fallback, breaker, retry, metrics }
    }

    /// Provision a billing account for the subject.
    ///
    /// Never returns an error: every failure mode collapses into the
    /// [`ProvisioningOutcome`] the orchestrator records.
    #[instrument(skip(self, name, contact))]
    pub async fn provision(
        &self,
        subject_id: &str,
        name: &str,
        contact: &str,
    ) -> ProvisioningOutcome {
        let result = self
            .breaker
            .execute(|| self.retry.execute(|| self.rpc.create_account(subject_id, name, contact)))
            .await;

        match result {
            Ok(account) => {
                self.metrics.record_completed();
                info!(
                    subject_id,
                    account_ref = %account.account_ref,
                    status = ?account.status,
                    "billing account provisioned"
                );
                ProvisioningOutcome::Completed { account_ref: account.account_ref }
            }
            Err(ResilienceError::CircuitOpen) => {
                self.metrics.record_breaker_rejection();
                warn!(subject_id, "billing circuit open, deferring provisioning");
                self.defer(subject_id, name, contact).await
            }
            Err(ResilienceError::OperationFailed { source }) => {
                self.metrics.record_retries_exhausted();
                warn!(
                    subject_id,
                    error = %source,
                    "billing call did not complete, deferring provisioning"
                );
                self.defer(subject_id, name, contact).await
            }
        }
    }

    /// Metrics shared with this client
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The breaker guarding the billing dependency
    pub fn breaker(&self) -> Arc<CircuitBreaker<C>> {
        Arc::clone(&self.breaker)
    }

    async fn defer(&self, subject_id: &str, name: &str, contact: &str) -> ProvisioningOutcome {
        match self.fallback.publish(subject_id, name, contact).await {
            Ok(()) => {
                self.metrics.record_fallback_publish();
                self.metrics.record_deferred();
                ProvisioningOutcome::Deferred
            }
            Err(err) => {
                self.metrics.record_failed();
                error!(
                    subject_id,
                    error = %err,
                    "fallback publish failed; both provisioning paths are down"
                );
                ProvisioningOutcome::Failed { reason: err.to_string() }
            }
        }
    }
}

/// Builder wiring configuration into a [`ProvisioningClient`]
pub struct ProvisioningClientBuilder {
    rpc: Arc<dyn AccountProvisioner>,
    producer: Arc<dyn EventProducer>,
    breaker: Option<Arc<CircuitBreaker<SystemClock>>>,
    breaker_config: CircuitBreakerConfig,
    retry_config: RetryConfig,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl ProvisioningClientBuilder {
    /// Share an existing breaker, typically
    /// `registry.breaker(BILLING_BREAKER_KEY)`, so all clients targeting the
    /// billing dependency see one health state.
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker<SystemClock>>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> ConfigResult<ProvisioningClient<SystemClock>> {
        self.retry_config.validate().map_err(|err| ConfigError::Invalid {
            message: err.to_string(),
        })?;
        let breaker = match self.breaker {
            Some(breaker) => breaker,
            None => Arc::new(CircuitBreaker::new(self.breaker_config)?),
        };
        let retry = RetryExecutor::new(self.retry_config, TransientBillingFailures);
        let fallback = FallbackPublisher::new(self.producer);
        let metrics = self.metrics.unwrap_or_default();

        Ok(ProvisioningClient::from_parts(self.rpc, fallback, breaker, retry, metrics))
    }
}
