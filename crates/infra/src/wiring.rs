//! Composition root helpers
//!
//! Translates the loaded [`Config`] into assembled components: the billing
//! HTTP client wrapped in the breaker + retry composition, the event
//! channel, the customer service, and the consumer workers. An application
//! binary (or an integration test) calls `assemble` once and hands the
//! pieces to its runtime.

use std::sync::Arc;
use std::time::Duration;

use provana_common::resilience::{CircuitBreakerConfig, ConfigError, RetryConfig};
use provana_core::{
    BillingAccountDirectory, CustomerService, CustomerStore, EventChannel, PipelineMetrics,
    ProvisioningClient,
};
use provana_domain::events::{PROVISIONING_TOPIC, RECORD_CREATED_TOPIC};
use provana_domain::{BreakerSettings, Config, CoreError, Result, RetrySettings};

use crate::billing::client::{BillingClientConfig, HttpBillingClient};
use crate::billing::worker::{ProvisioningWorker, ProvisioningWorkerConfig};
use crate::channel::memory::{InMemoryChannelConfig, InMemoryEventChannel};
use crate::notify::listener::{RecordCreatedListener, RecordCreatedListenerConfig};

/// Map breaker settings onto the resilience config
pub fn breaker_config(settings: &BreakerSettings) -> Result<CircuitBreakerConfig> {
    CircuitBreakerConfig::builder()
        .failure_threshold(settings.failure_threshold)
        .open_duration(Duration::from_secs(settings.open_duration_secs))
        .build()
        .map_err(config_error)
}

/// Map retry settings onto the resilience config
pub fn retry_config(settings: &RetrySettings) -> Result<RetryConfig> {
    let mut builder = RetryConfig::builder()
        .max_attempts(settings.max_attempts)
        .linear_backoff(Duration::from_millis(settings.base_delay_ms));
    if let Some(deadline_ms) = settings.deadline_ms {
        builder = builder.max_total_time(Duration::from_millis(deadline_ms));
    }
    builder.build().map_err(|err| CoreError::Config(err.to_string()))
}

fn config_error(err: ConfigError) -> CoreError {
    CoreError::Config(err.to_string())
}

/// Assembled application components
pub struct AppStack {
    pub channel: InMemoryEventChannel,
    pub client: Arc<ProvisioningClient>,
    pub service: CustomerService,
    pub metrics: Arc<PipelineMetrics>,
}

/// Build the full pipeline from configuration.
///
/// The primary store stays a caller-supplied collaborator; everything else
/// is wired here.
pub fn assemble(config: &Config, store: Arc<dyn CustomerStore>) -> Result<AppStack> {
    let channel =
        InMemoryEventChannel::new(InMemoryChannelConfig { partitions: config.channel.partitions });

    let rpc = HttpBillingClient::with_config(BillingClientConfig::from(&config.billing))
        .map_err(|err| CoreError::Config(err.to_string()))?;

    let metrics = Arc::new(PipelineMetrics::new());
    let client = Arc::new(
        ProvisioningClient::builder(Arc::new(rpc), Arc::new(channel.clone()))
            .breaker_config(breaker_config(&config.breaker)?)
            .retry_config(retry_config(&config.retry)?)
            .metrics(Arc::clone(&metrics))
            .build()
            .map_err(config_error)?,
    );

    let service =
        CustomerService::new(store, Arc::clone(&client), Arc::new(channel.clone()));

    Ok(AppStack { channel, client, service, metrics })
}

impl AppStack {
    /// Subscribe and build the provisioning consumer worker
    pub async fn provisioning_worker(
        &self,
        config: &Config,
        directory: Arc<dyn BillingAccountDirectory>,
    ) -> Result<ProvisioningWorker> {
        let subscription = self
            .channel
            .subscribe(PROVISIONING_TOPIC, &config.channel.provisioning_group)
            .await
            .map_err(|err| CoreError::Channel(err.to_string()))?;

        Ok(ProvisioningWorker::new(
            subscription.into(),
            directory,
            ProvisioningWorkerConfig::default(),
        ))
    }

    /// Subscribe and build the record-created listener
    pub async fn record_created_listener(&self, config: &Config) -> Result<RecordCreatedListener> {
        let subscription = self
            .channel
            .subscribe(RECORD_CREATED_TOPIC, &config.channel.notification_group)
            .await
            .map_err(|err| CoreError::Channel(err.to_string()))?;

        Ok(RecordCreatedListener::new(
            subscription.into(),
            RecordCreatedListenerConfig::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::store::memory::{InMemoryAccountDirectory, InMemoryCustomerStore};

    use super::*;

    #[tokio::test]
    async fn assemble_builds_stack_from_default_config() {
        let config = Config::default();
        let store = Arc::new(InMemoryCustomerStore::new());

        let stack = assemble(&config, store).unwrap();
        assert_eq!(stack.metrics.snapshot().completed, 0);

        let directory = Arc::new(InMemoryAccountDirectory::new());
        let worker = stack.provisioning_worker(&config, directory).await.unwrap();
        assert!(!worker.is_running());

        let listener = stack.record_created_listener(&config).await.unwrap();
        assert!(!listener.is_running());
    }

    #[test]
    fn settings_map_onto_resilience_configs() {
        let breaker = breaker_config(&BreakerSettings {
            failure_threshold: 3,
            open_duration_secs: 10,
        })
        .unwrap();
        assert_eq!(breaker.failure_threshold, 3);
        assert_eq!(breaker.open_duration, Duration::from_secs(10));

        let retry = retry_config(&RetrySettings {
            max_attempts: 4,
            base_delay_ms: 250,
            deadline_ms: Some(2_000),
        })
        .unwrap();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.max_total_time, Some(Duration::from_secs(2)));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let result = breaker_config(&BreakerSettings {
            failure_threshold: 0,
            open_duration_secs: 10,
        });
        assert!(matches!(result, Err(CoreError::Config(_))));

        let result = retry_config(&RetrySettings {
            max_attempts: 0,
            base_delay_ms: 100,
            deadline_ms: None,
        });
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
