//! Provisioning consumer for deferred billing-account requests
//!
//! Long-lived subscriber over the provisioning topic. Each delivery is
//! decoded and applied through the idempotent account directory; the offset
//! is committed only after the downstream operation completes, so a crash
//! before commit causes redelivery, which the idempotence of
//! `create_if_absent` makes safe. Undecodable payloads are poison messages:
//! logged and committed (skipped), never retried.
//!
//! The worker shares no memory with the producer side; the durable channel
//! is the only coupling.

use std::sync::Arc;
use std::time::Duration;

use provana_core::{BillingAccountDirectory, EventSubscription};
use provana_domain::events::{EventEnvelope, EventType};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the provisioning worker.
#[derive(Debug, Clone)]
pub struct ProvisioningWorkerConfig {
    /// Maximum number of deliveries to process per tick
    pub batch_size: usize,
    /// Interval between polling attempts
    pub poll_interval: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for ProvisioningWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            poll_interval: Duration::from_millis(500),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Provisioning consumer with explicit lifecycle management.
pub struct ProvisioningWorker {
    subscription: Arc<dyn EventSubscription>,
    directory: Arc<dyn BillingAccountDirectory>,
    config: ProvisioningWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ProvisioningWorker {
    /// Create a new worker over an existing subscription.
    pub fn new(
        subscription: Arc<dyn EventSubscription>,
        directory: Arc<dyn BillingAccountDirectory>,
        config: ProvisioningWorkerConfig,
    ) -> Self {
        Self {
            subscription,
            directory,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the worker, spawning the background processing task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), String> {
        if self.is_running() {
            return Err("Worker already running".to_string());
        }

        info!("Starting provisioning worker");

        self.cancellation = CancellationToken::new();

        let subscription = Arc::clone(&self.subscription);
        let directory = Arc::clone(&self.directory);
        let poll_interval = self.config.poll_interval;
        let batch_size = self.config.batch_size;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::process_loop(subscription, directory, poll_interval, batch_size, cancel).await;
        });

        self.task_handle = Some(handle);
        info!("Provisioning worker started");

        Ok(())
    }

    /// Stop the worker and wait for the processing task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), String> {
        if !self.is_running() {
            return Err("Worker not running".to_string());
        }

        info!("Stopping provisioning worker");

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Worker task panicked: {}", e);
                    return Err("Worker task panicked".to_string());
                }
                Err(_) => {
                    warn!("Worker task did not complete within timeout");
                    return Err("Worker task timeout".to_string());
                }
            }
        }

        info!("Provisioning worker stopped");
        self.cancellation = CancellationToken::new();

        Ok(())
    }

    /// Returns true when a worker instance is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Background processing loop.
    async fn process_loop(
        subscription: Arc<dyn EventSubscription>,
        directory: Arc<dyn BillingAccountDirectory>,
        poll_interval: Duration,
        batch_size: usize,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Provisioning worker process loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(poll_interval) => {
                    if let Err(e) = Self::process_batch(&subscription, &directory, batch_size).await {
                        error!(error = %e, "Batch processing failed");
                    }
                }
            }
        }
    }

    /// Process up to `batch_size` deliveries from the subscription.
    ///
    /// A downstream failure stops the batch without committing, leaving the
    /// message for redelivery on a later tick.
    async fn process_batch(
        subscription: &Arc<dyn EventSubscription>,
        directory: &Arc<dyn BillingAccountDirectory>,
        batch_size: usize,
    ) -> Result<(), String> {
        for _ in 0..batch_size {
            let delivery = subscription
                .next_delivery()
                .await
                .map_err(|e| format!("Failed to fetch delivery: {e}"))?;

            let Some(delivery) = delivery else {
                break;
            };

            let envelope = match EventEnvelope::decode(&delivery.payload) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(
                        partition = delivery.offset.partition,
                        offset = delivery.offset.offset,
                        error = %err,
                        "Poison message, skipping"
                    );
                    subscription
                        .commit(delivery.offset)
                        .await
                        .map_err(|e| format!("Failed to commit poison message: {e}"))?;
                    continue;
                }
            };

            if envelope.event_type != EventType::Requested {
                warn!(
                    subject_id = %envelope.subject_id,
                    event_type = %envelope.event_type,
                    "Unexpected event type on provisioning topic, skipping"
                );
                subscription
                    .commit(delivery.offset)
                    .await
                    .map_err(|e| format!("Failed to commit skipped message: {e}"))?;
                continue;
            }

            match directory
                .create_if_absent(&envelope.subject_id, &envelope.name, &envelope.contact)
                .await
            {
                Ok(created) => {
                    if created {
                        info!(subject_id = %envelope.subject_id, "Billing account created");
                    } else {
                        debug!(
                            subject_id = %envelope.subject_id,
                            "Billing account already exists (idempotent redelivery)"
                        );
                    }
                    subscription
                        .commit(delivery.offset)
                        .await
                        .map_err(|e| format!("Failed to commit delivery: {e}"))?;
                }
                Err(err) => {
                    warn!(
                        subject_id = %envelope.subject_id,
                        error = %err,
                        "Account creation failed, leaving delivery uncommitted for redelivery"
                    );
                    break;
                }
            }
        }

        Ok(())
    }
}

impl Drop for ProvisioningWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ProvisioningWorker dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
