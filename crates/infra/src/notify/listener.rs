//! Listener for record-created notifications
//!
//! An independent subscriber over the `record-created` topic. There is no
//! acknowledgement back to the orchestrator and no ordering relationship to
//! the provisioning path; this listener just observes and logs each created
//! record, the way an analytics sink would. Poison messages are committed
//! and skipped like on the provisioning topic.

use std::sync::Arc;
use std::time::Duration;

use provana_core::EventSubscription;
use provana_domain::events::EventEnvelope;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the record-created listener.
#[derive(Debug, Clone)]
pub struct RecordCreatedListenerConfig {
    /// Maximum number of deliveries to process per tick
    pub batch_size: usize,
    /// Interval between polling attempts
    pub poll_interval: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for RecordCreatedListenerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            poll_interval: Duration::from_millis(500),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Record-created notification listener with explicit lifecycle management.
pub struct RecordCreatedListener {
    subscription: Arc<dyn EventSubscription>,
    config: RecordCreatedListenerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl RecordCreatedListener {
    /// Create a new listener over an existing subscription.
    pub fn new(
        subscription: Arc<dyn EventSubscription>,
        config: RecordCreatedListenerConfig,
    ) -> Self {
        Self { subscription, config, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Start the listener, spawning the background task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), String> {
        if self.is_running() {
            return Err("Listener already running".to_string());
        }

        self.cancellation = CancellationToken::new();

        let subscription = Arc::clone(&self.subscription);
        let poll_interval = self.config.poll_interval;
        let batch_size = self.config.batch_size;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Record-created listener cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {
                        if let Err(e) = Self::process_batch(&subscription, batch_size).await {
                            error!(error = %e, "Notification batch failed");
                        }
                    }
                }
            }
        });

        self.task_handle = Some(handle);
        info!("Record-created listener started");

        Ok(())
    }

    /// Stop the listener and wait for the task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), String> {
        if !self.is_running() {
            return Err("Listener not running".to_string());
        }

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Listener task panicked: {}", e);
                    return Err("Listener task panicked".to_string());
                }
                Err(_) => {
                    warn!("Listener task did not complete within timeout");
                    return Err("Listener task timeout".to_string());
                }
            }
        }

        info!("Record-created listener stopped");
        self.cancellation = CancellationToken::new();

        Ok(())
    }

    /// Returns true when the listener task is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn process_batch(
        subscription: &Arc<dyn EventSubscription>,
        batch_size: usize,
    ) -> Result<(), String> {
        for _ in 0..batch_size {
            let delivery = subscription
                .next_delivery()
                .await
                .map_err(|e| format!("Failed to fetch notification: {e}"))?;

            let Some(delivery) = delivery else {
                break;
            };

            match EventEnvelope::decode(&delivery.payload) {
                Ok(envelope) => {
                    info!(
                        subject_id = %envelope.subject_id,
                        name = %envelope.name,
                        contact = %envelope.contact,
                        event_type = %envelope.event_type,
                        "Record event received"
                    );
                }
                Err(err) => {
                    warn!(
                        partition = delivery.offset.partition,
                        offset = delivery.offset.offset,
                        error = %err,
                        "Poison notification, skipping"
                    );
                }
            }

            subscription
                .commit(delivery.offset)
                .await
                .map_err(|e| format!("Failed to commit notification: {e}"))?;
        }

        Ok(())
    }
}

impl Drop for RecordCreatedListener {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("RecordCreatedListener dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
