//! Fallback publisher for deferred provisioning requests
//!
//! When the synchronous call path cannot complete, the request is encoded as
//! a `REQUESTED` envelope and appended to the provisioning topic, keyed by
//! subject id so redeliveries and ordering stay within one partition. The
//! append itself gets at most one retry before the error is surfaced to the
//! provisioning client, which turns it into the pipeline's only hard failure.

use std::sync::Arc;

use provana_domain::events::{CodecError, EventEnvelope, PROVISIONING_TOPIC};
use thiserror::Error;
use tracing::{debug, warn};

use super::ports::{ChannelError, EventProducer};

/// Errors from publishing the fallback event
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to encode provisioning event: {0}")]
    Encode(#[from] CodecError),

    #[error("Failed to append provisioning event after {attempts} attempts: {source}")]
    Append {
        #[source]
        source: ChannelError,
        attempts: u32,
    },
}

/// Publishes deferred provisioning requests onto the durable channel
pub struct FallbackPublisher {
    producer: Arc<dyn EventProducer>,
    topic: String,
}

impl FallbackPublisher {
    /// Create a publisher targeting the default provisioning topic
    pub fn new(producer: Arc<dyn EventProducer>) -> Self {
        Self::with_topic(producer, PROVISIONING_TOPIC)
    }

    /// Create a publisher targeting a specific topic
    pub fn with_topic(producer: Arc<dyn EventProducer>, topic: impl Into<String>) -> Self {
        Self { producer, topic: topic.into() }
    }

    /// Encode and append a provisioning request event.
    ///
    /// Retries the append once; a second failure is surfaced as
    /// [`PublishError::Append`].
    pub async fn publish(
        &self,
        subject_id: &str,
        name: &str,
        contact: &str,
    ) -> Result<(), PublishError> {
        let envelope = EventEnvelope::provisioning_request(subject_id, name, contact);
        let payload = envelope.encode()?;

        match self.producer.append(&self.topic, subject_id, &payload).await {
            Ok(()) => {
                debug!(subject_id, topic = %self.topic, "provisioning request deferred");
                Ok(())
            }
            Err(first) => {
                warn!(
                    subject_id,
                    error = %first,
                    "fallback append failed, retrying once"
                );
                self.producer
                    .append(&self.topic, subject_id, &payload)
                    .await
                    .map_err(|source| PublishError::Append { source, attempts: 2 })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Mutex as TokioMutex;

    use super::*;

    type AppendStore = TokioMutex<Vec<(String, String, Vec<u8>)>>;

    struct MockProducer {
        appends: AppendStore,
        failures_remaining: AtomicU32,
    }

    impl MockProducer {
        fn new(failures: u32) -> Self {
            Self { appends: TokioMutex::new(Vec::new()), failures_remaining: AtomicU32::new(failures) }
        }
    }

    #[async_trait]
    impl EventProducer for MockProducer {
        async fn append(
            &self,
            topic: &str,
            key: &str,
            payload: &[u8],
        ) -> Result<(), ChannelError> {
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(ChannelError::Unavailable("broker down".to_string()));
            }
            self.appends.lock().await.push((
                topic.to_string(),
                key.to_string(),
                payload.to_vec(),
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_appends_requested_envelope() {
        let producer = Arc::new(MockProducer::new(0));
        let publisher = FallbackPublisher::new(producer.clone());

        publisher.publish("cust-1", "Alice", "alice@example.com").await.unwrap();

        let appends = producer.appends.lock().await;
        assert_eq!(appends.len(), 1);
        assert_eq!(appends[0].0, PROVISIONING_TOPIC);
        assert_eq!(appends[0].1, "cust-1");

        let envelope = EventEnvelope::decode(&appends[0].2).unwrap();
        assert_eq!(envelope.event_type, provana_domain::events::EventType::Requested);
        assert_eq!(envelope.subject_id, "cust-1");
    }

    #[tokio::test]
    async fn publish_retries_once_then_succeeds() {
        let producer = Arc::new(MockProducer::new(1));
        let publisher = FallbackPublisher::new(producer.clone());

        publisher.publish("cust-2", "Bob", "bob@example.com").await.unwrap();
        assert_eq!(producer.appends.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn publish_surfaces_error_after_second_failure() {
        let producer = Arc::new(MockProducer::new(2));
        let publisher = FallbackPublisher::new(producer.clone());

        let result = publisher.publish("cust-3", "Carol", "carol@example.com").await;
        assert!(matches!(result, Err(PublishError::Append { attempts: 2, .. })));
        assert!(producer.appends.lock().await.is_empty());
    }
}
