//! In-memory partitioned event channel
//!
//! An append-only log per (topic, partition) with per-group committed
//! offsets. Delivery position for a group is always its committed offset, so
//! an uncommitted message is redelivered on the next fetch - the at-least-once
//! contract consumers must already tolerate. Ordering is preserved within a
//! partition; messages are partitioned by hashing the append key.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use provana_core::{ChannelError, Delivery, EventChannel, EventProducer, EventSubscription, OffsetToken};
use tracing::debug;

/// Configuration for the in-memory channel
#[derive(Debug, Clone)]
pub struct InMemoryChannelConfig {
    /// Partitions per topic
    pub partitions: u32,
}

impl Default for InMemoryChannelConfig {
    fn default() -> Self {
        Self { partitions: 4 }
    }
}

#[derive(Default)]
struct TopicState {
    /// Append-only payload log per partition
    partitions: Vec<Vec<Arc<[u8]>>>,
    /// Committed offsets per consumer group
    groups: HashMap<String, GroupState>,
}

struct GroupState {
    /// Next offset to deliver, per partition
    committed: Vec<u64>,
    /// Round-robin start partition for the next fetch
    cursor: usize,
}

#[derive(Default)]
struct ChannelState {
    topics: HashMap<String, TopicState>,
}

/// In-memory event channel implementing the producer and subscription ports
#[derive(Clone)]
pub struct InMemoryEventChannel {
    partitions: u32,
    state: Arc<Mutex<ChannelState>>,
}

impl Default for InMemoryEventChannel {
    fn default() -> Self {
        Self::new(InMemoryChannelConfig::default())
    }
}

impl InMemoryEventChannel {
    /// Create a channel with the given per-topic partition count
    pub fn new(config: InMemoryChannelConfig) -> Self {
        Self {
            partitions: config.partitions.max(1),
            state: Arc::new(Mutex::new(ChannelState::default())),
        }
    }

    /// Total number of messages appended to a topic
    pub fn topic_depth(&self, topic: &str) -> usize {
        let state = self.state.lock();
        state
            .topics
            .get(topic)
            .map(|t| t.partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Number of messages a consumer group has not yet committed
    pub fn pending(&self, topic: &str, group: &str) -> usize {
        let state = self.state.lock();
        let Some(topic_state) = state.topics.get(topic) else {
            return 0;
        };
        let total: usize = topic_state.partitions.iter().map(Vec::len).sum();
        match topic_state.groups.get(group) {
            Some(group_state) => {
                let committed: u64 = group_state.committed.iter().sum();
                total.saturating_sub(committed as usize)
            }
            None => total,
        }
    }

    fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partitions)) as usize
    }
}

fn topic_entry<'a>(
    state: &'a mut ChannelState,
    topic: &str,
    partitions: u32,
) -> &'a mut TopicState {
    state.topics.entry(topic.to_string()).or_insert_with(|| TopicState {
        partitions: vec![Vec::new(); partitions as usize],
        groups: HashMap::new(),
    })
}

#[async_trait]
impl EventProducer for InMemoryEventChannel {
    async fn append(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), ChannelError> {
        let partition = self.partition_for(key);
        let mut state = self.state.lock();
        let topic_state = topic_entry(&mut state, topic, self.partitions);
        topic_state.partitions[partition].push(Arc::from(payload));
        debug!(topic, key, partition, "appended event");
        Ok(())
    }
}

#[async_trait]
impl EventChannel for InMemoryEventChannel {
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn EventSubscription>, ChannelError> {
        let partitions = self.partitions;
        {
            let mut state = self.state.lock();
            let topic_state = topic_entry(&mut state, topic, partitions);
            topic_state.groups.entry(group.to_string()).or_insert_with(|| GroupState {
                committed: vec![0; partitions as usize],
                cursor: 0,
            });
        }

        Ok(Box::new(InMemorySubscription {
            state: Arc::clone(&self.state),
            partitions,
            topic: topic.to_string(),
            group: group.to_string(),
        }))
    }
}

/// One consumer-group subscription over the in-memory channel.
///
/// Group offsets live in the channel, not the subscription, so a replacement
/// subscription (consumer restart) resumes from the committed position and
/// re-receives anything uncommitted.
struct InMemorySubscription {
    state: Arc<Mutex<ChannelState>>,
    partitions: u32,
    topic: String,
    group: String,
}

#[async_trait]
impl EventSubscription for InMemorySubscription {
    async fn next_delivery(&self) -> Result<Option<Delivery>, ChannelError> {
        let mut state = self.state.lock();
        let topic_state = topic_entry(&mut state, &self.topic, self.partitions);
        let Some(group_state) = topic_state.groups.get_mut(&self.group) else {
            return Err(ChannelError::SubscriptionClosed);
        };

        let partition_count = topic_state.partitions.len();
        for step in 0..partition_count {
            let partition = (group_state.cursor + step) % partition_count;
            let offset = group_state.committed[partition];
            if let Some(payload) = topic_state.partitions[partition].get(offset as usize) {
                group_state.cursor = (partition + 1) % partition_count;
                return Ok(Some(Delivery {
                    payload: payload.to_vec(),
                    offset: OffsetToken { partition: partition as u32, offset },
                }));
            }
        }

        Ok(None)
    }

    async fn commit(&self, offset: OffsetToken) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        let topic_state = topic_entry(&mut state, &self.topic, self.partitions);
        let Some(group_state) = topic_state.groups.get_mut(&self.group) else {
            return Err(ChannelError::SubscriptionClosed);
        };

        let slot = &mut group_state.committed[offset.partition as usize];
        *slot = (*slot).max(offset.offset + 1);
        Ok(())
    }
}
