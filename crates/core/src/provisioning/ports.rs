//! Port interfaces for the provisioning pipeline

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

//==============================================================================
// Durable event channel
//==============================================================================

/// Errors surfaced by the event channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Event channel unavailable: {0}")]
    Unavailable(String),

    #[error("Subscription closed")]
    SubscriptionClosed,
}

/// Opaque position of a delivery within its partition.
///
/// Returned with every delivery and passed back on commit; consumers treat it
/// as a token, only the channel implementation interprets the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetToken {
    pub partition: u32,
    pub offset: u64,
}

/// One delivered message
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub offset: OffsetToken,
}

/// Producer side of the durable event channel.
///
/// `append` is at-least-once territory: an error may mean the append did not
/// happen, or that the acknowledgement was lost after it did. Consumers must
/// tolerate the resulting duplicates.
#[async_trait]
pub trait EventProducer: Send + Sync {
    /// Append a payload to a topic, partitioned by key
    async fn append(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), ChannelError>;
}

/// One consumer-group subscription over a topic.
///
/// `next_delivery` hands out the oldest uncommitted message per partition;
/// a message stays eligible for redelivery until `commit` advances the
/// group's offset past it.
#[async_trait]
pub trait EventSubscription: Send + Sync {
    /// Fetch the next pending delivery, or `None` when nothing is pending
    async fn next_delivery(&self) -> Result<Option<Delivery>, ChannelError>;

    /// Acknowledge a delivery, advancing the committed offset
    async fn commit(&self, offset: OffsetToken) -> Result<(), ChannelError>;
}

/// Full channel surface: producing plus subscribing
#[async_trait]
pub trait EventChannel: EventProducer {
    /// Subscribe a consumer group to a topic
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn EventSubscription>, ChannelError>;
}

//==============================================================================
// Downstream billing RPC
//==============================================================================

/// Result of a successful downstream account creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAccount {
    pub account_ref: String,
    pub status: AccountStatus,
}

/// Downstream account status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Pending,
}

/// Failures of the synchronous billing call.
///
/// Split by retryability: timeouts, connection failures, busy signals, and
/// server errors are transient; a rejected or malformed request will not get
/// better by asking again.
#[derive(Debug, Error)]
pub enum BillingCallError {
    #[error("Billing call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to connect to billing service: {0}")]
    Connect(String),

    #[error("Billing service busy: {0}")]
    Busy(String),

    #[error("Billing service error: {0}")]
    Server(String),

    #[error("Billing service rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid provisioning request: {0}")]
    InvalidRequest(String),
}

impl BillingCallError {
    /// Whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connect(_) | Self::Busy(_) | Self::Server(_)
        )
    }
}

/// The downstream billing RPC: synchronous account creation
#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    /// Create a billing account for the subject
    async fn create_account(
        &self,
        subject_id: &str,
        name: &str,
        contact: &str,
    ) -> Result<ProvisionedAccount, BillingCallError>;
}

//==============================================================================
// Billing account directory (consumer side)
//==============================================================================

/// Errors from the billing account directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Account directory unavailable: {0}")]
    Unavailable(String),
}

/// Idempotent account creation keyed by subject id.
///
/// The channel may redeliver a provisioning request, so creating an account
/// for a subject that already has one must be a no-op success.
#[async_trait]
pub trait BillingAccountDirectory: Send + Sync {
    /// Create the account if absent; returns `true` when newly created
    async fn create_if_absent(
        &self,
        subject_id: &str,
        name: &str,
        contact: &str,
    ) -> Result<bool, DirectoryError>;
}
