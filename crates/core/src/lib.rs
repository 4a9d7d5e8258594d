//! # Provana Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the event channel, the billing
//!   RPC, the account directory, and the customer store
//! - The provisioning client (circuit breaker + retry composition with the
//!   durable-channel fallback)
//! - The creation orchestrator
//!
//! ## Architecture Principles
//! - Only depends on `provana-common` and `provana-domain`
//! - No broker, HTTP, or storage code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod customer;
pub mod provisioning;

// Re-export specific items to avoid ambiguity
pub use customer::ports::CustomerStore;
pub use customer::CustomerService;
pub use provisioning::client::{
    ProvisioningClient, ProvisioningClientBuilder, TransientBillingFailures, BILLING_BREAKER_KEY,
};
pub use provisioning::fallback::{FallbackPublisher, PublishError};
pub use provisioning::metrics::{PipelineMetrics, PipelineMetricsSnapshot};
pub use provisioning::ports::{
    AccountProvisioner, AccountStatus, BillingAccountDirectory, BillingCallError, ChannelError,
    Delivery, DirectoryError, EventChannel, EventProducer, EventSubscription, OffsetToken,
    ProvisionedAccount,
};
