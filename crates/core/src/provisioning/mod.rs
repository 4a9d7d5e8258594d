//! The billing-provisioning pipeline
//!
//! When a customer record is created, a billing account must be provisioned
//! in a downstream subsystem reachable only over a synchronous RPC. The
//! pipeline here guarantees that downstream unavailability never blocks or
//! fails the primary write and that a provisioning request is never silently
//! lost: it either completes synchronously or is durably deferred onto the
//! event channel for the asynchronous consumer.

pub mod client;
pub mod fallback;
pub mod metrics;
pub mod ports;

pub use client::{ProvisioningClient, ProvisioningClientBuilder};
pub use fallback::{FallbackPublisher, PublishError};
pub use metrics::{PipelineMetrics, PipelineMetricsSnapshot};
