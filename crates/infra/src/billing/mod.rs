//! Billing service integration
//!
//! Two halves of the provisioning pipeline live here: the synchronous HTTP
//! client the provisioning client calls, and the consumer worker that drains
//! deferred provisioning requests from the durable channel.

pub mod client;
pub mod worker;

pub use client::{BillingClientConfig, HttpBillingClient};
pub use worker::{ProvisioningWorker, ProvisioningWorkerConfig};
