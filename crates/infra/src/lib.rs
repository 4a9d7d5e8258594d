//! # Provana Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The in-memory partitioned event channel
//! - The HTTP billing RPC client
//! - The provisioning consumer and record-created listener workers
//! - In-memory store adapters
//! - Configuration loading and the composition root
//!
//! ## Architecture
//! - Implements traits defined in `provana-core`
//! - Contains all "impure" code (I/O, timers, HTTP)

pub mod billing;
pub mod channel;
pub mod config;
pub mod notify;
pub mod store;
pub mod wiring;

// Re-export commonly used items
pub use billing::client::{BillingClientConfig, HttpBillingClient};
pub use billing::worker::{ProvisioningWorker, ProvisioningWorkerConfig};
pub use channel::memory::InMemoryEventChannel;
pub use notify::RecordCreatedListener;
pub use store::memory::{InMemoryAccountDirectory, InMemoryCustomerStore};
pub use wiring::{assemble, AppStack};
