//! # Provana Domain
//!
//! Domain types shared across Provana crates.
//!
//! This crate contains:
//! - Customer records and paging DTOs
//! - The schema-versioned event envelope codec
//! - The domain error taxonomy
//! - Configuration types consumed by the infra loader

pub mod config;
pub mod errors;
pub mod events;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{BillingConfig, BreakerSettings, ChannelSettings, Config, RetrySettings};
pub use errors::{CoreError, Result};
pub use events::{
    CodecError, EventEnvelope, EventType, ENVELOPE_SCHEMA_VERSION, PROVISIONING_TOPIC,
    RECORD_CREATED_TOPIC,
};
pub use types::{
    CustomerInput, CustomerRecord, Page, PageRequest, ProvisioningOutcome, SortOrder,
};
