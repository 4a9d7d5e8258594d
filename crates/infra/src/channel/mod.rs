//! Durable event channel adapters
//!
//! Production deployments put a real broker behind the channel ports; the
//! in-memory implementation here honors the same contract (named topics,
//! partitioning by key, per-group committed offsets, at-least-once
//! redelivery) and is what the tests and local wiring run against.

pub mod memory;

pub use memory::{InMemoryChannelConfig, InMemoryEventChannel};
