//! Store adapters
//!
//! The primary record store is an external collaborator; the in-memory
//! adapters here implement its port (and the consumer-side account
//! directory) for tests and local wiring.

pub mod memory;

pub use memory::{InMemoryAccountDirectory, InMemoryCustomerStore};
