//! Record-created notification consumers

pub mod listener;

pub use listener::{RecordCreatedListener, RecordCreatedListenerConfig};
