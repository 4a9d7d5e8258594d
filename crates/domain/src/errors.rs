//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Provana domain operations.
///
/// Only `Validation` and `DuplicateContact` are ever surfaced to the caller
/// of record creation; everything downstream of the primary write is absorbed
/// into the asynchronous provisioning machinery.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("A customer with contact {0} already exists")]
    DuplicateContact(String),

    #[error("Customer not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Provana domain operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_detail() {
        let err = CoreError::DuplicateContact("alice@example.com".to_string());
        assert!(err.to_string().contains("alice@example.com"));

        let err = CoreError::Validation("name must not be empty".to_string());
        assert!(err.to_string().contains("name must not be empty"));
    }

    #[test]
    fn test_error_serializes_tagged() {
        let err = CoreError::NotFound("abc".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "NotFound");
        assert_eq!(json["message"], "abc");
    }
}
