//! Common data types used throughout the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer record as persisted in the primary store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: Uuid,
    pub name: String,
    pub contact: String,
    pub address: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl CustomerRecord {
    /// Build a fresh record from validated input, stamping id and time.
    pub fn from_input(input: CustomerInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            contact: input.contact,
            address: input.address,
            registered_at: Utc::now(),
        }
    }
}

/// Incoming payload for creating or updating a customer record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub contact: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// Sort direction for paged listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Page specification for customer listings
///
/// `page` is 1-based to match the public API surface; the store adapters
/// translate as needed. `search` filters on the customer name when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: SortOrder,
    #[serde(default)]
    pub search: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 20, sort: SortOrder::Asc, search: None }
    }
}

/// One page of results from a paged query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

/// Terminal outcome of one provisioning attempt.
///
/// `Failed` is only produced when both the synchronous call path and the
/// fallback append failed; it never affects the caller-visible result of the
/// primary record write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// Downstream account was created synchronously
    Completed { account_ref: String },
    /// Provisioning request was durably deferred to the event channel
    Deferred,
    /// Both the synchronous path and the fallback append failed
    Failed { reason: String },
}

impl ProvisioningOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_input_stamps_identity() {
        let input = CustomerInput {
            name: "Alice".to_string(),
            contact: "alice@example.com".to_string(),
            address: Some("123 Main St".to_string()),
        };
        let record = CustomerRecord::from_input(input);

        assert!(!record.id.is_nil());
        assert_eq!(record.name, "Alice");
        assert_eq!(record.contact, "alice@example.com");
        assert_eq!(record.address.as_deref(), Some("123 Main St"));
    }

    #[test]
    fn test_page_request_default() {
        let page = PageRequest::default();
        assert_eq!(page.page, 1);
        assert_eq!(page.size, 20);
        assert_eq!(page.sort, SortOrder::Asc);
        assert!(page.search.is_none());
    }

    #[test]
    fn test_outcome_is_completed() {
        assert!(ProvisioningOutcome::Completed { account_ref: "acct-1".to_string() }
            .is_completed());
        assert!(!ProvisioningOutcome::Deferred.is_completed());
        assert!(!ProvisioningOutcome::Failed { reason: "boom".to_string() }.is_completed());
    }
}
