//! Port interfaces for the primary customer store

use async_trait::async_trait;
use provana_domain::{CustomerRecord, Page, PageRequest, Result};
use uuid::Uuid;

/// Trait for the primary record store.
///
/// Uniqueness of `contact` is delegated to the store's own consistency
/// guarantees; the service only performs the advisory existence checks the
/// public API requires.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Whether any record uses this contact
    async fn exists_by_contact(&self, contact: &str) -> Result<bool>;

    /// Whether any record other than `id` uses this contact
    async fn exists_by_contact_excluding(&self, contact: &str, id: Uuid) -> Result<bool>;

    /// Persist a record (insert or replace by id)
    async fn save(&self, record: &CustomerRecord) -> Result<CustomerRecord>;

    /// Fetch a record by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CustomerRecord>>;

    /// Fetch one page of records, optionally filtered by name
    async fn find_page(&self, page: &PageRequest) -> Result<Page<CustomerRecord>>;

    /// Delete a record by id
    async fn delete(&self, id: Uuid) -> Result<()>;
}
