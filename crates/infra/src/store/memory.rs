//! In-memory implementations of the store ports

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use provana_core::{BillingAccountDirectory, CustomerStore, DirectoryError};
use provana_domain::{CustomerRecord, Page, PageRequest, Result, SortOrder};
use uuid::Uuid;

/// In-memory customer store keyed by record id
#[derive(Default)]
pub struct InMemoryCustomerStore {
    records: RwLock<HashMap<Uuid, CustomerRecord>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn exists_by_contact(&self, contact: &str) -> Result<bool> {
        Ok(self.records.read().values().any(|r| r.contact.eq_ignore_ascii_case(contact)))
    }

    async fn exists_by_contact_excluding(&self, contact: &str, id: Uuid) -> Result<bool> {
        Ok(self
            .records
            .read()
            .values()
            .any(|r| r.id != id && r.contact.eq_ignore_ascii_case(contact)))
    }

    async fn save(&self, record: &CustomerRecord) -> Result<CustomerRecord> {
        self.records.write().insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CustomerRecord>> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn find_page(&self, page: &PageRequest) -> Result<Page<CustomerRecord>> {
        let records = self.records.read();

        let mut items: Vec<CustomerRecord> = match &page.search {
            Some(needle) if !needle.trim().is_empty() => {
                let needle = needle.to_lowercase();
                records
                    .values()
                    .filter(|r| r.name.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            }
            _ => records.values().cloned().collect(),
        };

        items.sort_by(|a, b| match page.sort {
            SortOrder::Asc => a.name.cmp(&b.name),
            SortOrder::Desc => b.name.cmp(&a.name),
        });

        let total_items = items.len() as u64;
        let size = page.size.max(1);
        let total_pages = (total_items as u32).div_ceil(size);
        let start = ((page.page.max(1) - 1) * size) as usize;

        let items: Vec<CustomerRecord> =
            items.into_iter().skip(start).take(size as usize).collect();

        Ok(Page { items, page: page.page, size: page.size, total_pages, total_items })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.records.write().remove(&id);
        Ok(())
    }
}

/// In-memory billing-account directory keyed by subject id.
///
/// `create_if_absent` is the idempotence anchor of the consumer: redelivered
/// provisioning requests find the account already present and no-op.
#[derive(Default)]
pub struct InMemoryAccountDirectory {
    accounts: RwLock<HashMap<String, (String, String)>>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of provisioned accounts
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// Whether an account exists for the subject
    pub fn contains(&self, subject_id: &str) -> bool {
        self.accounts.read().contains_key(subject_id)
    }
}

#[async_trait]
impl BillingAccountDirectory for InMemoryAccountDirectory {
    async fn create_if_absent(
        &self,
        subject_id: &str,
        name: &str,
        contact: &str,
    ) -> std::result::Result<bool, DirectoryError> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(subject_id) {
            return Ok(false);
        }
        accounts.insert(subject_id.to_string(), (name.to_string(), contact.to_string()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use provana_domain::CustomerInput;

    use super::*;

    fn record(name: &str, contact: &str) -> CustomerRecord {
        CustomerRecord::from_input(CustomerInput {
            name: name.to_string(),
            contact: contact.to_string(),
            address: None,
        })
    }

    #[tokio::test]
    async fn contact_uniqueness_checks() {
        let store = InMemoryCustomerStore::new();
        let alice = record("Alice", "alice@example.com");
        store.save(&alice).await.unwrap();

        assert!(store.exists_by_contact("alice@example.com").await.unwrap());
        assert!(store.exists_by_contact("ALICE@EXAMPLE.COM").await.unwrap());
        assert!(!store.exists_by_contact("bob@example.com").await.unwrap());

        // Excluding the record itself
        assert!(!store
            .exists_by_contact_excluding("alice@example.com", alice.id)
            .await
            .unwrap());
        assert!(store
            .exists_by_contact_excluding("alice@example.com", Uuid::new_v4())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn find_page_sorts_filters_and_paginates() {
        let store = InMemoryCustomerStore::new();
        for (name, contact) in [
            ("Carol", "carol@example.com"),
            ("Alice", "alice@example.com"),
            ("Bob", "bob@example.com"),
            ("Annika", "annika@example.com"),
        ] {
            store.save(&record(name, contact)).await.unwrap();
        }

        let page = store
            .find_page(&PageRequest { page: 1, size: 2, sort: SortOrder::Asc, search: None })
            .await
            .unwrap();
        assert_eq!(page.total_items, 4);
        assert_eq!(page.total_pages, 2);
        let names: Vec<_> = page.items.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Annika"]);

        let page = store
            .find_page(&PageRequest { page: 2, size: 2, sort: SortOrder::Asc, search: None })
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Bob", "Carol"]);

        let page = store
            .find_page(&PageRequest {
                page: 1,
                size: 10,
                sort: SortOrder::Desc,
                search: Some("an".to_string()),
            })
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Annika"], "search matches case-insensitively on name");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryCustomerStore::new();
        let alice = record("Alice", "alice@example.com");
        store.save(&alice).await.unwrap();

        store.delete(alice.id).await.unwrap();
        assert!(store.is_empty());
        store.delete(alice.id).await.unwrap();
    }

    #[tokio::test]
    async fn directory_create_if_absent_is_idempotent() {
        let directory = InMemoryAccountDirectory::new();

        let created =
            directory.create_if_absent("cust-1", "Alice", "alice@example.com").await.unwrap();
        assert!(created);

        let created =
            directory.create_if_absent("cust-1", "Alice", "alice@example.com").await.unwrap();
        assert!(!created, "second creation is a no-op");
        assert_eq!(directory.len(), 1);
    }
}
