//! Customer service - the creation orchestrator
//!
//! `create_customer` is the use-case entry point for the provisioning
//! pipeline: validate, check uniqueness, persist, provision, notify. The
//! primary write is committed before provisioning is attempted and is
//! irreversible; no provisioning-path failure ever rolls it back or changes
//! the caller-visible result. Only validation and uniqueness errors reach
//! the caller.

use std::sync::Arc;

use provana_common::resilience::{Clock, SystemClock};
use provana_domain::events::{EventEnvelope, RECORD_CREATED_TOPIC};
use provana_domain::{
    CoreError, CustomerInput, CustomerRecord, Page, PageRequest, ProvisioningOutcome, Result,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::provisioning::client::ProvisioningClient;
use crate::provisioning::ports::EventProducer;

use super::ports::CustomerStore;

/// Customer service orchestrating record creation and provisioning
pub struct CustomerService<C: Clock = SystemClock> {
    store: Arc<dyn CustomerStore>,
    provisioning: Arc<ProvisioningClient<C>>,
    notifications: Arc<dyn EventProducer>,
}

impl<C: Clock> CustomerService<C> {
    /// Create a new customer service
    pub fn new(
        store: Arc<dyn CustomerStore>,
        provisioning: Arc<ProvisioningClient<C>>,
        notifications: Arc<dyn EventProducer>,
    ) -> Self {
        Self { store, provisioning, notifications }
    }

    /// Create a customer record and provision its billing account.
    ///
    /// The returned record reflects the committed primary write; the
    /// provisioning outcome is recorded (logs and pipeline counters) but
    /// never downgrades a successful persist into a failure response.
    #[instrument(skip(self, input), fields(contact = %input.contact))]
    pub async fn create_customer(&self, input: CustomerInput) -> Result<CustomerRecord> {
        validate(&input)?;

        if self.store.exists_by_contact(&input.contact).await? {
            return Err(CoreError::DuplicateContact(input.contact));
        }

        let record = self.store.save(&CustomerRecord::from_input(input)).await?;
        info!(customer_id = %record.id, "customer record created");

        let outcome = self
            .provisioning
            .provision(&record.id.to_string(), &record.name, &record.contact)
            .await;
        match &outcome {
            ProvisioningOutcome::Completed { account_ref } => {
                info!(customer_id = %record.id, account_ref, "billing account active");
            }
            ProvisioningOutcome::Deferred => {
                info!(customer_id = %record.id, "billing provisioning deferred");
            }
            ProvisioningOutcome::Failed { reason } => {
                warn!(customer_id = %record.id, reason, "billing provisioning failed");
            }
        }

        self.publish_created(&record).await;

        Ok(record)
    }

    /// Fetch one page of customer records
    pub async fn get_customers(&self, page: PageRequest) -> Result<Page<CustomerRecord>> {
        self.store.find_page(&page).await
    }

    /// Fetch a single customer record
    pub async fn get_customer(&self, id: Uuid) -> Result<CustomerRecord> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    /// Update an existing customer record
    #[instrument(skip(self, input), fields(customer_id = %id))]
    pub async fn update_customer(
        &self,
        id: Uuid,
        input: CustomerInput,
    ) -> Result<CustomerRecord> {
        validate(&input)?;

        let mut record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        if self.store.exists_by_contact_excluding(&input.contact, id).await? {
            return Err(CoreError::DuplicateContact(input.contact));
        }

        record.name = input.name;
        record.contact = input.contact;
        record.address = input.address;

        self.store.save(&record).await
    }

    /// Delete a customer record
    pub async fn delete_customer(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await
    }

    /// Publish the record-created notification, best-effort.
    ///
    /// Notification delivery must not affect the caller-visible result of
    /// record creation, so append failures are logged and swallowed.
    async fn publish_created(&self, record: &CustomerRecord) {
        let subject_id = record.id.to_string();
        let envelope = EventEnvelope::record_created(&subject_id, &record.name, &record.contact);

        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(customer_id = %record.id, error = %err, "failed to encode notification");
                return;
            }
        };

        if let Err(err) =
            self.notifications.append(RECORD_CREATED_TOPIC, &subject_id, &payload).await
        {
            warn!(
                customer_id = %record.id,
                error = %err,
                "failed to publish record-created notification"
            );
        }
    }
}

fn validate(input: &CustomerInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(CoreError::Validation("name must not be empty".to_string()));
    }

    let contact = input.contact.trim();
    if contact.is_empty() {
        return Err(CoreError::Validation("contact must not be empty".to_string()));
    }
    if !contact.contains('@') {
        return Err(CoreError::Validation(format!("contact is not an address: {contact}")));
    }

    Ok(())
}
