//! Contacts.

use super::{BulkOutcome, LedgerError, LedgerService};
use crate::metrics;
use crate::types::ContactId;
use backline_core::record_store::{
    Filter, Order, Query, RecordStoreError, from_record, from_records, to_record,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record store table holding contacts.
pub const CONTACTS: &str = "contacts";

/// Columns embedded into payments and invoices.
pub const SUMMARY_COLUMNS: [&str; 3] = ["first_name", "last_name", "email"];

/// A person the band invoices or takes payments from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact id
    pub id: ContactId,
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name
    #[serde(default)]
    pub last_name: String,
    /// Email; the de-duplication key on import
    #[serde(default)]
    pub email: String,
    /// Phone
    #[serde(default)]
    pub phone: String,
    /// Street
    #[serde(default)]
    pub address_street: String,
    /// City
    #[serde(default)]
    pub address_city: String,
    /// State
    #[serde(default)]
    pub address_state: String,
    /// ZIP
    #[serde(default)]
    pub address_zip: String,
    /// Free-form labels
    #[serde(default)]
    pub labels: Vec<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Contact {
    /// `First Last`, trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Case-insensitive substring match on first name, last name or email.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        [&self.first_name, &self.last_name, &self.email]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }
}

/// The embedded `contacts` object on payment and invoice rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSummary {
    /// First name
    #[serde(default)]
    pub first_name: String,
    /// Last name
    #[serde(default)]
    pub last_name: String,
    /// Email
    #[serde(default)]
    pub email: String,
}

impl ContactSummary {
    /// `First Last`, trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Every editable contact field; updates replace the whole record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactDraft {
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email
    pub email: String,
    /// Phone
    pub phone: String,
    /// Street
    pub address_street: String,
    /// City
    pub address_city: String,
    /// State
    pub address_state: String,
    /// ZIP
    pub address_zip: String,
    /// Labels; trimmed, empties dropped on save
    pub labels: Vec<String>,
}

impl ContactDraft {
    fn normalized(mut self) -> Self {
        self.labels = self
            .labels
            .iter()
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();
        self
    }
}

/// Split a comma-separated label list, trimming and dropping empties.
#[must_use]
pub fn parse_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

impl LedgerService {
    /// All contacts, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[tracing::instrument(skip(self))]
    pub async fn list_contacts(&self) -> Result<Vec<Contact>, LedgerError> {
        let rows = self
            .store
            .select(Query::table(CONTACTS).order_by(Order::desc("created_at")))
            .await?;
        Ok(from_records(rows)?)
    }

    /// Contacts whose first name, last name or email contain `term`
    /// (case-insensitive). An empty term returns everyone.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn search_contacts(&self, term: &str) -> Result<Vec<Contact>, LedgerError> {
        let term = term.trim();
        let contacts = self.list_contacts().await?;
        Ok(contacts.into_iter().filter(|c| c.matches(term)).collect())
    }

    /// One contact.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown id.
    pub async fn get_contact(&self, id: ContactId) -> Result<Contact, LedgerError> {
        let row = self
            .store
            .select(Query::table(CONTACTS).filter(Filter::eq("id", id)).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::not_found("Contact", id))?;
        Ok(from_record(row)?)
    }

    /// Exact (case-sensitive) email lookup.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn find_contact_by_email(&self, email: &str) -> Result<Option<Contact>, LedgerError> {
        let row = self
            .store
            .select(Query::table(CONTACTS).filter(Filter::eq("email", email)).limit(1))
            .await?
            .into_iter()
            .next();
        Ok(row.map(from_record).transpose()?)
    }

    /// Insert a contact.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[tracing::instrument(skip(self, draft))]
    pub async fn create_contact(&self, draft: ContactDraft) -> Result<Contact, LedgerError> {
        let row = self
            .store
            .insert(CONTACTS, to_record(&draft.normalized())?)
            .await?;
        let contact: Contact = from_record(row)?;
        tracing::info!(contact_id = %contact.id, "Contact created");
        Ok(contact)
    }

    /// Replace every editable field of a contact.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown id.
    #[tracing::instrument(skip(self, draft))]
    pub async fn update_contact(&self, id: ContactId, draft: ContactDraft) -> Result<Contact, LedgerError> {
        let row = self
            .store
            .update(CONTACTS, to_record(&draft.normalized())?, vec![Filter::eq("id", id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::not_found("Contact", id))?;
        tracing::info!(contact_id = %id, "Contact updated");
        Ok(from_record(row)?)
    }

    /// Delete a contact that no invoice or payment references.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::HasDependents`] when invoices or payments reference it
    /// - [`LedgerError::NotFound`] for an unknown id
    #[tracing::instrument(skip(self))]
    pub async fn delete_contact(&self, id: ContactId) -> Result<(), LedgerError> {
        match self.store.delete(CONTACTS, vec![Filter::eq("id", id)]).await {
            Ok(rows) if rows.is_empty() => Err(LedgerError::not_found("Contact", id)),
            Ok(_) => {
                tracing::info!(contact_id = %id, "Contact deleted");
                Ok(())
            },
            Err(RecordStoreError::ForeignKeyViolation { constraint, .. }) => {
                tracing::warn!(contact_id = %id, %constraint, "Contact still referenced");
                Err(LedgerError::HasDependents)
            },
            Err(error) => Err(error.into()),
        }
    }

    /// Delete contacts one at a time, in order, counting failures.
    pub async fn bulk_delete_contacts(&self, ids: &[ContactId]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for id in ids {
            match self.delete_contact(*id).await {
                Ok(()) => {
                    outcome.succeeded += 1;
                    metrics::record_bulk_delete(CONTACTS, "deleted");
                },
                Err(error) => {
                    outcome.failed += 1;
                    metrics::record_bulk_delete(CONTACTS, "failed");
                    tracing::warn!(contact_id = %id, %error, "Bulk delete skipped contact");
                },
            }
        }
        tracing::info!(succeeded = outcome.succeeded, failed = outcome.failed, "Bulk contact delete finished");
        outcome
    }
}
