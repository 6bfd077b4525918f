//! Contacts, payments and invoices.
//!
//! The record store enforces referential integrity; this module turns its
//! violations into ledger errors and issues every multi-record write as one
//! atomic batch.

pub mod contacts;
pub mod invoices;
pub mod payments;

pub use contacts::{CONTACTS, Contact, ContactDraft, ContactSummary, parse_labels};
pub use invoices::{
    INVOICE_ITEMS, INVOICES, Invoice, InvoiceDraft, InvoiceItem, InvoiceItemDraft, InvoiceStatus,
};
pub use payments::{PAYMENTS, Payment, PaymentDraft};

use crate::types::Money;
use backline_core::environment::Clock;
use backline_core::record_store::{Query, RecordStore, RecordStoreError, from_records};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Window for the "recent payments" summary figure.
pub const RECENT_PAYMENT_DAYS: i64 = 30;

/// Failure of a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No such record.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// The contact is still referenced by invoices or payments.
    #[error(
        "Cannot delete this contact because they have invoices or payments associated with them. Please delete those first."
    )]
    HasDependents,

    /// The invoice is already paid.
    #[error("Invoice {0} is already paid")]
    AlreadyPaid(String),

    /// Another invoice uses this number.
    #[error("Invoice number {0} is already in use")]
    DuplicateInvoiceNumber(String),

    /// Input rejected.
    #[error("{0}")]
    Validation(String),

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] RecordStoreError),
}

impl LedgerError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Counts reported by a bulk delete; failures never abort the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    /// Items deleted
    pub succeeded: usize,
    /// Items that could not be deleted
    pub failed: usize,
}

/// Dashboard figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Number of contacts
    pub contacts: usize,
    /// Number of payments
    pub payments: usize,
    /// Sum of all payment amounts
    pub revenue: Money,
    /// Payments dated within the last thirty days
    pub recent_payments: usize,
}

/// Ledger reads and writes over a record store.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl LedgerService {
    /// Creates a new `LedgerService`
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Contact and payment counts, total revenue and recent payments.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[tracing::instrument(skip(self))]
    pub async fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        let contacts = self.store.select(Query::table(CONTACTS)).await?.len();
        let payments: Vec<Payment> = from_records(self.store.select(Query::table(PAYMENTS)).await?)?;
        let cutoff = self.clock.today() - Duration::days(RECENT_PAYMENT_DAYS);

        Ok(LedgerSummary {
            contacts,
            payments: payments.len(),
            revenue: payments.iter().map(|p| p.amount).sum(),
            recent_payments: payments.iter().filter(|p| p.payment_date > cutoff).count(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::office_schema;
    use backline_testing::{InMemoryRecordStore, test_clock};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn summary_counts_recent_payments_only() {
        let ledger = LedgerService::new(
            Arc::new(InMemoryRecordStore::new(office_schema())),
            Arc::new(test_clock()),
        );
        let jo = ledger
            .create_contact(ContactDraft {
                first_name: "Jo".into(),
                email: "jo@x.com".into(),
                ..ContactDraft::default()
            })
            .await
            .unwrap();

        // test_clock is 2025-01-15; the window excludes 2024-12-16 itself.
        for (date, dollars) in [((2025, 1, 10), 100), ((2024, 12, 16), 50), ((2024, 11, 1), 25)] {
            ledger
                .create_payment(PaymentDraft {
                    contact_id: jo.id,
                    amount: Money::from_dollars(dollars),
                    payment_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
                    ..PaymentDraft::default()
                })
                .await
                .unwrap();
        }

        let summary = ledger.summary().await.unwrap();
        assert_eq!(summary.contacts, 1);
        assert_eq!(summary.payments, 3);
        assert_eq!(summary.revenue, Money::from_dollars(175));
        assert_eq!(summary.recent_payments, 1);
    }

    #[test]
    fn has_dependents_message_is_user_facing() {
        assert!(LedgerError::HasDependents.to_string().starts_with("Cannot delete this contact"));
    }
}
