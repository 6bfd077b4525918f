//! Payments.

use super::contacts::{CONTACTS, ContactSummary, SUMMARY_COLUMNS};
use super::{BulkOutcome, LedgerError, LedgerService};
use crate::metrics;
use crate::types::{ContactId, InvoiceId, Money, PaymentId};
use backline_core::record_store::{
    Embed, Filter, Order, Query, from_record, from_records, to_record,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Record store table holding payments.
pub const PAYMENTS: &str = "payments";

/// Status written when a manual payment names none.
pub const DEFAULT_STATUS: &str = "Successful";
/// Method written when a manual payment names none.
pub const DEFAULT_METHOD: &str = "Pay in Person";

/// Money received from a contact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment id
    pub id: PaymentId,
    /// Paying contact
    pub contact_id: ContactId,
    /// Date received
    pub payment_date: NaiveDate,
    /// Amount
    pub amount: Money,
    /// Free-text status
    #[serde(default)]
    pub status: String,
    /// Free-text method
    #[serde(default)]
    pub payment_method: String,
    /// Notes
    #[serde(default)]
    pub notes: String,
    /// Invoice this payment settles
    #[serde(default)]
    pub invoice_id: Option<InvoiceId>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Embedded contact (listings only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<ContactSummary>,
}

/// Fields for a new payment; unset fields take defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDraft {
    /// Paying contact
    pub contact_id: ContactId,
    /// Amount
    pub amount: Money,
    /// Date received (default today)
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Status (default `Successful`)
    #[serde(default)]
    pub status: Option<String>,
    /// Method (default `Pay in Person`)
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Notes
    #[serde(default)]
    pub notes: String,
    /// Invoice this payment settles
    #[serde(default)]
    pub invoice_id: Option<InvoiceId>,
}

/// Row written for a payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct PaymentRow {
    pub contact_id: ContactId,
    pub payment_date: NaiveDate,
    pub amount: Money,
    pub status: String,
    pub payment_method: String,
    pub notes: String,
    pub invoice_id: Option<InvoiceId>,
}

impl PaymentRow {
    fn from_draft(draft: PaymentDraft, today: NaiveDate) -> Result<Self, LedgerError> {
        if draft.amount.is_negative() {
            return Err(LedgerError::Validation("amount must not be negative".into()));
        }
        Ok(Self {
            contact_id: draft.contact_id,
            payment_date: draft.payment_date.unwrap_or(today),
            amount: draft.amount,
            status: draft.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            payment_method: draft
                .payment_method
                .unwrap_or_else(|| DEFAULT_METHOD.to_string()),
            notes: draft.notes,
            invoice_id: draft.invoice_id,
        })
    }
}

fn with_contact(query: Query) -> Query {
    query.embed(Embed::new(CONTACTS, "contact_id", &SUMMARY_COLUMNS))
}

impl LedgerService {
    /// All payments with their contact, newest payment date first.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[tracing::instrument(skip(self))]
    pub async fn list_payments(&self) -> Result<Vec<Payment>, LedgerError> {
        let rows = self
            .store
            .select(with_contact(
                Query::table(PAYMENTS)
                    .order_by(Order::desc("payment_date"))
                    .order_by(Order::desc("created_at")),
            ))
            .await?;
        Ok(from_records(rows)?)
    }

    /// One payment with its contact.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown id.
    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment, LedgerError> {
        let row = self
            .store
            .select(with_contact(Query::table(PAYMENTS).filter(Filter::eq("id", id)).limit(1)))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::not_found("Payment", id))?;
        Ok(from_record(row)?)
    }

    /// Record a payment from an existing contact.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] when the contact does not exist
    /// - [`LedgerError::Validation`] for a negative amount
    pub async fn create_payment(&self, draft: PaymentDraft) -> Result<Payment, LedgerError> {
        self.record_payment(draft, "manual").await
    }

    pub(crate) async fn record_payment(
        &self,
        draft: PaymentDraft,
        source: &'static str,
    ) -> Result<Payment, LedgerError> {
        self.get_contact(draft.contact_id).await?;
        let row = PaymentRow::from_draft(draft, self.clock.today())?;
        let stored = self.store.insert(PAYMENTS, to_record(&row)?).await?;
        let payment: Payment = from_record(stored)?;

        metrics::record_payment(source, payment.amount.cents());
        tracing::info!(payment_id = %payment.id, amount = %payment.amount, source, "Payment recorded");
        Ok(payment)
    }

    /// Replace a payment's fields.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown payment or contact.
    #[tracing::instrument(skip(self, draft))]
    pub async fn update_payment(&self, id: PaymentId, draft: PaymentDraft) -> Result<Payment, LedgerError> {
        self.get_contact(draft.contact_id).await?;
        let row = PaymentRow::from_draft(draft, self.clock.today())?;
        let updated = self
            .store
            .update(PAYMENTS, to_record(&row)?, vec![Filter::eq("id", id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::not_found("Payment", id))?;
        tracing::info!(payment_id = %id, "Payment updated");
        Ok(from_record(updated)?)
    }

    /// Delete a payment.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown id.
    #[tracing::instrument(skip(self))]
    pub async fn delete_payment(&self, id: PaymentId) -> Result<(), LedgerError> {
        let rows = self.store.delete(PAYMENTS, vec![Filter::eq("id", id)]).await?;
        if rows.is_empty() {
            return Err(LedgerError::not_found("Payment", id));
        }
        tracing::info!(payment_id = %id, "Payment deleted");
        Ok(())
    }

    /// Delete payments one at a time, in order, counting failures.
    pub async fn bulk_delete_payments(&self, ids: &[PaymentId]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for id in ids {
            match self.delete_payment(*id).await {
                Ok(()) => {
                    outcome.succeeded += 1;
                    metrics::record_bulk_delete(PAYMENTS, "deleted");
                },
                Err(error) => {
                    outcome.failed += 1;
                    metrics::record_bulk_delete(PAYMENTS, "failed");
                    tracing::warn!(payment_id = %id, %error, "Bulk delete skipped payment");
                },
            }
        }
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::ledger::ContactDraft;
    use crate::testing::office_schema;
    use backline_testing::{InMemoryRecordStore, test_clock};
    use backline_core::environment::Clock;
    use std::sync::Arc;

    async fn ledger_with_contact() -> (LedgerService, ContactId) {
        let ledger = LedgerService::new(
            Arc::new(InMemoryRecordStore::new(office_schema())),
            Arc::new(test_clock()),
        );
        let contact = ledger
            .create_contact(ContactDraft {
                first_name: "Jo".into(),
                last_name: "Ray".into(),
                email: "jo@x.com".into(),
                ..ContactDraft::default()
            })
            .await
            .unwrap();
        (ledger, contact.id)
    }

    #[tokio::test]
    async fn manual_payment_defaults() {
        let (ledger, jo) = ledger_with_contact().await;
        let payment = ledger
            .create_payment(PaymentDraft {
                contact_id: jo,
                amount: Money::from_cents(25_050),
                ..PaymentDraft::default()
            })
            .await
            .unwrap();
        assert_eq!(payment.status, DEFAULT_STATUS);
        assert_eq!(payment.payment_method, DEFAULT_METHOD);
        assert_eq!(payment.payment_date, test_clock().now().date_naive());
    }

    #[tokio::test]
    async fn payment_for_unknown_contact_is_rejected() {
        let (ledger, _) = ledger_with_contact().await;
        let result = ledger
            .create_payment(PaymentDraft {
                contact_id: ContactId::new(),
                amount: Money::from_dollars(1),
                ..PaymentDraft::default()
            })
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound { entity: "Contact", .. })));
    }

    #[tokio::test]
    async fn listing_embeds_contact_newest_first() {
        let (ledger, jo) = ledger_with_contact().await;
        for day in [3, 9, 5] {
            ledger
                .create_payment(PaymentDraft {
                    contact_id: jo,
                    amount: Money::from_dollars(day),
                    payment_date: NaiveDate::from_ymd_opt(2025, 1, u32::try_from(day).unwrap()),
                    ..PaymentDraft::default()
                })
                .await
                .unwrap();
        }

        let payments = ledger.list_payments().await.unwrap();
        let days: Vec<_> = payments.iter().map(|p| p.amount.cents() / 100).collect();
        assert_eq!(days, [9, 5, 3]);
        let embedded = payments[0].contacts.as_ref().unwrap();
        assert_eq!(embedded.full_name(), "Jo Ray");
        assert_eq!(embedded.email, "jo@x.com");
    }

    #[tokio::test]
    async fn bulk_delete_reports_missing_ids_as_failures() {
        let (ledger, jo) = ledger_with_contact().await;
        let payment = ledger
            .create_payment(PaymentDraft {
                contact_id: jo,
                amount: Money::from_dollars(5),
                ..PaymentDraft::default()
            })
            .await
            .unwrap();

        let outcome = ledger.bulk_delete_payments(&[PaymentId::new(), payment.id]).await;
        assert_eq!(outcome, BulkOutcome { succeeded: 1, failed: 1 });
    }
}
