//! Invoices and their line items.
//!
//! Amounts are recomputed on every save. Item lists are replaced wholesale:
//! an update deletes every stored item and inserts the new list in the same
//! batch as the invoice row, so a reader never sees a half-written invoice.

use super::contacts::{CONTACTS, ContactSummary, SUMMARY_COLUMNS};
use super::payments::{PAYMENTS, Payment, PaymentRow};
use super::{LedgerError, LedgerService};
use crate::metrics;
pub use crate::services::invoicing::InvoiceItemDraft;
use crate::services::invoicing::{EmailDetails, InvoiceEmail, InvoiceTotals, to_stored_scale};
use crate::types::{ContactId, InvoiceId, InvoiceItemId, Money};
use backline_core::record_store::{
    Embed, Filter, Mutation, Order, Query, Record, RecordStoreError, from_record, from_records,
    to_record,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record store table holding invoices.
pub const INVOICES: &str = "invoices";
/// Record store table holding invoice line items.
pub const INVOICE_ITEMS: &str = "invoice_items";

/// Notes written when a new invoice names none.
pub const DEFAULT_NOTES: &str = "Thank you for your business!";
/// Days between issue and due date on a new invoice.
pub const DEFAULT_DUE_DAYS: i64 = 30;

/// Method recorded on the payment created by marking an invoice paid.
pub const INVOICE_PAYMENT_METHOD: &str = "other";
/// Status recorded on the payment created by marking an invoice paid.
pub const INVOICE_PAYMENT_STATUS: &str = "completed";

/// Invoice lifecycle status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Not sent yet
    #[default]
    Draft,
    /// Sent to the contact
    Sent,
    /// Settled
    Paid,
    /// Past due
    Overdue,
}

impl InvoiceStatus {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored invoice line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// Item id
    pub id: InvoiceItemId,
    /// Owning invoice
    pub invoice_id: InvoiceId,
    /// Order on the invoice
    #[serde(default)]
    pub position: u32,
    /// What was sold
    pub description: String,
    /// Quantity
    pub quantity: f64,
    /// Unit price
    pub rate: Money,
    /// `quantity × rate`, rounded to the cent
    pub amount: Money,
}

/// A stored invoice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice id
    pub id: InvoiceId,
    /// Billed contact
    pub contact_id: ContactId,
    /// Unique invoice number
    pub invoice_number: String,
    /// Issue date
    pub issue_date: NaiveDate,
    /// Due date
    pub due_date: NaiveDate,
    /// Status
    pub status: InvoiceStatus,
    /// Tax percent
    #[serde(default)]
    pub tax: f64,
    /// Notes
    #[serde(default)]
    pub notes: String,
    /// Sum of item amounts
    pub subtotal: Money,
    /// Subtotal plus tax
    pub total: Money,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Line items (loaded by [`LedgerService::get_invoice`])
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    /// Embedded contact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<ContactSummary>,
}

/// Invoice form contents. On update, unset fields keep their stored values;
/// on create they take the defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    /// Billed contact
    pub contact_id: ContactId,
    /// Invoice number (default `INV-<unix millis>`)
    #[serde(default)]
    pub invoice_number: Option<String>,
    /// Issue date (default today)
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    /// Due date (default today + 30 days)
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Status (default draft)
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    /// Tax percent (default 0)
    #[serde(default)]
    pub tax: Option<f64>,
    /// Notes (default `Thank you for your business!`)
    #[serde(default)]
    pub notes: Option<String>,
    /// Lines; blank descriptions are dropped
    #[serde(default)]
    pub items: Vec<InvoiceItemDraft>,
}

/// Result of marking an invoice paid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaidInvoice {
    /// The invoice, now paid
    pub invoice: Invoice,
    /// The payment created for it
    pub payment: Payment,
}

#[derive(Serialize)]
struct InvoiceRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<InvoiceId>,
    contact_id: ContactId,
    invoice_number: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    status: InvoiceStatus,
    tax: f64,
    notes: String,
    subtotal: Money,
    total: Money,
}

#[derive(Serialize)]
struct ItemRow<'a> {
    invoice_id: InvoiceId,
    position: u32,
    description: &'a str,
    quantity: f64,
    rate: Money,
    amount: Money,
}

#[derive(Serialize)]
struct StatusPatch {
    status: InvoiceStatus,
}

fn validate_items(items: &[InvoiceItemDraft], tax: f64) -> Result<(), LedgerError> {
    if !tax.is_finite() || tax < 0.0 {
        return Err(LedgerError::Validation("tax must be a non-negative percentage".into()));
    }
    for item in items {
        if !item.quantity.is_finite() || item.quantity < 0.0 {
            return Err(LedgerError::Validation(format!(
                "quantity for {:?} must be a non-negative number",
                item.description
            )));
        }
        if item.rate.is_negative() {
            return Err(LedgerError::Validation(format!(
                "rate for {:?} must not be negative",
                item.description
            )));
        }
    }
    Ok(())
}

fn item_rows(invoice_id: InvoiceId, items: &[InvoiceItemDraft]) -> Result<Vec<Record>, LedgerError> {
    items
        .iter()
        .zip(0u32..)
        .map(|(item, position)| {
            to_record(&ItemRow {
                invoice_id,
                position,
                description: item.description.trim(),
                quantity: item.quantity,
                rate: item.rate,
                amount: item.amount(),
            })
            .map_err(LedgerError::from)
        })
        .collect()
}

fn with_contact(query: Query) -> Query {
    query.embed(Embed::new(CONTACTS, "contact_id", &SUMMARY_COLUMNS))
}

impl LedgerService {
    /// All invoices with their contact, newest issue date first. Items are
    /// not loaded.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[tracing::instrument(skip(self))]
    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, LedgerError> {
        let rows = self
            .store
            .select(with_contact(
                Query::table(INVOICES)
                    .order_by(Order::desc("issue_date"))
                    .order_by(Order::desc("created_at")),
            ))
            .await?;
        Ok(from_records(rows)?)
    }

    /// One invoice with its contact and items in position order.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown id.
    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, LedgerError> {
        let row = self
            .store
            .select(with_contact(Query::table(INVOICES).filter(Filter::eq("id", id)).limit(1)))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::not_found("Invoice", id))?;
        let mut invoice: Invoice = from_record(row)?;

        let items = self
            .store
            .select(
                Query::table(INVOICE_ITEMS)
                    .filter(Filter::eq("invoice_id", id))
                    .order_by(Order::asc("position")),
            )
            .await?;
        invoice.items = from_records(items)?;
        Ok(invoice)
    }

    /// Create (`id` unset) or update an invoice and its items in one batch.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] for an unknown invoice or contact
    /// - [`LedgerError::DuplicateInvoiceNumber`] when the number is taken
    /// - [`LedgerError::Validation`] for negative quantities, rates or tax
    #[tracing::instrument(skip(self, draft), fields(contact_id = %draft.contact_id))]
    pub async fn save_invoice(
        &self,
        id: Option<InvoiceId>,
        draft: InvoiceDraft,
    ) -> Result<Invoice, LedgerError> {
        let existing = match id {
            Some(id) => Some(self.get_invoice(id).await?),
            None => None,
        };
        self.get_contact(draft.contact_id).await?;

        let items: Vec<InvoiceItemDraft> = draft
            .items
            .into_iter()
            .filter(|i| !i.is_blank())
            .map(InvoiceItemDraft::normalized)
            .collect();
        let tax = to_stored_scale(
            draft
                .tax
                .or_else(|| existing.as_ref().map(|e| e.tax))
                .unwrap_or(0.0),
        );
        validate_items(&items, tax)?;
        let totals = InvoiceTotals::compute(&items, tax);

        let today = self.clock.today();
        let invoice_number = draft
            .invoice_number
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .or_else(|| existing.as_ref().map(|e| e.invoice_number.clone()))
            .unwrap_or_else(|| format!("INV-{}", self.clock.now().timestamp_millis()));
        let row = InvoiceRow {
            id: None,
            contact_id: draft.contact_id,
            invoice_number: invoice_number.clone(),
            issue_date: draft
                .issue_date
                .or_else(|| existing.as_ref().map(|e| e.issue_date))
                .unwrap_or(today),
            due_date: draft
                .due_date
                .or_else(|| existing.as_ref().map(|e| e.due_date))
                .unwrap_or(today + Duration::days(DEFAULT_DUE_DAYS)),
            status: draft
                .status
                .or_else(|| existing.as_ref().map(|e| e.status))
                .unwrap_or_default(),
            tax,
            notes: draft
                .notes
                .or_else(|| existing.as_ref().map(|e| e.notes.clone()))
                .unwrap_or_else(|| DEFAULT_NOTES.to_string()),
            subtotal: totals.subtotal,
            total: totals.total,
        };

        let (invoice_id, mut batch, mode) = match id {
            None => {
                let invoice_id = InvoiceId::new();
                let row = InvoiceRow {
                    id: Some(invoice_id),
                    ..row
                };
                (invoice_id, vec![Mutation::insert(INVOICES, to_record(&row)?)], "create")
            },
            Some(invoice_id) => (
                invoice_id,
                vec![
                    Mutation::guarded_update(INVOICES, to_record(&row)?, vec![Filter::eq("id", invoice_id)]),
                    Mutation::delete(INVOICE_ITEMS, vec![Filter::eq("invoice_id", invoice_id)]),
                ],
                "update",
            ),
        };
        if !items.is_empty() {
            batch.push(Mutation::Insert {
                table: INVOICE_ITEMS.to_string(),
                rows: item_rows(invoice_id, &items)?,
            });
        }

        match self.store.transact(batch).await {
            Ok(_) => {},
            Err(RecordStoreError::UniqueViolation { table, .. }) if table == INVOICES => {
                return Err(LedgerError::DuplicateInvoiceNumber(invoice_number));
            },
            Err(RecordStoreError::PreconditionFailed { .. }) => {
                return Err(LedgerError::not_found("Invoice", invoice_id));
            },
            Err(error) => return Err(error.into()),
        }

        metrics::record_invoice_saved(mode);
        tracing::info!(%invoice_id, %invoice_number, total = %totals.total, items = items.len(), mode, "Invoice saved");
        self.get_invoice(invoice_id).await
    }

    /// Delete an invoice and its items in one batch. Payments that settled
    /// it keep their row with the link cleared.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown id.
    #[tracing::instrument(skip(self))]
    pub async fn delete_invoice(&self, id: InvoiceId) -> Result<(), LedgerError> {
        let outcome = self
            .store
            .transact(vec![
                Mutation::delete(INVOICE_ITEMS, vec![Filter::eq("invoice_id", id)]),
                Mutation::delete(INVOICES, vec![Filter::eq("id", id)]),
            ])
            .await?;
        if outcome.get(1).is_none_or(Vec::is_empty) {
            return Err(LedgerError::not_found("Invoice", id));
        }
        tracing::info!(invoice_id = %id, "Invoice deleted");
        Ok(())
    }

    /// Mark an unpaid invoice paid and record one payment for its total, in
    /// one batch.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AlreadyPaid`] when the invoice is already paid
    ///   (nothing is written)
    /// - [`LedgerError::NotFound`] for an unknown id
    #[tracing::instrument(skip(self))]
    pub async fn mark_invoice_paid(&self, id: InvoiceId) -> Result<PaidInvoice, LedgerError> {
        let invoice = self.get_invoice(id).await?;
        let already_paid = LedgerError::AlreadyPaid(invoice.invoice_number.clone());
        if invoice.status == InvoiceStatus::Paid {
            return Err(already_paid);
        }

        let payment = PaymentRow {
            contact_id: invoice.contact_id,
            payment_date: self.clock.today(),
            amount: invoice.total,
            status: INVOICE_PAYMENT_STATUS.to_string(),
            payment_method: INVOICE_PAYMENT_METHOD.to_string(),
            notes: format!("Payment for invoice {}", invoice.invoice_number),
            invoice_id: Some(id),
        };
        let batch = vec![
            Mutation::guarded_update(
                INVOICES,
                to_record(&StatusPatch {
                    status: InvoiceStatus::Paid,
                })?,
                vec![
                    Filter::eq("id", id),
                    Filter::neq("status", InvoiceStatus::Paid.as_str()),
                ],
            ),
            Mutation::insert(PAYMENTS, to_record(&payment)?),
        ];

        let outcome = match self.store.transact(batch).await {
            Ok(outcome) => outcome,
            Err(RecordStoreError::PreconditionFailed { .. }) => return Err(already_paid),
            Err(RecordStoreError::UniqueViolation { table, .. }) if table == PAYMENTS => {
                return Err(already_paid);
            },
            Err(error) => return Err(error.into()),
        };
        let payment_row = outcome
            .into_iter()
            .nth(1)
            .and_then(|rows| rows.into_iter().next())
            .ok_or_else(|| RecordStoreError::DatabaseError("payment insert returned no row".into()))?;
        let payment: Payment = from_record(payment_row)?;

        metrics::record_invoice_paid();
        metrics::record_payment("invoice", payment.amount.cents());
        tracing::info!(invoice_id = %id, payment_id = %payment.id, amount = %payment.amount, "Invoice marked paid");

        Ok(PaidInvoice {
            invoice: self.get_invoice(id).await?,
            payment,
        })
    }

    /// Compose the email that accompanies an invoice.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] for an unknown invoice.
    pub async fn invoice_email(&self, id: InvoiceId, band_name: &str) -> Result<InvoiceEmail, LedgerError> {
        let invoice = self.get_invoice(id).await?;
        let contact = invoice
            .contacts
            .clone()
            .ok_or_else(|| LedgerError::not_found("Contact", invoice.contact_id))?;
        Ok(InvoiceEmail::compose(&EmailDetails {
            email: &contact.email,
            first_name: &contact.first_name,
            last_name: &contact.last_name,
            invoice_number: &invoice.invoice_number,
            total: invoice.total,
            due_date: invoice.due_date,
            notes: &invoice.notes,
            band_name,
        }))
    }
}
