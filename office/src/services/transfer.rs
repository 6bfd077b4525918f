//! CSV import and export for contacts and payments.
//!
//! Imports process rows one at a time in file order and never stop at the
//! first bad row; the outcome counts what happened to each row.

use crate::metrics;
use crate::services::ledger::{Contact, ContactDraft, LedgerError, LedgerService, PaymentDraft, parse_labels};
use crate::types::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default status for imported payments.
pub const IMPORTED_PAYMENT_STATUS: &str = "completed";
/// Default method for imported payments.
pub const IMPORTED_PAYMENT_METHOD: &str = "cash";

/// Failure of a whole import or export.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The file has no usable header row.
    #[error("CSV file must start with a header row")]
    MissingHeader,

    /// The file could not be read or written as CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Export produced bytes that are not UTF-8.
    #[error("CSV export is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// Ledger read failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Counts reported by a contact import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactImport {
    /// New contacts created
    pub added: usize,
    /// Rows whose email already exists
    pub skipped: usize,
    /// Rows that could not be read or written
    pub failed: usize,
}

/// Counts reported by a payment import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentImport {
    /// Payments created
    pub succeeded: usize,
    /// Rows without a known contact, with a bad amount or date, or rejected by the store
    pub failed: usize,
}

#[derive(Serialize)]
struct ContactCsvRow<'a> {
    id: String,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    phone: &'a str,
    address_street: &'a str,
    address_city: &'a str,
    address_state: &'a str,
    address_zip: &'a str,
    labels: String,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a Contact> for ContactCsvRow<'a> {
    fn from(contact: &'a Contact) -> Self {
        Self {
            id: contact.id.to_string(),
            first_name: &contact.first_name,
            last_name: &contact.last_name,
            email: &contact.email,
            phone: &contact.phone,
            address_street: &contact.address_street,
            address_city: &contact.address_city,
            address_state: &contact.address_state,
            address_zip: &contact.address_zip,
            labels: contact.labels.join(","),
            created_at: contact.created_at,
        }
    }
}

#[derive(Serialize)]
struct PaymentCsvRow<'a> {
    contact_name: String,
    contact_email: &'a str,
    payment_date: NaiveDate,
    amount: Money,
    status: &'a str,
    payment_method: &'a str,
    notes: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContactImportRow {
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    address_street: String,
    address_city: String,
    address_state: String,
    address_zip: String,
    labels: String,
}

impl From<ContactImportRow> for ContactDraft {
    fn from(row: ContactImportRow) -> Self {
        Self {
            labels: parse_labels(&row.labels),
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            address_street: row.address_street,
            address_city: row.address_city,
            address_state: row.address_state,
            address_zip: row.address_zip,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PaymentImportRow {
    contact_email: String,
    payment_date: String,
    amount: String,
    status: String,
    payment_method: String,
    notes: String,
}

fn non_empty(value: String, default: &str) -> String {
    if value.is_empty() { default.to_string() } else { value }
}

fn reader<'a>(input: &'a [u8], required: &[&str]) -> Result<csv::Reader<&'a [u8]>, TransferError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?;
    if !headers.iter().any(|h| required.contains(&h.trim())) {
        return Err(TransferError::MissingHeader);
    }
    Ok(reader)
}

/// Header row of the contact export, in field order of `ContactCsvRow`.
pub const CONTACT_COLUMNS: [&str; 11] = [
    "id",
    "first_name",
    "last_name",
    "email",
    "phone",
    "address_street",
    "address_city",
    "address_state",
    "address_zip",
    "labels",
    "created_at",
];

/// Header row of the payment export, in field order of `PaymentCsvRow`.
pub const PAYMENT_COLUMNS: [&str; 7] = [
    "contact_name",
    "contact_email",
    "payment_date",
    "amount",
    "status",
    "payment_method",
    "notes",
];

/// Writer that has already emitted `columns`, so an empty export still
/// carries its header.
fn csv_writer(columns: &[&str]) -> Result<csv::Writer<Vec<u8>>, TransferError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(columns)?;
    Ok(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, TransferError> {
    let bytes = writer
        .into_inner()
        .map_err(|error| csv::Error::from(error.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// CSV import/export over the ledger.
#[derive(Clone)]
pub struct TransferService {
    ledger: LedgerService,
}

impl TransferService {
    /// Creates a new `TransferService`
    #[must_use]
    pub const fn new(ledger: LedgerService) -> Self {
        Self { ledger }
    }

    /// Every contact as CSV, labels joined with `,`.
    ///
    /// # Errors
    ///
    /// Ledger read or CSV write failures.
    #[tracing::instrument(skip(self))]
    pub async fn export_contacts(&self) -> Result<String, TransferError> {
        let contacts = self.ledger.list_contacts().await?;
        let mut writer = csv_writer(&CONTACT_COLUMNS)?;
        for contact in &contacts {
            writer.serialize(ContactCsvRow::from(contact))?;
        }
        tracing::info!(rows = contacts.len(), "Contacts exported");
        finish(writer)
    }

    /// Every payment as CSV with the paying contact's name and email.
    ///
    /// # Errors
    ///
    /// Ledger read or CSV write failures.
    #[tracing::instrument(skip(self))]
    pub async fn export_payments(&self) -> Result<String, TransferError> {
        let payments = self.ledger.list_payments().await?;
        let mut writer = csv_writer(&PAYMENT_COLUMNS)?;
        for payment in &payments {
            let contact = payment.contacts.as_ref();
            writer.serialize(PaymentCsvRow {
                contact_name: contact.map(|c| c.full_name()).unwrap_or_default(),
                contact_email: contact.map_or("", |c| c.email.as_str()),
                payment_date: payment.payment_date,
                amount: payment.amount,
                status: &payment.status,
                payment_method: &payment.payment_method,
                notes: &payment.notes,
            })?;
        }
        tracing::info!(rows = payments.len(), "Payments exported");
        finish(writer)
    }

    /// Import contacts, skipping rows whose email already exists.
    ///
    /// Rows with neither a first name nor an email are ignored. Email
    /// matching is exact, so a contact added earlier in the same file also
    /// causes later duplicates to be skipped.
    ///
    /// # Errors
    ///
    /// [`TransferError::MissingHeader`] when the header row names neither
    /// `first_name` nor `email`. Per-row problems are counted, not returned.
    #[tracing::instrument(skip(self, input), fields(bytes = input.len()))]
    pub async fn import_contacts(&self, input: &[u8]) -> Result<ContactImport, TransferError> {
        let mut reader = reader(input, &["first_name", "email"])?;
        let mut outcome = ContactImport::default();

        for (line, row) in reader.deserialize::<ContactImportRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(error) => {
                    tracing::warn!(line = line + 2, %error, "Unreadable contact row");
                    outcome.failed += 1;
                    metrics::record_csv_row("contacts", "failed");
                    continue;
                },
            };
            if row.first_name.is_empty() && row.email.is_empty() {
                continue;
            }
            if !row.email.is_empty() {
                match self.ledger.find_contact_by_email(&row.email).await {
                    Ok(Some(_)) => {
                        outcome.skipped += 1;
                        metrics::record_csv_row("contacts", "skipped");
                        continue;
                    },
                    Ok(None) => {},
                    Err(error) => {
                        tracing::warn!(line = line + 2, %error, "Duplicate check failed");
                        outcome.failed += 1;
                        metrics::record_csv_row("contacts", "failed");
                        continue;
                    },
                }
            }
            match self.ledger.create_contact(row.into()).await {
                Ok(_) => {
                    outcome.added += 1;
                    metrics::record_csv_row("contacts", "added");
                },
                Err(error) => {
                    tracing::warn!(line = line + 2, %error, "Contact row rejected");
                    outcome.failed += 1;
                    metrics::record_csv_row("contacts", "failed");
                },
            }
        }

        tracing::info!(added = outcome.added, skipped = outcome.skipped, failed = outcome.failed, "Contact import finished");
        Ok(outcome)
    }

    /// Import payments, resolving each contact by exact email.
    ///
    /// Rows with an empty amount are ignored.
    ///
    /// # Errors
    ///
    /// [`TransferError::MissingHeader`] when the header row has no `amount`
    /// column. Per-row problems are counted, not returned.
    #[tracing::instrument(skip(self, input), fields(bytes = input.len()))]
    pub async fn import_payments(&self, input: &[u8]) -> Result<PaymentImport, TransferError> {
        let mut reader = reader(input, &["amount"])?;
        let mut outcome = PaymentImport::default();

        for (line, row) in reader.deserialize::<PaymentImportRow>().enumerate() {
            let line = line + 2;
            let result = match row {
                Ok(row) if row.amount.trim().is_empty() => continue,
                Ok(row) => self.import_payment(row).await,
                Err(error) => Err(error.to_string()),
            };
            match result {
                Ok(()) => {
                    outcome.succeeded += 1;
                    metrics::record_csv_row("payments", "added");
                },
                Err(reason) => {
                    tracing::warn!(line, %reason, "Payment row rejected");
                    outcome.failed += 1;
                    metrics::record_csv_row("payments", "failed");
                },
            }
        }

        tracing::info!(succeeded = outcome.succeeded, failed = outcome.failed, "Payment import finished");
        Ok(outcome)
    }

    async fn import_payment(&self, row: PaymentImportRow) -> Result<(), String> {
        let amount: Money = row.amount.parse()?;
        let payment_date = match row.payment_date.trim() {
            "" => None,
            date => Some(
                date.parse::<NaiveDate>()
                    .map_err(|e| format!("bad payment_date {date:?}: {e}"))?,
            ),
        };
        let contact = self
            .ledger
            .find_contact_by_email(&row.contact_email)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no contact with email {:?}", row.contact_email))?;

        self.ledger
            .record_payment(
                PaymentDraft {
                    contact_id: contact.id,
                    amount,
                    payment_date,
                    status: Some(non_empty(row.status, IMPORTED_PAYMENT_STATUS)),
                    payment_method: Some(non_empty(row.payment_method, IMPORTED_PAYMENT_METHOD)),
                    notes: row.notes,
                    invoice_id: None,
                },
                "import",
            )
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
