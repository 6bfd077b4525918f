//! Test support: the office schema for the in-memory record store.

use crate::aggregates::booking::BOOKINGS;
use crate::services::inquiries::{CONVERSATIONS, MESSAGES};
use crate::services::ledger::{CONTACTS, INVOICE_ITEMS, INVOICES, PAYMENTS};
use crate::services::roster::{AVAILABILITY, BAND_MEMBERS};
use backline_testing::{OnDelete, Schema, TableSchema};

/// Tables, unique columns and foreign keys of the SQL migration.
#[must_use]
pub fn office_schema() -> Schema {
    Schema::new()
        .table(TableSchema::new(CONTACTS))
        .table(TableSchema::new(CONVERSATIONS))
        .table(TableSchema::new(MESSAGES).references("conversation_id", CONVERSATIONS, OnDelete::Cascade))
        .table(TableSchema::new(BOOKINGS).references("conversation_id", CONVERSATIONS, OnDelete::SetNull))
        .table(
            TableSchema::new(INVOICES)
                .unique("invoice_number")
                .references("contact_id", CONTACTS, OnDelete::Restrict),
        )
        .table(TableSchema::new(INVOICE_ITEMS).references("invoice_id", INVOICES, OnDelete::Cascade))
        .table(
            TableSchema::new(PAYMENTS)
                .unique("invoice_id")
                .references("contact_id", CONTACTS, OnDelete::Restrict)
                .references("invoice_id", INVOICES, OnDelete::SetNull),
        )
        .table(TableSchema::new(BAND_MEMBERS))
        .table(TableSchema::new(AVAILABILITY).references("band_member_id", BAND_MEMBERS, OnDelete::Cascade))
}
