//! Application services over the record store.
//!
//! Each service owns its domain's reads and writes and returns its own
//! `thiserror` error type. Handlers in [`crate::api`] translate those errors
//! into HTTP responses.

pub mod bookings;
pub mod chat;
pub mod inquiries;
pub mod invoicing;
pub mod ledger;
pub mod roster;
pub mod transfer;

pub use bookings::BookingService;
pub use chat::{ChatRelay, VenueMessage};
pub use inquiries::{InquiryError, InquiryService};
pub use invoicing::{InvoiceEmail, InvoiceTotals, PrintLayout};
pub use ledger::{LedgerError, LedgerService};
pub use roster::{RosterError, RosterService};
pub use transfer::{TransferError, TransferService};
