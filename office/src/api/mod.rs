//! HTTP API handlers, organized by domain:
//! - Auth: admin sign-in, sign-out, password reset, current session
//! - Bookings: lifecycle listing, creation, edits and transitions
//! - Inquiries: conversations, inbox view, promote-to-booking
//! - Contacts, payments, invoices: the ledger plus CSV import/export
//! - Roster: band members, availability and the availability chat
//! - Chat: the public inquiry relay
//!
//! Every admin handler takes an [`AdminSession`](crate::server::AdminSession).
//! Domain errors become [`AppError`]s through the `From` impls below.

pub mod auth;
pub mod bookings;
pub mod chat;
pub mod contacts;
pub mod inquiries;
pub mod invoices;
pub mod payments;
pub mod roster;

use crate::aggregates::booking::BookingError;
use crate::services::{InquiryError, LedgerError, RosterError, TransferError};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use backline_web::AppError;
use serde::Deserialize;

/// `?confirm=true`, required by every delete.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Confirm {
    /// Explicit confirmation
    #[serde(default)]
    pub confirm: bool,
}

impl Confirm {
    /// Reject unconfirmed deletes with 400.
    ///
    /// # Errors
    ///
    /// [`AppError::bad_request`] when `confirm` is not `true`.
    pub fn require(self) -> Result<(), AppError> {
        if self.confirm {
            Ok(())
        } else {
            Err(AppError::bad_request("Deletion must be confirmed with ?confirm=true"))
        }
    }
}

/// A CSV download named `filename`.
pub(crate) fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response()
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        match error {
            BookingError::NotFound(id) => Self::not_found("Booking", id),
            BookingError::Validation(message) => Self::validation(message),
            e @ (BookingError::IllegalTransition { .. } | BookingError::Conflict(_)) => {
                Self::conflict(e.to_string())
            },
            e @ (BookingError::Store(_) | BookingError::Runtime(_)) => {
                Self::internal("Booking could not be saved").with_source(e)
            },
        }
    }
}

impl From<InquiryError> for AppError {
    fn from(error: InquiryError) -> Self {
        match error {
            InquiryError::NotFound(id) => Self::not_found("Conversation", id),
            InquiryError::Booking(e) => e.into(),
            e @ InquiryError::Store(_) => Self::internal("A storage error occurred").with_source(e),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::NotFound { entity, id } => Self::not_found(entity, id),
            LedgerError::Validation(message) => Self::validation(message),
            e @ (LedgerError::HasDependents
            | LedgerError::AlreadyPaid(_)
            | LedgerError::DuplicateInvoiceNumber(_)) => Self::conflict(e.to_string()),
            e @ LedgerError::Store(_) => Self::internal("A storage error occurred").with_source(e),
        }
    }
}

impl From<RosterError> for AppError {
    fn from(error: RosterError) -> Self {
        match error {
            RosterError::NotFound { entity, id } => Self::not_found(entity, id),
            RosterError::Validation(message) => Self::validation(message),
            e @ RosterError::AgentUnavailable(_) => Self::bad_gateway(e.to_string()).with_source(e),
            e @ RosterError::Store(_) => Self::internal("A storage error occurred").with_source(e),
        }
    }
}

impl From<TransferError> for AppError {
    fn from(error: TransferError) -> Self {
        match error {
            TransferError::Ledger(e) => e.into(),
            e @ (TransferError::MissingHeader | TransferError::Csv(_)) => Self::validation(e.to_string()),
            e @ TransferError::Encoding(_) => Self::internal("CSV export failed").with_source(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::booking::BookingLifecycle;
    use crate::types::BookingId;
    use axum::http::StatusCode;
    use backline_core::record_store::RecordStoreError;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (AppError::from(BookingError::NotFound(BookingId::new())), StatusCode::NOT_FOUND),
            (
                AppError::from(BookingError::IllegalTransition {
                    from: BookingLifecycle::Inquiry,
                    action: "approve".into(),
                }),
                StatusCode::CONFLICT,
            ),
            (AppError::from(BookingError::Validation("x".into())), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::from(LedgerError::HasDependents), StatusCode::CONFLICT),
            (AppError::from(LedgerError::AlreadyPaid("INV-1".into())), StatusCode::CONFLICT),
            (
                AppError::from(LedgerError::Store(RecordStoreError::DatabaseError("down".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::from(TransferError::MissingHeader), StatusCode::UNPROCESSABLE_ENTITY),
            (
                AppError::from(RosterError::AgentUnavailable(backline_agent::AgentError::Timeout)),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }

    #[test]
    fn dependents_message_reaches_the_client() {
        let error = AppError::from(LedgerError::HasDependents);
        assert!(error.message().starts_with("Cannot delete this contact"));
    }

    #[test]
    fn unconfirmed_delete_is_a_bad_request() {
        let error = Confirm::default().require().err();
        assert_eq!(error.map(|e| e.status()), Some(StatusCode::BAD_REQUEST));
        assert!(Confirm { confirm: true }.require().is_ok());
    }
}
