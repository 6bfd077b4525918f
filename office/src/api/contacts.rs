//! Contact endpoints:
//! - GET /api/admin/contacts?search=
//! - POST /api/admin/contacts
//! - GET/PUT /api/admin/contacts/:id
//! - DELETE /api/admin/contacts/:id?confirm=true
//! - POST /api/admin/contacts/bulk-delete?confirm=true
//! - GET /api/admin/contacts/export
//! - POST /api/admin/contacts/import (CSV body)
//! - GET /api/admin/summary

use super::{Confirm, csv_attachment};
use crate::server::{AdminSession, AppState};
use crate::services::ledger::{BulkOutcome, Contact, ContactDraft, LedgerSummary};
use crate::services::transfer::ContactImport;
use crate::types::ContactId;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use backline_web::AppError;
use serde::Deserialize;

/// Query parameters for listing contacts.
#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    /// Case-insensitive match on first name, last name or email
    pub search: Option<String>,
}

/// Ids for a bulk delete.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest<Id> {
    /// Records to delete, in order
    pub ids: Vec<Id>,
}

/// All contacts, newest first, optionally filtered.
///
/// # Errors
///
/// 500 on store failure.
pub async fn list_contacts(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ContactQuery>,
) -> Result<Json<Vec<Contact>>, AppError> {
    let contacts = match query.search.as_deref() {
        Some(term) => state.ledger.search_contacts(term).await?,
        None => state.ledger.list_contacts().await?,
    };
    Ok(Json(contacts))
}

/// Create a contact.
///
/// # Errors
///
/// 500 on store failure.
pub async fn create_contact(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(draft): Json<ContactDraft>,
) -> Result<(StatusCode, Json<Contact>), AppError> {
    let contact = state.ledger.create_contact(draft).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// One contact.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn get_contact(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<ContactId>,
) -> Result<Json<Contact>, AppError> {
    Ok(Json(state.ledger.get_contact(id).await?))
}

/// Replace a contact's fields.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn update_contact(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<ContactId>,
    Json(draft): Json<ContactDraft>,
) -> Result<Json<Contact>, AppError> {
    Ok(Json(state.ledger.update_contact(id, draft).await?))
}

/// Delete a contact with no invoices or payments.
///
/// # Errors
///
/// 400 without confirmation, 404 for an unknown id, 409 when referenced.
pub async fn delete_contact(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<ContactId>,
    Query(confirm): Query<Confirm>,
) -> Result<StatusCode, AppError> {
    confirm.require()?;
    state.ledger.delete_contact(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete several contacts; failures are counted, not raised.
///
/// # Errors
///
/// 400 without confirmation.
pub async fn bulk_delete_contacts(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(confirm): Query<Confirm>,
    Json(request): Json<BulkDeleteRequest<ContactId>>,
) -> Result<Json<BulkOutcome>, AppError> {
    confirm.require()?;
    Ok(Json(state.ledger.bulk_delete_contacts(&request.ids).await))
}

/// Every contact as a CSV download.
///
/// # Errors
///
/// 500 on store failure.
pub async fn export_contacts(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let csv = state.transfer.export_contacts().await?;
    Ok(csv_attachment("contacts.csv", csv))
}

/// Import contacts from a CSV body.
///
/// # Errors
///
/// 422 when the file has no usable header row.
pub async fn import_contacts(
    _session: AdminSession,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ContactImport>, AppError> {
    Ok(Json(state.transfer.import_contacts(&body).await?))
}

/// Dashboard figures.
///
/// # Errors
///
/// 500 on store failure.
pub async fn summary(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<LedgerSummary>, AppError> {
    Ok(Json(state.ledger.summary().await?))
}
