//! Payment endpoints:
//! - GET/POST /api/admin/payments
//! - GET/PUT /api/admin/payments/:id
//! - DELETE /api/admin/payments/:id?confirm=true
//! - POST /api/admin/payments/bulk-delete?confirm=true
//! - GET /api/admin/payments/export
//! - POST /api/admin/payments/import (CSV body)

use super::contacts::BulkDeleteRequest;
use super::{Confirm, csv_attachment};
use crate::server::{AdminSession, AppState};
use crate::services::ledger::{BulkOutcome, Payment, PaymentDraft};
use crate::services::transfer::PaymentImport;
use crate::types::PaymentId;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use backline_web::AppError;

/// All payments with their contact, newest first.
///
/// # Errors
///
/// 500 on store failure.
pub async fn list_payments(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(state.ledger.list_payments().await?))
}

/// Record a payment.
///
/// # Errors
///
/// 404 for an unknown contact, 422 for a negative amount.
pub async fn create_payment(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(draft): Json<PaymentDraft>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let payment = state.ledger.create_payment(draft).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// One payment.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn get_payment(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.ledger.get_payment(id).await?))
}

/// Replace a payment's fields.
///
/// # Errors
///
/// 404 for an unknown payment or contact.
pub async fn update_payment(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
    Json(draft): Json<PaymentDraft>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.ledger.update_payment(id, draft).await?))
}

/// Delete a payment.
///
/// # Errors
///
/// 400 without confirmation, 404 for an unknown id.
pub async fn delete_payment(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
    Query(confirm): Query<Confirm>,
) -> Result<StatusCode, AppError> {
    confirm.require()?;
    state.ledger.delete_payment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete several payments; failures are counted, not raised.
///
/// # Errors
///
/// 400 without confirmation.
pub async fn bulk_delete_payments(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(confirm): Query<Confirm>,
    Json(request): Json<BulkDeleteRequest<PaymentId>>,
) -> Result<Json<BulkOutcome>, AppError> {
    confirm.require()?;
    Ok(Json(state.ledger.bulk_delete_payments(&request.ids).await))
}

/// Every payment as a CSV download.
///
/// # Errors
///
/// 500 on store failure.
pub async fn export_payments(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let csv = state.transfer.export_payments().await?;
    Ok(csv_attachment("payments.csv", csv))
}

/// Import payments from a CSV body.
///
/// # Errors
///
/// 422 when the file has no `amount` column.
pub async fn import_payments(
    _session: AdminSession,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PaymentImport>, AppError> {
    Ok(Json(state.transfer.import_payments(&body).await?))
}
