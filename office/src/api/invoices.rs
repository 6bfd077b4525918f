//! Invoice endpoints:
//! - GET/POST /api/admin/invoices
//! - GET/PUT /api/admin/invoices/:id
//! - DELETE /api/admin/invoices/:id?confirm=true
//! - POST /api/admin/invoices/:id/mark-paid
//! - GET /api/admin/invoices/:id/email
//! - POST /api/admin/invoices/totals
//! - GET /api/admin/invoices/print-layout?width=&height=&pages=

use super::Confirm;
use crate::server::{AdminSession, AppState};
use crate::services::invoicing::{InvoiceEmail, InvoiceTotals, PrintLayout};
use crate::services::ledger::invoices::PaidInvoice;
use crate::services::ledger::{Invoice, InvoiceDraft, InvoiceItemDraft};
use crate::types::InvoiceId;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use backline_web::AppError;
use serde::Deserialize;

/// Default page cap for the print plan.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Live totals request from the invoice form.
#[derive(Debug, Deserialize)]
pub struct TotalsRequest {
    /// Lines as entered
    #[serde(default)]
    pub items: Vec<InvoiceItemDraft>,
    /// Tax percent
    #[serde(default)]
    pub tax: f64,
}

/// Rendered preview size for the print plan.
#[derive(Debug, Deserialize)]
pub struct PrintLayoutQuery {
    /// Preview width in pixels
    pub width: u32,
    /// Preview height in pixels
    pub height: u32,
    /// Page cap
    #[serde(default = "default_page_limit")]
    pub pages: u32,
}

const fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

/// All invoices with their contact, newest issue date first.
///
/// # Errors
///
/// 500 on store failure.
pub async fn list_invoices(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    Ok(Json(state.ledger.list_invoices().await?))
}

/// One invoice with its items.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn get_invoice(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.ledger.get_invoice(id).await?))
}

/// Create an invoice; amounts are computed here, never taken from the client.
///
/// ```bash
/// curl -X POST -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"contact_id": "<id>", "tax": 8, "items": [{"description": "Show", "quantity": 1, "rate": 1500}]}' \
///   http://localhost:8080/api/admin/invoices
/// ```
///
/// # Errors
///
/// 404 for an unknown contact, 409 for a duplicate number, 422 for bad input.
pub async fn create_invoice(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(draft): Json<InvoiceDraft>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let invoice = state.ledger.save_invoice(None, draft).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Replace an invoice and its items.
///
/// # Errors
///
/// As [`create_invoice`], plus 404 for an unknown invoice.
pub async fn update_invoice(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
    Json(draft): Json<InvoiceDraft>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.ledger.save_invoice(Some(id), draft).await?))
}

/// Delete an invoice and its items.
///
/// # Errors
///
/// 400 without confirmation, 404 for an unknown id.
pub async fn delete_invoice(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
    Query(confirm): Query<Confirm>,
) -> Result<StatusCode, AppError> {
    confirm.require()?;
    state.ledger.delete_invoice(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark an invoice paid and record the matching payment.
///
/// # Errors
///
/// 404 for an unknown id, 409 when already paid.
pub async fn mark_paid(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<PaidInvoice>, AppError> {
    Ok(Json(state.ledger.mark_invoice_paid(id).await?))
}

/// The email that accompanies an invoice.
///
/// # Errors
///
/// 404 for an unknown invoice.
pub async fn invoice_email(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<InvoiceEmail>, AppError> {
    Ok(Json(state.ledger.invoice_email(id, &state.band.name).await?))
}

/// Totals for the lines currently on the form.
///
/// # Errors
///
/// 422 for a negative tax rate.
#[allow(clippy::unused_async)]
pub async fn preview_totals(
    _session: AdminSession,
    Json(request): Json<TotalsRequest>,
) -> Result<Json<InvoiceTotals>, AppError> {
    if request.tax < 0.0 || !request.tax.is_finite() {
        return Err(AppError::validation("tax must be a non-negative number"));
    }
    Ok(Json(InvoiceTotals::compute(&request.items, request.tax)))
}

/// A4 page plan for a rendered invoice preview.
///
/// # Errors
///
/// 422 for a zero-width preview.
#[allow(clippy::unused_async)]
pub async fn print_layout(
    _session: AdminSession,
    Query(query): Query<PrintLayoutQuery>,
) -> Result<Json<PrintLayout>, AppError> {
    PrintLayout::plan(query.width, query.height, query.pages)
        .map(Json)
        .ok_or_else(|| AppError::validation("width must be greater than zero"))
}
