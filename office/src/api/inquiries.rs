//! Inquiry conversation endpoints:
//! - GET /api/admin/conversations?filter=<active|archived>
//! - GET /api/admin/inbox?filter=&selected=
//! - GET /api/admin/conversations/:id/messages
//! - PUT /api/admin/conversations/:id/status
//! - DELETE /api/admin/conversations/:id?confirm=true
//! - GET /api/admin/conversations/:id/booking-draft
//! - POST /api/admin/conversations/:id/promote

use super::Confirm;
use crate::aggregates::booking::{Booking, BookingDraft};
use crate::aggregates::inbox::{InboxAction, InboxEnvironment, InboxReducer, InboxState};
use crate::server::{AdminSession, AppState};
use crate::services::inquiries::{
    Conversation, ConversationFilter, ConversationStatus, Message, booking_draft,
};
use crate::types::ConversationId;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use backline_runtime::Store;
use backline_web::AppError;
use serde::Deserialize;

/// Query parameters for conversation listings.
#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    /// Which conversations to show (default active)
    #[serde(default)]
    pub filter: ConversationFilter,
}

/// Query parameters for the inbox view.
#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    /// Which conversations to show (default active)
    #[serde(default)]
    pub filter: ConversationFilter,
    /// Conversation to open; defaults to the newest
    pub selected: Option<ConversationId>,
}

/// New conversation status.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    /// `active`, `resolved` or `archived`
    pub status: ConversationStatus,
}

/// Conversations, newest first.
///
/// # Errors
///
/// 500 on store failure.
pub async fn list_conversations(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    Ok(Json(state.inquiries.list_conversations(query.filter).await?))
}

/// The inbox view: the filtered list, the selected conversation and its
/// messages, computed by running the inbox reducer to completion.
///
/// # Errors
///
/// 500 on store failure.
pub async fn inbox(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<InboxState>, AppError> {
    let environment = InboxEnvironment {
        inquiries: state.inquiries.clone(),
    };
    let store = Store::new(InboxState::with_filter(query.filter), InboxReducer::new(), environment);

    let result = async {
        store.send(InboxAction::Refresh).await?.wait().await?;
        if let Some(id) = query.selected {
            store.send(InboxAction::Select { id }).await?.wait().await?;
        }
        Ok::<_, backline_runtime::StoreError>(store.state(Clone::clone).await)
    }
    .await;
    store.shutdown();

    let inbox = result.map_err(|e| AppError::internal("Inbox could not be loaded").with_source(e))?;
    if let Some(error) = inbox.last_error.clone() {
        return Err(error.into());
    }
    Ok(Json(inbox))
}

/// Messages of one conversation, oldest first.
///
/// # Errors
///
/// 500 on store failure.
pub async fn list_messages(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(state.inquiries.get_messages(id).await?))
}

/// Change a conversation's status.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn set_status(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Conversation>, AppError> {
    Ok(Json(state.inquiries.set_status(id, request.status).await?))
}

/// Delete a conversation and its messages.
///
/// # Errors
///
/// 400 without `?confirm=true`, 404 for an unknown id.
pub async fn delete_conversation(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Query(confirm): Query<Confirm>,
) -> Result<StatusCode, AppError> {
    confirm.require()?;
    state.inquiries.delete_conversation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Prefilled booking fields for the promote form.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn booking_draft_for(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<BookingDraft>, AppError> {
    let conversation = state.inquiries.get_conversation(id).await?;
    Ok(Json(booking_draft(&conversation)))
}

/// Create a booking from a conversation and resolve it.
///
/// # Errors
///
/// 404 for an unknown conversation, 422 for invalid booking fields.
pub async fn promote(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Json(draft): Json<BookingDraft>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.inquiries.promote_to_booking(id, draft).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}
