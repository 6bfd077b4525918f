//! Roster endpoints:
//! - GET/POST /api/admin/band-members
//! - PUT /api/admin/band-members/:id
//! - DELETE /api/admin/band-members/:id?confirm=true
//! - POST /api/admin/band-members/:id/availability-chat
//! - GET/POST /api/admin/availability
//! - PUT /api/admin/availability/:id
//! - DELETE /api/admin/availability/:id?confirm=true

use super::Confirm;
use crate::server::{AdminSession, AppState};
use crate::services::roster::{
    Availability, AvailabilityDraft, AvailabilityReport, BandMember, BandMemberDraft,
};
use crate::types::{AvailabilityId, BandMemberId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use backline_web::AppError;
use serde::Deserialize;

/// A band member's message to the availability agent.
#[derive(Debug, Deserialize)]
pub struct AvailabilityChatRequest {
    /// Natural-language availability statement
    pub message: String,
}

/// Band members, oldest first.
///
/// # Errors
///
/// 500 on store failure.
pub async fn list_members(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<BandMember>>, AppError> {
    Ok(Json(state.roster.list_members().await?))
}

/// Add a band member.
///
/// # Errors
///
/// 422 when the name or email is blank.
pub async fn create_member(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(draft): Json<BandMemberDraft>,
) -> Result<(StatusCode, Json<BandMember>), AppError> {
    let member = state.roster.create_member(draft).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Replace a band member's fields.
///
/// # Errors
///
/// 404 for an unknown id, 422 for blank fields.
pub async fn update_member(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<BandMemberId>,
    Json(draft): Json<BandMemberDraft>,
) -> Result<Json<BandMember>, AppError> {
    Ok(Json(state.roster.update_member(id, draft).await?))
}

/// Remove a band member and their availability.
///
/// # Errors
///
/// 400 without confirmation, 404 for an unknown id.
pub async fn delete_member(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<BandMemberId>,
    Query(confirm): Query<Confirm>,
) -> Result<StatusCode, AppError> {
    confirm.require()?;
    state.roster.delete_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Tell the agent about a member's availability.
///
/// # Errors
///
/// 404 for an unknown member, 502 `Error contacting agent.` when the agent fails.
pub async fn availability_chat(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<BandMemberId>,
    Json(request): Json<AvailabilityChatRequest>,
) -> Result<Json<AvailabilityReport>, AppError> {
    Ok(Json(state.roster.report_availability(id, &request.message).await?))
}

/// Every block-out, earliest first.
///
/// # Errors
///
/// 500 on store failure.
pub async fn list_availability(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Availability>>, AppError> {
    Ok(Json(state.roster.list_availability().await?))
}

/// Record a block-out.
///
/// # Errors
///
/// 422 for a missing or inverted date range.
pub async fn add_availability(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(draft): Json<AvailabilityDraft>,
) -> Result<(StatusCode, Json<Availability>), AppError> {
    let availability = state.roster.add_availability(draft).await?;
    Ok((StatusCode::CREATED, Json(availability)))
}

/// Change a block-out.
///
/// # Errors
///
/// 404 for an unknown id, 422 for a bad range.
pub async fn edit_availability(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<AvailabilityId>,
    Json(draft): Json<AvailabilityDraft>,
) -> Result<Json<Availability>, AppError> {
    Ok(Json(state.roster.edit_availability(id, draft).await?))
}

/// Remove a block-out.
///
/// # Errors
///
/// 400 without confirmation, 404 for an unknown id.
pub async fn delete_availability(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<AvailabilityId>,
    Query(confirm): Query<Confirm>,
) -> Result<StatusCode, AppError> {
    confirm.require()?;
    state.roster.delete_availability(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
