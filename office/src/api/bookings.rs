//! Booking endpoints:
//! - GET /api/admin/bookings?state=<state|all>
//! - POST /api/admin/bookings
//! - GET /api/admin/bookings/:id
//! - PUT /api/admin/bookings/:id
//! - GET /api/admin/bookings/:id/transitions
//! - POST /api/admin/bookings/:id/transitions

use crate::aggregates::booking::{Booking, BookingChanges, BookingDraft, BookingLifecycle, BookingTransition};
use crate::server::{AdminSession, AppState};
use crate::types::BookingId;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use backline_web::AppError;
use serde::{Deserialize, Serialize};

/// Query parameters for listing bookings.
#[derive(Debug, Default, Deserialize)]
pub struct ListBookingsQuery {
    /// Lifecycle state, or `all`
    pub state: Option<String>,
}

impl ListBookingsQuery {
    fn state(&self) -> Result<Option<BookingLifecycle>, AppError> {
        match self.state.as_deref() {
            None | Some("" | "all") => Ok(None),
            Some(state) => state.parse().map(Some).map_err(AppError::validation),
        }
    }
}

/// Request to apply an admin action.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    /// Action name (`approve`, `cancel`, ...)
    pub action: BookingTransition,
}

/// Actions available from a booking's current state.
#[derive(Debug, Serialize)]
pub struct AvailableTransitions {
    /// Current state
    pub state: BookingLifecycle,
    /// Actions the transition table allows from it
    pub actions: Vec<BookingTransition>,
}

/// List bookings, optionally in one state.
///
/// ```bash
/// curl -H "Authorization: Bearer <token>" \
///   "http://localhost:8080/api/admin/bookings?state=confirmed"
/// ```
///
/// # Errors
///
/// 422 for an unknown state name.
pub async fn list_bookings(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list(query.state()?).await?))
}

/// Create a booking in `inquiry`.
///
/// # Errors
///
/// 422 when a required field is missing or malformed.
pub async fn create_booking(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(draft): Json<BookingDraft>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.create(draft).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// One booking.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn get_booking(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(id).await?))
}

/// Replace a booking's fields, optionally moving it one edge.
///
/// # Errors
///
/// 404, 409 for an illegal move or a concurrent change, 422 for bad fields.
pub async fn edit_booking(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    Json(changes): Json<BookingChanges>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.edit(id, changes).await?))
}

/// Actions the admin may take on a booking right now.
///
/// # Errors
///
/// 404 for an unknown id.
pub async fn available_transitions(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<Json<AvailableTransitions>, AppError> {
    let booking = state.bookings.get(id).await?;
    let actions = BookingTransition::ALL
        .into_iter()
        .filter(|action| booking.state.apply(*action).is_some())
        .collect();
    Ok(Json(AvailableTransitions {
        state: booking.state,
        actions,
    }))
}

/// Apply an admin action.
///
/// ```bash
/// curl -X POST -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"action": "approve"}' \
///   http://localhost:8080/api/admin/bookings/<id>/transitions
/// ```
///
/// # Errors
///
/// 404, 409 when the action is not allowed from the current state, 422 when
/// confirming without an event date.
pub async fn apply_transition(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.transition(id, request.action).await?))
}
