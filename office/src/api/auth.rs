//! Admin authentication endpoints:
//! - POST /api/auth/sign-in
//! - POST /api/auth/sign-out
//! - POST /api/auth/reset-password
//! - GET /api/auth/session

use crate::server::{AdminSession, AppState};
use axum::{Json, extract::State, http::StatusCode};
use backline_auth::Session;
use backline_web::{AppError, BearerToken};
use serde::Deserialize;

/// Email and password sign-in.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    /// Login email
    pub email: String,
    /// Password
    pub password: String,
}

/// Password reset request.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    /// Account email
    pub email: String,
}

/// Exchange credentials for a session.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/auth/sign-in \
///   -H "Content-Type: application/json" \
///   -d '{"email": "kacie@example.com", "password": "..."}'
/// ```
///
/// # Errors
///
/// 401 for a wrong email/password pair, 502 when the provider is down.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<Session>, AppError> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }
    let session = state
        .auth
        .sign_in_with_password(request.email.trim(), &request.password)
        .await?;
    tracing::info!(user_id = %session.user.id, "Admin signed in");
    Ok(Json(session))
}

/// End the presented session.
///
/// # Errors
///
/// 401 when the token does not name a live session.
pub async fn sign_out(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, AppError> {
    state.auth.sign_out(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a password reset email. Always 202 for a well-formed request.
///
/// # Errors
///
/// 422 for a blank email, 502 when the provider is down.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    let email = request.email.trim();
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    state.auth.reset_password_for_email(email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// The caller's session.
#[allow(clippy::unused_async)]
pub async fn current_session(AdminSession(session): AdminSession) -> Json<Session> {
    Json(session)
}
