//! Admin session extractor.
//!
//! Resolves the request's bearer token through the auth provider. Handlers
//! that take an [`AdminSession`] are admin-only; there is no ambient user.

use super::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use backline_auth::Session;
use backline_web::{AppError, BearerToken};

/// A live admin session, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let session = state.auth.get_session(&token).await?;

        if session.is_expired(state.clock.now()) {
            tracing::debug!(user_id = %session.user.id, "Rejected expired session");
            return Err(AppError::unauthorized("Missing or expired session"));
        }

        Ok(Self(session))
    }
}
