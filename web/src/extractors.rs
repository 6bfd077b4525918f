//! Custom Axum extractors.
//!
//! - `BearerToken`: The access token of an `Authorization: Bearer` header

use crate::error::AppError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

/// Access token from `Authorization: Bearer <token>`.
///
/// Rejects with 401 when the header is missing, is not a bearer credential,
/// or carries an empty token. Resolving the token into a session is left to
/// the application, which owns the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Expected a bearer token"))?;

        Ok(Self(token.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn bearer(value: Option<&str>) -> Result<BearerToken, AppError> {
        let mut builder = Request::builder();
        if let Some(value) = value {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, ()) = builder.body(()).expect("Valid request").into_parts();
        BearerToken::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn bearer_token_is_extracted() {
        let token = bearer(Some("Bearer token-1")).await.unwrap();
        assert_eq!(token, BearerToken("token-1".into()));
    }

    #[tokio::test]
    async fn missing_or_malformed_authorization_is_unauthorized() {
        for value in [None, Some("Basic dXNlcjpwdw=="), Some("Bearer   ")] {
            let err = bearer(value).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
