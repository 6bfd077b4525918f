//! GoTrue-compatible auth provider over HTTP.

use super::{AuthFuture, AuthProvider};
use crate::error::{AuthError, Result};
use crate::state::{AuthEvent, Session, User};
use chrono::{Duration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: User,
}

/// Auth provider speaking the GoTrue REST API (`/auth/v1/...`).
#[derive(Debug, Clone)]
pub struct GoTrueAuthProvider {
    client: Client,
    base_url: String,
    api_key: String,
    events: broadcast::Sender<AuthEvent>,
}

impl GoTrueAuthProvider {
    /// Create a provider for the project at `base_url` using its public API key.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            events,
        }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| AuthError::RequestFailed(e.to_string()))
    }

    async fn provider_error(response: Response) -> AuthError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        AuthError::ProviderError { status, message }
    }

    fn notify(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl AuthProvider for GoTrueAuthProvider {
    fn sign_in_with_password(&self, email: &str, password: &str) -> AuthFuture<'_, Session> {
        let body = json!({ "email": email, "password": password });
        Box::pin(async move {
            let response = Self::send(
                self.request(self.client.post(self.url("token?grant_type=password")))
                    .json(&body),
            )
            .await?;

            match response.status() {
                status if status.is_success() => {
                    let token = response
                        .json::<TokenResponse>()
                        .await
                        .map_err(|e| AuthError::InternalError(e.to_string()))?;
                    let session = Session {
                        access_token: token.access_token,
                        user: token.user,
                        expires_at: token
                            .expires_in
                            .map(|secs| Utc::now() + Duration::seconds(secs)),
                    };
                    tracing::info!(user_id = %session.user.id, "Admin signed in");
                    self.notify(AuthEvent::SignedIn(session.clone()));
                    Ok(session)
                },
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                    tracing::warn!("Admin sign-in rejected");
                    Err(AuthError::InvalidCredentials)
                },
                _ => Err(Self::provider_error(response).await),
            }
        })
    }

    fn sign_out(&self, access_token: &str) -> AuthFuture<'_, ()> {
        let token = access_token.to_string();
        Box::pin(async move {
            let session = self.get_session(&token).await?;
            let response =
                Self::send(self.request(self.client.post(self.url("logout"))).bearer_auth(&token))
                    .await?;
            if !response.status().is_success() {
                return Err(Self::provider_error(response).await);
            }
            tracing::info!(user_id = %session.user.id, "Admin signed out");
            self.notify(AuthEvent::SignedOut {
                user_id: session.user.id,
            });
            Ok(())
        })
    }

    fn reset_password_for_email(&self, email: &str) -> AuthFuture<'_, ()> {
        let body = json!({ "email": email });
        Box::pin(async move {
            let response =
                Self::send(self.request(self.client.post(self.url("recover"))).json(&body)).await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::provider_error(response).await)
            }
        })
    }

    fn get_session(&self, access_token: &str) -> AuthFuture<'_, Session> {
        let token = access_token.to_string();
        Box::pin(async move {
            let response =
                Self::send(self.request(self.client.get(self.url("user"))).bearer_auth(&token))
                    .await?;
            match response.status() {
                status if status.is_success() => {
                    let user = response
                        .json::<User>()
                        .await
                        .map_err(|e| AuthError::InternalError(e.to_string()))?;
                    Ok(Session {
                        access_token: token,
                        user,
                        expires_at: None,
                    })
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::SessionNotFound),
                _ => Err(Self::provider_error(response).await),
            }
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
