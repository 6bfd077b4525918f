//! Auth provider trait and implementations.

use crate::error::Result;
use crate::state::{AuthEvent, Session};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::broadcast;

pub mod gotrue;

pub use gotrue::GoTrueAuthProvider;

/// Boxed future returned by [`AuthProvider`] methods.
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Hosted authentication provider.
///
/// Account management stays with the provider; the back-office only signs
/// admins in and out and resolves bearer tokens to sessions.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so it can be shared as
/// `Arc<dyn AuthProvider>` in the HTTP state.
pub trait AuthProvider: Send + Sync {
    /// Exchange email and password for a session.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` when rejected; transport errors otherwise.
    fn sign_in_with_password(&self, email: &str, password: &str) -> AuthFuture<'_, Session>;

    /// End the session identified by `access_token`.
    ///
    /// # Errors
    ///
    /// Transport or provider errors.
    fn sign_out(&self, access_token: &str) -> AuthFuture<'_, ()>;

    /// Ask the provider to email a password-reset link.
    ///
    /// # Errors
    ///
    /// Transport or provider errors.
    fn reset_password_for_email(&self, email: &str) -> AuthFuture<'_, ()>;

    /// Resolve a bearer token to its session.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` / `SessionExpired` when the token is not live.
    fn get_session(&self, access_token: &str) -> AuthFuture<'_, Session>;

    /// Subscribe to sign-in / sign-out notifications.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
