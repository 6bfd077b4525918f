//! Error types for authentication operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failure modes of the auth provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email/password pair rejected.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token does not resolve to a live session.
    #[error("Session not found")]
    SessionNotFound,

    /// Session has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// Provider answered with an unexpected status.
    #[error("Auth provider error (status {status}): {message}")]
    ProviderError {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Provider could not be reached.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Whether the caller should be treated as unauthenticated.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::SessionNotFound | Self::SessionExpired
        )
    }
}
