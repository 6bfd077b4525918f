//! # Backline Authentication
//!
//! Admin sign-in for the back-office, delegated to a hosted auth provider.
//!
//! The crate exposes one seam, [`AuthProvider`], with a GoTrue-compatible
//! HTTP implementation for production and an in-memory mock for tests.
//! A [`Session`] is an explicit value: the web layer resolves the bearer
//! token of each request into one and hands it to the handler.
//!
//! ## Example
//!
//! ```rust,ignore
//! use backline_auth::{AuthProvider, GoTrueAuthProvider};
//!
//! let provider = GoTrueAuthProvider::new("https://project.supabase.co", anon_key);
//! let session = provider.sign_in_with_password("kacie@example.com", "secret").await?;
//! let same = provider.get_session(&session.access_token).await?;
//! ```

// Public modules
pub mod error;
pub mod providers;
pub mod state;

/// Mock providers for testing
#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export main types for convenience
pub use error::{AuthError, Result};
pub use providers::{AuthFuture, AuthProvider, GoTrueAuthProvider};
pub use state::{AuthEvent, Session, User, UserId};
