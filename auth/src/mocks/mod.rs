//! Mock auth provider for testing.

use crate::error::{AuthError, Result};
use crate::providers::{AuthFuture, AuthProvider};
use crate::state::{AuthEvent, Session, User, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

#[derive(Debug, Default)]
struct Accounts {
    passwords: HashMap<String, (UserId, String)>,
    sessions: HashMap<String, Session>,
    reset_requests: Vec<String>,
    issued: u64,
}

/// In-memory auth provider.
///
/// Tokens are `token-<n>`; sessions never expire.
#[derive(Debug, Clone)]
pub struct MockAuthProvider {
    accounts: Arc<Mutex<Accounts>>,
    events: broadcast::Sender<AuthEvent>,
}

impl MockAuthProvider {
    /// Create a provider with no accounts.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            accounts: Arc::new(Mutex::new(Accounts::default())),
            events,
        }
    }

    /// Register an account.
    #[must_use]
    pub fn with_user(self, email: &str, password: &str) -> Self {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts
                .passwords
                .insert(email.to_string(), (UserId::new(), password.to_string()));
        }
        self
    }

    /// Emails that requested a password reset (for assertions).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn reset_requests(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.reset_requests.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Accounts>> {
        self.accounts
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".to_string()))
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut accounts = self.lock()?;
        let user_id = match accounts.passwords.get(email) {
            Some((id, expected)) if expected == password => *id,
            _ => return Err(AuthError::InvalidCredentials),
        };
        accounts.issued += 1;
        let session = Session {
            access_token: format!("token-{}", accounts.issued),
            user: User {
                id: user_id,
                email: email.to_string(),
            },
            expires_at: None,
        };
        accounts
            .sessions
            .insert(session.access_token.clone(), session.clone());
        drop(accounts);
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    fn sign_out_token(&self, token: &str) -> Result<()> {
        let removed = self.lock()?.sessions.remove(token);
        let session = removed.ok_or(AuthError::SessionNotFound)?;
        let _ = self.events.send(AuthEvent::SignedOut {
            user_id: session.user.id,
        });
        Ok(())
    }

    fn lookup(&self, token: &str) -> Result<Session> {
        self.lock()?
            .sessions
            .get(token)
            .cloned()
            .ok_or(AuthError::SessionNotFound)
    }
}

impl Default for MockAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for MockAuthProvider {
    fn sign_in_with_password(&self, email: &str, password: &str) -> AuthFuture<'_, Session> {
        let result = self.sign_in(email, password);
        Box::pin(async move { result })
    }

    fn sign_out(&self, access_token: &str) -> AuthFuture<'_, ()> {
        let result = self.sign_out_token(access_token);
        Box::pin(async move { result })
    }

    fn reset_password_for_email(&self, email: &str) -> AuthFuture<'_, ()> {
        let result = self
            .lock()
            .map(|mut accounts| accounts.reset_requests.push(email.to_string()));
        Box::pin(async move { result })
    }

    fn get_session(&self, access_token: &str) -> AuthFuture<'_, Session> {
        let result = self.lookup(access_token);
        Box::pin(async move { result })
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
