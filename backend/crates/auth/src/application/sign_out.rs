//! Sign Out Use Case
//!
//! Invalidates a user session.

use crate::application::session::SessionManager;
use crate::domain::repository::SessionRepository;
use crate::domain::value_object::{Email, SessionToken};
use crate::error::AuthResult;

/// Sign out use case
pub struct SignOutUseCase<S>
where
    S: SessionRepository,
{
    sessions: SessionManager<S>,
}

impl<S> SignOutUseCase<S>
where
    S: SessionRepository,
{
    pub fn new(sessions: SessionManager<S>) -> Self {
        Self { sessions }
    }

    /// Sign out from current session
    pub async fn execute(&self, token: &SessionToken) -> AuthResult<()> {
        self.sessions.destroy(token).await?;

        tracing::info!("User signed out");
        Ok(())
    }

    /// Sign out from every session of the account
    pub async fn execute_all(&self, email: &Email) -> AuthResult<u64> {
        self.sessions.destroy_all_for(email).await
    }
}
