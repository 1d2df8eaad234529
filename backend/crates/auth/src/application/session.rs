//! Session Manager
//!
//! Issues, validates and removes sessions. A session whose expiry has been
//! reached is purged by the first fetch that sees it, so a fetch returns
//! either a live session or an error, never both.

use std::sync::Arc;
use std::time::Duration;

use platform::clock::{Clock, SystemClock};
use platform::cookie::{Cookie, SameSite};

use crate::application::config::AuthConfig;
use crate::domain::entity::{Account, Session};
use crate::domain::repository::SessionRepository;
use crate::domain::value_object::{Email, SessionToken};
use crate::error::{AuthError, AuthResult};

/// Session manager
pub struct SessionManager<S>
where
    S: SessionRepository,
{
    session_repo: Arc<S>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for SessionManager<S>
where
    S: SessionRepository,
{
    fn clone(&self) -> Self {
        Self {
            session_repo: self.session_repo.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S> SessionManager<S>
where
    S: SessionRepository,
{
    pub fn new(session_repo: Arc<S>, config: Arc<AuthConfig>) -> Self {
        Self {
            session_repo,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Start a session for `account` and return the cookie carrying it
    ///
    /// Role, data and names are copied from the account as of now.
    pub async fn create(
        &self,
        account: &Account,
        cookie_name: &str,
        lifetime: Duration,
        ip: Option<String>,
    ) -> AuthResult<Cookie> {
        let lifetime_ms = i64::try_from(lifetime.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = self.clock.now_ms().saturating_add(lifetime_ms);

        let session = Session::for_account(SessionToken::generate(), account, expires_at_ms, ip);

        self.session_repo
            .create(&session)
            .await
            .map_err(|e| match e {
                AuthError::Store(store) => AuthError::SessionCreateFailed(store),
                other => other,
            })?;

        tracing::debug!(email = %session.email, role = %session.role, "Session created");

        Ok(Cookie::new(cookie_name, session.token.as_str())
            .expires(session.expires_at())
            .http_only(true)
            .secure(self.config.cookie_secure)
            .same_site(SameSite::Strict))
    }

    /// Look up a live session
    ///
    /// `NoSession` if the token is unknown. An expired session is deleted and
    /// reported as `ExpiredSession`; if that delete fails the store error is
    /// returned instead.
    pub async fn fetch(&self, token: &SessionToken) -> AuthResult<Session> {
        let session = self
            .session_repo
            .find(token)
            .await?
            .ok_or(AuthError::NoSession)?;

        if session.is_expired_at(self.clock.now_ms()) {
            self.session_repo.delete(token).await?;
            tracing::debug!(email = %session.email, "Expired session purged on fetch");
            return Err(AuthError::ExpiredSession);
        }

        Ok(session)
    }

    /// Delete a session; unknown tokens are fine
    pub async fn destroy(&self, token: &SessionToken) -> AuthResult<()> {
        self.session_repo.delete(token).await
    }

    /// Sign an account out everywhere
    pub async fn destroy_all_for(&self, email: &Email) -> AuthResult<u64> {
        let deleted = self.session_repo.delete_all_for_email(email).await?;
        tracing::info!(email = %email, sessions_deleted = deleted, "Signed out of all sessions");
        Ok(deleted)
    }

    /// Delete every session whose expiry has passed
    ///
    /// Best effort: stops at the first failed delete and returns its error;
    /// sessions deleted before it stay deleted.
    pub async fn sweep_expired(&self) -> AuthResult<u64> {
        let expired = self.session_repo.find_expired(self.clock.now_ms()).await?;

        let mut deleted = 0;
        for token in &expired {
            self.session_repo.delete(token).await?;
            deleted += 1;
        }

        tracing::info!(sessions_deleted = deleted, "Expired sessions swept");
        Ok(deleted)
    }

    /// Whether the session's role is among `allowed_roles`
    pub fn can_access<I, R>(&self, session: &Session, allowed_roles: I) -> bool
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        session.can_access(allowed_roles)
    }

    /// Cookie that clears the session cookie on the client
    pub fn removal_cookie(&self) -> Cookie {
        Cookie::new(self.config.session_cookie_name.as_str(), "")
            .http_only(true)
            .secure(self.config.cookie_secure)
            .same_site(SameSite::Strict)
            .removal()
    }
}
