//! Sign In Use Case
//!
//! Authenticates an account and opens a session. The checks run in a fixed
//! order and the first failure wins:
//! email present, password present, account exists, account approved,
//! password matches.

use std::sync::Arc;

use platform::cookie::Cookie;

use crate::application::account::AccountManager;
use crate::application::config::AuthConfig;
use crate::application::hasher::PasswordHasher;
use crate::application::session::SessionManager;
use crate::domain::repository::{AccountRepository, SessionRepository};
use crate::domain::value_object::{AppData, Email, RawPassword, Role};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    pub email: String,
    pub password: String,
    /// Client IP, copied into the session
    pub ip: Option<String>,
}

/// Sign in output
#[derive(Debug)]
pub struct SignInOutput {
    pub cookie: Cookie,
    pub email: Email,
    pub role: Role,
    pub data: AppData,
}

/// Sign in use case
pub struct SignInUseCase<A, S>
where
    A: AccountRepository,
    S: SessionRepository,
{
    accounts: AccountManager<A>,
    sessions: SessionManager<S>,
    hasher: PasswordHasher,
    config: Arc<AuthConfig>,
}

impl<A, S> SignInUseCase<A, S>
where
    A: AccountRepository,
    S: SessionRepository,
{
    pub fn new(account_repo: Arc<A>, sessions: SessionManager<S>, config: Arc<AuthConfig>) -> Self {
        Self {
            accounts: AccountManager::new(account_repo, config.clone()),
            sessions,
            hasher: PasswordHasher::new(config.clone()),
            config,
        }
    }

    pub async fn execute(&self, input: SignInInput) -> AuthResult<SignInOutput> {
        if input.email.is_empty() {
            return Err(AuthError::NoEmailProvided);
        }
        let password = RawPassword::new(input.password)?;

        let found = self.accounts.find_by_email(&input.email).await?;
        let account = found.account;

        if !account.approved {
            tracing::warn!(email = %account.email, "Sign-in refused, account not approved");
            return Err(AuthError::NotApproved);
        }

        if !self
            .hasher
            .verify(account.password.clone(), password)
            .await?
        {
            tracing::warn!(email = %account.email, "Sign-in refused, wrong password");
            return Err(AuthError::WrongPassword);
        }

        let cookie = self
            .sessions
            .create(
                &account,
                &self.config.session_cookie_name,
                self.config.session_ttl,
                input.ip,
            )
            .await?;

        tracing::info!(email = %account.email, role = %account.role, "User signed in");

        Ok(SignInOutput {
            cookie,
            email: account.email,
            role: account.role,
            data: account.data,
        })
    }
}
