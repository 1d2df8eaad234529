//! Account Use Cases
//!
//! Lookup, registration and administrative edits of accounts.

use std::sync::Arc;

use crate::application::config::{AuthConfig, IdentifierMode};
use crate::application::hasher::PasswordHasher;
use crate::domain::entity::{Account, AccountChanges, AccountRef};
use crate::domain::repository::AccountRepository;
use crate::domain::value_object::{AppData, Email, RawPassword, Role, UserId};
use crate::error::{AuthError, AuthResult};

/// Registration input
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    /// Required in explicit identifier mode, ignored otherwise
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub data: AppData,
    pub ip: Option<String>,
}

/// Registration output
#[derive(Debug, Clone)]
pub struct RegisterOutput {
    pub key: String,
    pub user_id: UserId,
}

/// Account manager
pub struct AccountManager<A>
where
    A: AccountRepository,
{
    account_repo: Arc<A>,
    config: Arc<AuthConfig>,
    hasher: PasswordHasher,
}

impl<A> AccountManager<A>
where
    A: AccountRepository,
{
    pub fn new(account_repo: Arc<A>, config: Arc<AuthConfig>) -> Self {
        Self {
            hasher: PasswordHasher::new(config.clone()),
            account_repo,
            config,
        }
    }

    /// The single account stored under `email`
    pub async fn find_by_email(&self, email: &str) -> AuthResult<AccountRef> {
        let email = Email::new(email)?;
        let mut matches = self.account_repo.find_by_email(&email).await?;

        match matches.len() {
            0 => {
                tracing::debug!(email = %email, "No account for email");
                Err(AuthError::NoSuchUser)
            }
            1 => matches.pop().ok_or(AuthError::NoSuchUser),
            count => {
                tracing::error!(email = %email, count, "Duplicate accounts for email");
                Err(AuthError::DuplicateUser { count })
            }
        }
    }

    /// Create an unapproved account; does not sign in
    pub async fn register(&self, input: RegisterInput) -> AuthResult<RegisterOutput> {
        let email = Email::new(input.email)?;
        email.validate_format()?;

        let password = RawPassword::new(input.password)?;
        password.check_policy(self.config.password_min_length)?;

        let user_id = match self.config.identifier_mode {
            IdentifierMode::Explicit => UserId::new(input.user_id.unwrap_or_default())?,
            IdentifierMode::AutoAssigned => UserId::generate(),
        };

        match self.find_by_email(email.as_str()).await {
            Ok(_) => return Err(AuthError::AlreadyExists),
            Err(AuthError::NoSuchUser) => {}
            Err(e) => return Err(e),
        }

        let account = Account {
            email,
            password: self.hasher.hash(password).await?,
            user_id,
            role: input
                .role
                .map(Role::new)
                .filter(|r| !r.is_empty())
                .unwrap_or_default(),
            approved: false,
            first_name: input.first_name,
            last_name: input.last_name,
            data: input.data,
            ip: input.ip,
        };

        // the store re-checks uniqueness atomically, closing the lookup race
        let key = match self.config.identifier_mode {
            IdentifierMode::Explicit => self.account_repo.insert_with_id(&account).await?,
            IdentifierMode::AutoAssigned => self.account_repo.insert(&account).await?,
        };

        tracing::info!(email = %account.email, user_id = %account.user_id, "Account registered");

        Ok(RegisterOutput {
            key,
            user_id: account.user_id,
        })
    }

    /// Merge the non-empty fields of `changes` into the stored account
    pub async fn edit(&self, email: &str, changes: AccountChanges) -> AuthResult<()> {
        let changes = changes.normalized();
        let found = self.find_by_email(email).await?;

        if changes.is_empty() {
            return Ok(());
        }

        self.account_repo.merge(&found.key, &changes).await?;
        tracing::info!(email = %found.account.email, "Account edited");
        Ok(())
    }

    /// Approve or revoke an account
    pub async fn set_approval(&self, email: &str, approved: bool) -> AuthResult<()> {
        let found = self.find_by_email(email).await?;
        self.account_repo.set_approval(&found.key, approved).await?;

        tracing::info!(email = %found.account.email, approved, "Account approval changed");
        Ok(())
    }
}
