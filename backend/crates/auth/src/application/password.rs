//! Password Lifecycle Use Cases
//!
//! Change (user knows the old password) and reset (administrator issues a
//! temporary one). Both replace only the stored hash.

use std::sync::Arc;

use platform::mail::{MailError, MailMessage, MailSender};

use crate::application::account::AccountManager;
use crate::application::config::{AuthConfig, MailSettings};
use crate::application::hasher::PasswordHasher;
use crate::domain::repository::AccountRepository;
use crate::domain::value_object::{RawPassword, UserPassword};
use crate::error::{AuthError, AuthResult};

/// Length of generated temporary passwords
pub const RESET_PASSWORD_LENGTH: usize = 6;

// ============================================================================
// Change Password
// ============================================================================

pub struct ChangePasswordUseCase<A>
where
    A: AccountRepository,
{
    accounts: AccountManager<A>,
    account_repo: Arc<A>,
    hasher: PasswordHasher,
    config: Arc<AuthConfig>,
}

impl<A> ChangePasswordUseCase<A>
where
    A: AccountRepository,
{
    pub fn new(account_repo: Arc<A>, config: Arc<AuthConfig>) -> Self {
        Self {
            accounts: AccountManager::new(account_repo.clone(), config.clone()),
            account_repo,
            hasher: PasswordHasher::new(config.clone()),
            config,
        }
    }

    /// Replace the password after checking the current one
    pub async fn execute(
        &self,
        email: &str,
        old_password: String,
        new_password: String,
    ) -> AuthResult<()> {
        let found = self.accounts.find_by_email(email).await?;

        let old_password = RawPassword::new(old_password)?;
        if !self
            .hasher
            .verify(found.account.password.clone(), old_password)
            .await?
        {
            tracing::warn!(email = %found.account.email, "Password change refused, wrong password");
            return Err(AuthError::WrongPassword);
        }

        let new_password = RawPassword::new(new_password)?;
        new_password.check_policy(self.config.password_min_length)?;

        let hash = self.hasher.hash(new_password).await?;
        self.account_repo.update_password(&found.key, &hash).await?;

        tracing::info!(email = %found.account.email, "Password changed");
        Ok(())
    }
}

// ============================================================================
// Reset Password
// ============================================================================

pub struct ResetPasswordUseCase<A, M>
where
    A: AccountRepository,
    M: MailSender,
{
    accounts: AccountManager<A>,
    account_repo: Arc<A>,
    mailer: Arc<M>,
    hasher: PasswordHasher,
    config: Arc<AuthConfig>,
}

impl<A, M> ResetPasswordUseCase<A, M>
where
    A: AccountRepository,
    M: MailSender,
{
    pub fn new(account_repo: Arc<A>, mailer: Arc<M>, config: Arc<AuthConfig>) -> Self {
        Self {
            accounts: AccountManager::new(account_repo.clone(), config.clone()),
            account_repo,
            mailer,
            hasher: PasswordHasher::new(config.clone()),
            config,
        }
    }

    /// Store the hash of a fresh temporary password and hand the plain text
    /// back for out-of-band delivery; the plain text is never persisted
    pub async fn reset(&self, email: &str) -> AuthResult<RawPassword> {
        let issued = self.issue(email).await?;
        self.store(&issued).await?;
        Ok(issued.temporary)
    }

    /// Mail a temporary password to `email`
    pub async fn send_reset_mail(
        &self,
        email: &str,
        message: &str,
        password: &RawPassword,
    ) -> AuthResult<()> {
        let settings = self.config.mail.as_ref().ok_or(MailError::NotConfigured)?;
        self.deliver(settings, email, message, password).await
    }

    /// Reset and mail the temporary password.
    ///
    /// The new hash is stored only after the mail went out, so a missing
    /// transport or a delivery failure leaves the old password in place.
    pub async fn reset_and_notify(&self, email: &str, message: &str) -> AuthResult<()> {
        let settings = self.config.mail.as_ref().ok_or(MailError::NotConfigured)?;

        let issued = self.issue(email).await?;
        self.deliver(settings, email, message, &issued.temporary).await?;
        self.store(&issued).await
    }

    async fn issue(&self, email: &str) -> AuthResult<IssuedPassword> {
        let found = self.accounts.find_by_email(email).await?;

        let temporary = RawPassword::generate(RESET_PASSWORD_LENGTH);
        let hash = self
            .hasher
            .hash(RawPassword::new(temporary.expose_secret().to_string())?)
            .await?;

        Ok(IssuedPassword {
            key: found.key,
            email: found.account.email.to_string(),
            temporary,
            hash,
        })
    }

    async fn store(&self, issued: &IssuedPassword) -> AuthResult<()> {
        self.account_repo
            .update_password(&issued.key, &issued.hash)
            .await?;

        tracing::info!(email = %issued.email, "Password reset");
        Ok(())
    }

    async fn deliver(
        &self,
        settings: &MailSettings,
        email: &str,
        message: &str,
        password: &RawPassword,
    ) -> AuthResult<()> {
        let mail = MailMessage::new(
            email,
            settings.reset_subject.as_str(),
            reset_mail_body(message, password.expose_secret()),
        );
        self.mailer.send(&mail, &settings.transport).await?;

        tracing::info!(to = %email, "Password reset mail sent");
        Ok(())
    }
}

/// A generated temporary password with its hash, not yet stored
struct IssuedPassword {
    key: String,
    email: String,
    temporary: RawPassword,
    hash: UserPassword,
}

fn reset_mail_body(message: &str, password: &str) -> String {
    format!(
        "{message}\n\nYour temporary password is: {password}\nPlease change this as soon as you sign in"
    )
}
