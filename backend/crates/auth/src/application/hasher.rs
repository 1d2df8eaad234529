//! Password Hashing Service
//!
//! Argon2id is deliberately slow, so hashing and verification run on the
//! blocking thread pool instead of the request's async worker.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::value_object::{RawPassword, UserPassword};
use crate::error::{AuthError, AuthResult};

#[derive(Clone)]
pub struct PasswordHasher {
    config: Arc<AuthConfig>,
}

impl PasswordHasher {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        Self { config }
    }

    pub async fn hash(&self, raw: RawPassword) -> AuthResult<UserPassword> {
        let pepper = self.config.password_pepper.clone();

        tokio::task::spawn_blocking(move || UserPassword::from_raw(&raw, pepper.as_deref()))
            .await
            .map_err(|e| AuthError::HashingFailed(e.to_string()))?
    }

    /// `Ok(false)` on mismatch
    pub async fn verify(&self, hash: UserPassword, raw: RawPassword) -> AuthResult<bool> {
        let pepper = self.config.password_pepper.clone();

        tokio::task::spawn_blocking(move || hash.verify(&raw, pepper.as_deref()))
            .await
            .map_err(|e| AuthError::HashingFailed(e.to_string()))?
    }
}
