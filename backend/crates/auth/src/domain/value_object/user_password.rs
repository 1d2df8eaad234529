//! User Password Value Object
//!
//! Domain wrappers around `platform::password`. Only emptiness is checked on
//! construction: sign-in attempts and generated reset passwords are never
//! policy-checked, while newly chosen passwords go through
//! [`RawPassword::check_policy`].

use platform::password::{ClearTextPassword, HashedPassword, PasswordPolicyError};
use std::fmt;

use crate::error::{AuthError, AuthResult, StoreError};

// ============================================================================
// Raw Password (User Input)
// ============================================================================

/// Raw password from user input, zeroized on drop
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    pub fn new(raw: String) -> AuthResult<Self> {
        ClearTextPassword::new(raw)
            .map(Self)
            .map_err(|_| AuthError::NoPasswordProvided)
    }

    /// Random password over `[A-Za-z0-9]`
    pub fn generate(len: usize) -> Self {
        Self(ClearTextPassword::generate(len))
    }

    /// Length and pattern rules for a password the user is choosing
    pub fn check_policy(&self, min_length: usize) -> AuthResult<()> {
        self.0.check_policy(min_length).map_err(|e| match e {
            PasswordPolicyError::Empty => AuthError::NoPasswordProvided,
            other => AuthError::PasswordPolicy(other.to_string()),
        })
    }

    /// Plain text, for out-of-band delivery of generated passwords
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    pub(crate) fn inner(&self) -> &ClearTextPassword {
        &self.0
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

// ============================================================================
// User Password (Hashed)
// ============================================================================

/// Stored password hash (Argon2id, PHC string)
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword(HashedPassword);

impl UserPassword {
    /// Hash a raw password
    ///
    /// Blocking; the application layer runs it on the blocking pool.
    pub fn from_raw(raw: &RawPassword, pepper: Option<&[u8]>) -> AuthResult<Self> {
        raw.inner()
            .hash(pepper)
            .map(Self)
            .map_err(|e| AuthError::HashingFailed(e.to_string()))
    }

    /// Restore from a stored document
    pub fn from_phc_string(s: impl Into<String>) -> AuthResult<Self> {
        HashedPassword::from_phc_string(s)
            .map(Self)
            .map_err(|_| StoreError::Malformed("password is not a PHC hash".to_string()).into())
    }

    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }

    /// `Ok(false)` on mismatch
    pub fn verify(&self, raw: &RawPassword, pepper: Option<&[u8]>) -> AuthResult<bool> {
        self.0
            .verify(raw.inner(), pepper)
            .map_err(|e| AuthError::HashingFailed(e.to_string()))
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
