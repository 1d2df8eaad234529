//! Email Value Object
//!
//! Emails are account keys and compared exactly as stored (case-sensitive).
//! Format is only checked when an account is registered; lookups accept any
//! non-empty string so that legacy records stay reachable.

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Maximum email length (per RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

/// Email address value object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Wrap a non-empty email
    pub fn new(email: impl Into<String>) -> AuthResult<Self> {
        let email = email.into();
        if email.is_empty() {
            return Err(AuthError::NoEmailProvided);
        }
        Ok(Self(email))
    }

    /// Basic format check applied to newly registered accounts
    pub fn validate_format(&self) -> AuthResult<()> {
        if self.0.len() > EMAIL_MAX_LENGTH || !Self::is_valid_format(&self.0) {
            return Err(AuthError::InvalidEmail);
        }
        Ok(())
    }

    fn is_valid_format(email: &str) -> bool {
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };

        if local.is_empty() || local.len() > 64 || domain.contains('@') {
            return false;
        }
        if domain.is_empty() || !domain.contains('.') {
            return false;
        }
        if !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return false;
        }

        !(domain.starts_with('.')
            || domain.ends_with('.')
            || domain.starts_with('-')
            || domain.ends_with('-'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
