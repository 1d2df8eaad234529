//! Session Token Value Object
//!
//! Opaque bearer token, used as the session document key and cookie value.

use std::fmt;

use platform::crypto::random_alphanumeric;

/// Token length in characters over `[A-Za-z0-9]` (~268 bits)
pub const SESSION_TOKEN_LENGTH: usize = 45;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Fresh token from the OS CSPRNG
    pub fn generate() -> Self {
        Self(random_alphanumeric(SESSION_TOKEN_LENGTH))
    }

    /// Token presented by a client (cookie value); not validated beyond
    /// being non-empty, the store lookup decides
    pub fn from_client(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate() {
        let token = SessionToken::generate();
        assert_eq!(token.as_str().len(), SESSION_TOKEN_LENGTH);
        assert!(token.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, SessionToken::generate());
    }

    #[test]
    fn test_from_client() {
        assert!(SessionToken::from_client("").is_none());
        assert_eq!(SessionToken::from_client("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_debug_redaction() {
        let token = SessionToken::generate();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
