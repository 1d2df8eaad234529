//! User Identifier
//!
//! Stable account identifier. Either supplied by the caller (explicit mode,
//! where it also becomes the document key) or generated as a UUIDv4.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Caller-supplied identifier
    pub fn new(id: impl Into<String>) -> AuthResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AuthError::MissingIdentifier);
        }
        Ok(Self(id))
    }

    /// Fresh random identifier (UUIDv4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Rebuild from a stored document, which may predate identifiers
    pub fn from_stored(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
