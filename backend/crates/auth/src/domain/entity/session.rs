//! Session Entity
//!
//! A signed-in browser, keyed by its bearer token.
//!
//! Name, role and data are copied from the account at sign-in and are not
//! kept in sync afterwards: an edited or re-roled account only shows the
//! change in sessions created after the edit.

use chrono::{DateTime, Utc};

use crate::domain::entity::account::Account;
use crate::domain::value_object::{AppData, Email, Role, SessionToken};

/// Session entity
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub email: Email,
    /// Session expiration (Unix timestamp ms)
    pub expires_at_ms: i64,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub data: AppData,
    /// Client IP at sign-in
    pub ip: Option<String>,
}

impl Session {
    /// Snapshot an account into a new session
    pub fn for_account(
        token: SessionToken,
        account: &Account,
        expires_at_ms: i64,
        ip: Option<String>,
    ) -> Self {
        Self {
            token,
            email: account.email.clone(),
            expires_at_ms,
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            role: account.role.clone(),
            data: account.data.clone(),
            ip,
        }
    }

    /// Expired once `now` reaches the expiry instant
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }

    /// Get remaining time until expiration
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        (self.expires_at_ms - now_ms).max(0)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.expires_at_ms).unwrap_or_default()
    }

    /// Whether the session's role is one of `allowed` (order-independent)
    pub fn can_access<I, R>(&self, allowed: I) -> bool
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        allowed
            .into_iter()
            .any(|role| role.as_ref() == self.role.as_str())
    }
}
