//! Account Entity
//!
//! A registered user and their credentials. At most one account exists per
//! email; the document key is the store's business (see [`AccountRef`]).

use crate::domain::value_object::{AppData, Email, Role, UserId, UserPassword};

/// Account entity
#[derive(Debug, Clone)]
pub struct Account {
    pub email: Email,
    pub password: UserPassword,
    pub user_id: UserId,
    pub role: Role,
    /// Sign-in is refused until an administrator approves the account
    pub approved: bool,
    pub first_name: String,
    pub last_name: String,
    pub data: AppData,
    /// IP the account was registered from
    pub ip: Option<String>,
}

/// An account together with the key of the document holding it
#[derive(Debug, Clone)]
pub struct AccountRef {
    pub key: String,
    pub account: Account,
}

/// Field-level edit of an account
///
/// `None` leaves the stored value alone. Empty strings and an empty data
/// payload count as absent, so a form posting blank fields never wipes data.
/// Approval and password have dedicated operations and are not editable here.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub data: Option<AppData>,
    pub ip: Option<String>,
}

impl AccountChanges {
    /// Drop zero-valued fields
    pub fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.filter(|s| !s.is_empty()),
            last_name: self.last_name.filter(|s| !s.is_empty()),
            role: self.role.filter(|r| !r.is_empty()),
            data: self.data.filter(|d| !d.is_empty()),
            ip: self.ip.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.role.is_none()
            && self.data.is_none()
            && self.ip.is_none()
    }
}
