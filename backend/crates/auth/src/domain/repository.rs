//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer.
//!
//! [`DocumentStore`] is the low-level, schema-less store capability; the typed
//! [`AccountRepository`] and [`SessionRepository`] are what the application
//! layer talks to.

use serde_json::{Map, Value};

use crate::domain::entity::{Account, AccountChanges, AccountRef, Session};
use crate::domain::value_object::{Email, SessionToken, UserPassword};
use crate::error::{AuthResult, StoreError};

// ============================================================================
// Document Store
// ============================================================================

/// A schema-less document body
pub type Document = Map<String, Value>;

/// A document together with its key
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub body: Document,
}

/// Comparison used by [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    /// Numeric less-than
    Lt,
}

/// Single-field predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lt,
            value: value.into(),
        }
    }

    /// Evaluate against a document body
    pub fn matches(&self, body: &Document) -> bool {
        let Some(actual) = body.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Lt => match (actual.as_f64(), self.value.as_f64()) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
        }
    }
}

/// Document store capability
#[trait_variant::make(DocumentStore: Send)]
pub trait LocalDocumentStore {
    /// All documents whose `field` equals `value`
    async fn get_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    async fn get_by_key(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<StoredDocument>, StoreError>;

    /// Insert under a store-assigned key
    async fn insert(&self, collection: &str, body: Document) -> Result<String, StoreError>;

    /// Insert under `key`; `AlreadyExists` if the key is taken
    async fn insert_at(&self, collection: &str, key: &str, body: Document)
    -> Result<(), StoreError>;

    /// Overwrite only the supplied fields; `NotFound` if the key is missing
    async fn merge_update(
        &self,
        collection: &str,
        key: &str,
        partial: Document,
    ) -> Result<(), StoreError>;

    /// Idempotent: a missing key is not an error
    async fn delete_by_key(&self, collection: &str, key: &str) -> Result<(), StoreError>;

    /// Returns the number of deleted documents
    async fn delete_all_matching(&self, collection: &str, filter: &Filter)
    -> Result<u64, StoreError>;

    async fn find_matching(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, StoreError>;
}

// ============================================================================
// Typed Repositories
// ============================================================================

/// Account repository trait
#[trait_variant::make(AccountRepository: Send)]
pub trait LocalAccountRepository {
    /// Every account stored under `email` (more than one is an integrity
    /// violation the caller reports)
    async fn find_by_email(&self, email: &Email) -> AuthResult<Vec<AccountRef>>;

    /// Insert under a store-assigned key; `AlreadyExists` on duplicate email
    async fn insert(&self, account: &Account) -> AuthResult<String>;

    /// Insert keyed by the account's user id; `AlreadyExists` if taken
    async fn insert_with_id(&self, account: &Account) -> AuthResult<String>;

    /// Replace the password hash only
    async fn update_password(&self, key: &str, password: &UserPassword) -> AuthResult<()>;

    /// Merge the supplied fields only
    async fn merge(&self, key: &str, changes: &AccountChanges) -> AuthResult<()>;

    async fn set_approval(&self, key: &str, approved: bool) -> AuthResult<()>;
}

/// Session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    async fn create(&self, session: &Session) -> AuthResult<()>;

    async fn find(&self, token: &SessionToken) -> AuthResult<Option<Session>>;

    /// Idempotent
    async fn delete(&self, token: &SessionToken) -> AuthResult<()>;

    /// Sessions with `expiryDate < now_ms`
    async fn find_expired(&self, now_ms: i64) -> AuthResult<Vec<SessionToken>>;

    /// Delete every session of an account
    async fn delete_all_for_email(&self, email: &Email) -> AuthResult<u64>;
}
