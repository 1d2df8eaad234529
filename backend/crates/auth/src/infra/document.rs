//! Document-Backed Repositories
//!
//! Maps accounts and sessions onto any [`DocumentStore`].
//!
//! Account documents live in the users collection:
//! `{email, password, userID, role, approved, firstName, lastName, data, ip}`.
//! Session documents live in the sessions collection, keyed by token:
//! `{email, expiryDate, firstName, lastName, role, data, ip}` with
//! `expiryDate` in Unix milliseconds.

use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::application::config::AuthConfig;
use crate::domain::entity::{Account, AccountChanges, AccountRef, Session};
use crate::domain::repository::{
    AccountRepository, Document, DocumentStore, Filter, SessionRepository, StoredDocument,
};
use crate::domain::value_object::{AppData, Email, Role, SessionToken, UserId, UserPassword};
use crate::error::{AuthError, AuthResult, StoreError};

/// Document field names
pub mod fields {
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const USER_ID: &str = "userID";
    pub const ROLE: &str = "role";
    pub const APPROVED: &str = "approved";
    pub const DATA: &str = "data";
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const IP: &str = "ip";
    pub const EXPIRY_DATE: &str = "expiryDate";
}

/// Account and session repository over a document store
#[derive(Clone)]
pub struct DocumentRepository<D> {
    store: D,
    config: Arc<AuthConfig>,
}

impl<D> DocumentRepository<D>
where
    D: DocumentStore,
{
    pub fn new(store: D, config: Arc<AuthConfig>) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    fn users(&self) -> &str {
        &self.config.users_collection
    }

    fn sessions(&self) -> &str {
        &self.config.sessions_collection
    }
}

// ============================================================================
// Account Repository Implementation
// ============================================================================

impl<D> AccountRepository for DocumentRepository<D>
where
    D: DocumentStore + Sync,
{
    async fn find_by_email(&self, email: &Email) -> AuthResult<Vec<AccountRef>> {
        let docs = self
            .store
            .get_by_field(self.users(), fields::EMAIL, &Value::from(email.as_str()))
            .await?;

        docs.into_iter().map(account_from_document).collect()
    }

    async fn insert(&self, account: &Account) -> AuthResult<String> {
        let body = to_document(&AccountRecord::from(account))?;
        self.store
            .insert(self.users(), body)
            .await
            .map_err(conflict_as_exists)
    }

    async fn insert_with_id(&self, account: &Account) -> AuthResult<String> {
        let key = account.user_id.as_str();
        let body = to_document(&AccountRecord::from(account))?;
        self.store
            .insert_at(self.users(), key, body)
            .await
            .map_err(conflict_as_exists)?;
        Ok(key.to_string())
    }

    async fn update_password(&self, key: &str, password: &UserPassword) -> AuthResult<()> {
        let mut partial = Document::new();
        partial.insert(fields::PASSWORD.into(), password.as_phc_string().into());

        self.store.merge_update(self.users(), key, partial).await?;
        Ok(())
    }

    async fn merge(&self, key: &str, changes: &AccountChanges) -> AuthResult<()> {
        let mut partial = Document::new();
        if let Some(first_name) = &changes.first_name {
            partial.insert(fields::FIRST_NAME.into(), first_name.as_str().into());
        }
        if let Some(last_name) = &changes.last_name {
            partial.insert(fields::LAST_NAME.into(), last_name.as_str().into());
        }
        if let Some(role) = &changes.role {
            partial.insert(fields::ROLE.into(), role.as_str().into());
        }
        if let Some(data) = &changes.data {
            partial.insert(fields::DATA.into(), data.as_value().clone());
        }
        if let Some(ip) = &changes.ip {
            partial.insert(fields::IP.into(), ip.as_str().into());
        }

        self.store
            .merge_update(self.users(), key, partial)
            .await
            .map_err(conflict_as_exists)
    }

    async fn set_approval(&self, key: &str, approved: bool) -> AuthResult<()> {
        let mut partial = Document::new();
        partial.insert(fields::APPROVED.into(), approved.into());

        self.store.merge_update(self.users(), key, partial).await?;
        Ok(())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl<D> SessionRepository for DocumentRepository<D>
where
    D: DocumentStore + Sync,
{
    async fn create(&self, session: &Session) -> AuthResult<()> {
        let body = to_document(&SessionRecord::from(session))?;
        self.store
            .insert_at(self.sessions(), session.token.as_str(), body)
            .await?;
        Ok(())
    }

    async fn find(&self, token: &SessionToken) -> AuthResult<Option<Session>> {
        let Some(doc) = self
            .store
            .get_by_key(self.sessions(), token.as_str())
            .await?
        else {
            return Ok(None);
        };

        let record: SessionRecord = from_document(doc.body)?;
        Ok(Some(record.into_session(token.clone())?))
    }

    async fn delete(&self, token: &SessionToken) -> AuthResult<()> {
        self.store
            .delete_by_key(self.sessions(), token.as_str())
            .await?;
        Ok(())
    }

    async fn find_expired(&self, now_ms: i64) -> AuthResult<Vec<SessionToken>> {
        let docs = self
            .store
            .find_matching(self.sessions(), &Filter::lt(fields::EXPIRY_DATE, now_ms))
            .await?;

        Ok(docs
            .into_iter()
            .filter_map(|doc| SessionToken::from_client(doc.key))
            .collect())
    }

    async fn delete_all_for_email(&self, email: &Email) -> AuthResult<u64> {
        let deleted = self
            .store
            .delete_all_matching(self.sessions(), &Filter::eq(fields::EMAIL, email.as_str()))
            .await?;
        Ok(deleted)
    }
}

// ============================================================================
// Record Types for document mapping
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    email: String,
    password: String,
    #[serde(rename = "userID", default)]
    user_id: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    approved: bool,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ip: Option<String>,
}

impl From<&Account> for AccountRecord {
    fn from(account: &Account) -> Self {
        Self {
            email: account.email.as_str().to_string(),
            password: account.password.as_phc_string().to_string(),
            user_id: account.user_id.as_str().to_string(),
            role: account.role.as_str().to_string(),
            approved: account.approved,
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            data: account.data.as_value().clone(),
            ip: account.ip.clone(),
        }
    }
}

impl AccountRecord {
    fn into_account(self) -> AuthResult<Account> {
        Ok(Account {
            email: Email::new(self.email)
                .map_err(|_| StoreError::Malformed("account without email".to_string()))?,
            password: UserPassword::from_phc_string(self.password)?,
            user_id: UserId::from_stored(self.user_id),
            role: Role::new(self.role),
            approved: self.approved,
            first_name: self.first_name,
            last_name: self.last_name,
            data: AppData::new(self.data),
            ip: self.ip,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    email: String,
    expiry_date: i64,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ip: Option<String>,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            email: session.email.as_str().to_string(),
            expiry_date: session.expires_at_ms,
            first_name: session.first_name.clone(),
            last_name: session.last_name.clone(),
            role: session.role.as_str().to_string(),
            data: session.data.as_value().clone(),
            ip: session.ip.clone(),
        }
    }
}

impl SessionRecord {
    fn into_session(self, token: SessionToken) -> AuthResult<Session> {
        Ok(Session {
            token,
            email: Email::new(self.email)
                .map_err(|_| StoreError::Malformed("session without email".to_string()))?,
            expires_at_ms: self.expiry_date,
            first_name: self.first_name,
            last_name: self.last_name,
            role: Role::new(self.role),
            data: AppData::new(self.data),
            ip: self.ip,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn from_document<T: DeserializeOwned>(body: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(body))?)
}

fn account_from_document(doc: StoredDocument) -> AuthResult<AccountRef> {
    let record: AccountRecord = from_document(doc.body)?;
    Ok(AccountRef {
        key: doc.key,
        account: record.into_account()?,
    })
}

fn conflict_as_exists(err: StoreError) -> AuthError {
    match err {
        StoreError::AlreadyExists { .. } | StoreError::UniqueViolation { .. } => {
            AuthError::AlreadyExists
        }
        other => AuthError::Store(other),
    }
}
