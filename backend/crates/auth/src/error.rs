//! Auth Error Types
//!
//! Auth-specific error variants that integrate with the unified
//! `kernel::error::AppError` system. Callers branch on variants (or on
//! [`AuthError::code`]), never on the rendered message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::mail::MailError;
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Message shown for any credential failure, whichever part was wrong
const INVALID_CREDENTIALS: &str = "Invalid credentials";

// ============================================================================
// Store Errors
// ============================================================================

/// Failures reported by a document store
#[derive(Debug, Error)]
pub enum StoreError {
    /// `insert_at` targeted a key that is already taken
    #[error("Document '{key}' already exists in '{collection}'")]
    AlreadyExists { collection: String, key: String },

    /// A unique field constraint rejected the write
    #[error("Unique field '{field}' already taken in '{collection}'")]
    UniqueViolation { collection: String, field: String },

    /// `merge_update` targeted a missing document
    #[error("Document '{key}' not found in '{collection}'")]
    NotFound { collection: String, key: String },

    /// A stored document does not have the expected shape
    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Collection or field name unusable as an identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ============================================================================
// Auth Errors
// ============================================================================

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No email provided")]
    NoEmailProvided,

    #[error("No password provided")]
    NoPasswordProvided,

    #[error("Invalid email format")]
    InvalidEmail,

    /// Newly chosen password rejected by the password policy
    #[error("Password validation failed: {0}")]
    PasswordPolicy(String),

    /// Explicit identifier mode without an identifier
    #[error("No user identifier provided")]
    MissingIdentifier,

    #[error("No such user")]
    NoSuchUser,

    /// More than one account shares an email; the store lost an invariant
    #[error("Found {count} accounts for one email")]
    DuplicateUser { count: usize },

    #[error("Account already exists")]
    AlreadyExists,

    #[error("Account is not approved")]
    NotApproved,

    #[error("Wrong password")]
    WrongPassword,

    #[error("No session")]
    NoSession,

    #[error("Session expired")]
    ExpiredSession,

    #[error("Failed to create session: {0}")]
    SessionCreateFailed(#[source] StoreError),

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Application data could not be decoded into the requested type
    #[error("Failed to decode application data: {0}")]
    DecodeFailed(#[source] serde_json::Error),

    #[error("Mail delivery failed: {0}")]
    Mail(#[from] MailError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Stable kind tag
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::NoEmailProvided => "no_email_provided",
            AuthError::NoPasswordProvided => "no_password_provided",
            AuthError::InvalidEmail => "invalid_email",
            AuthError::PasswordPolicy(_) => "password_policy",
            AuthError::MissingIdentifier => "missing_identifier",
            AuthError::NoSuchUser => "no_such_user",
            AuthError::DuplicateUser { .. } => "duplicate_user",
            AuthError::AlreadyExists => "already_exists",
            AuthError::NotApproved => "not_approved",
            AuthError::WrongPassword => "wrong_password",
            AuthError::NoSession => "no_session",
            AuthError::ExpiredSession => "expired_session",
            AuthError::SessionCreateFailed(_) => "session_create_failed",
            AuthError::HashingFailed(_) => "hashing_failed",
            AuthError::DecodeFailed(_) => "decode_failed",
            AuthError::Mail(_) => "mail_failed",
            AuthError::Store(_) => "store_error",
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::NoEmailProvided
            | AuthError::NoPasswordProvided
            | AuthError::InvalidEmail
            | AuthError::PasswordPolicy(_)
            | AuthError::MissingIdentifier => ErrorKind::BadRequest,
            AuthError::NoSuchUser
            | AuthError::WrongPassword
            | AuthError::NoSession
            | AuthError::ExpiredSession => ErrorKind::Unauthorized,
            AuthError::NotApproved => ErrorKind::Forbidden,
            AuthError::AlreadyExists => ErrorKind::Conflict,
            AuthError::Mail(_) => ErrorKind::BadGateway,
            AuthError::DuplicateUser { .. }
            | AuthError::SessionCreateFailed(_)
            | AuthError::HashingFailed(_)
            | AuthError::DecodeFailed(_)
            | AuthError::Store(_) => ErrorKind::InternalServerError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Whether the store reported the failure (as opposed to a domain rule)
    pub fn is_store_failure(&self) -> bool {
        matches!(self, AuthError::Store(_) | AuthError::SessionCreateFailed(_))
    }

    /// Message safe to show to the client
    fn public_message(&self) -> String {
        match self {
            AuthError::NoSuchUser | AuthError::WrongPassword => INVALID_CREDENTIALS.to_string(),
            e if e.kind().is_server_error() => "Internal server error".to_string(),
            e => e.to_string(),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::DuplicateUser { count } => {
                tracing::error!(count, "Account uniqueness violated");
            }
            AuthError::Store(e) | AuthError::SessionCreateFailed(e) => {
                tracing::error!(error = %e, code = self.code(), "Auth store error");
            }
            AuthError::HashingFailed(_) | AuthError::DecodeFailed(_) => {
                tracing::error!(error = %self, "Auth internal error");
            }
            AuthError::Mail(e) => {
                tracing::error!(error = %e, "Auth mail delivery failed");
            }
            AuthError::WrongPassword => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::NotApproved => {
                tracing::warn!("Login attempt on unapproved account");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.public_message();
        match err {
            // pool exhaustion and friends keep their 503 mapping
            AuthError::Store(StoreError::Database(db)) => AppError::from(db),
            other => AppError::new(other.kind(), message).with_source(other),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}
