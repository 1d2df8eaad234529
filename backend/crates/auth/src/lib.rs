//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository and document store traits
//! - `application/` - Session manager, account manager, use cases
//! - `infra/` - Document stores (PostgreSQL JSONB, in-memory) and repositories
//! - `presentation/` - HTTP handlers, DTOs, router, access-control middleware
//!
//! ## Features
//! - Email + password accounts stored as documents, approved by an admin
//! - Server-side sessions keyed by a random token carried in a cookie
//! - Role-based route guards with redirect and flash message on refusal
//! - Password change and administrative reset with a mailed temporary password
//! - Periodic sweep of expired sessions
//!
//! ## Security Model
//! - Passwords hashed with Argon2id, optionally peppered
//! - Session tokens drawn from the OS CSPRNG
//! - Session cookies are HttpOnly and SameSite=Strict with configurable Secure
//! - Credential failures share one public message

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use error::{AuthError, AuthResult, StoreError};
pub use infra::{DocumentRepository, MemoryDocumentStore, PgDocumentStore};
pub use presentation::router::{auth_router, auth_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod handlers {
    pub use crate::presentation::handlers::*;
}

pub mod router {
    pub use crate::presentation::router::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
