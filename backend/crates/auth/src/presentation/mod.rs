//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::{AuthAppState, ClientIp};
pub use middleware::{AccessDecision, AccessGuard, CurrentSession, require_roles};
pub use router::{auth_router, auth_router_generic, auth_router_with_state};
