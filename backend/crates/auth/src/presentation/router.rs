//! Auth Router
//!
//! Public routes, member routes guarded by `member_roles` and admin routes
//! guarded by `admin_roles`.

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
};
use platform::mail::MailSender;

use crate::application::config::AuthConfig;
use crate::domain::repository::{AccountRepository, SessionRepository};
use crate::infra::{DocumentRepository, PgDocumentStore};
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{AccessGuard, require_roles};

/// Create the Auth router over the PostgreSQL document store
pub fn auth_router<M>(store: PgDocumentStore, mailer: M, config: AuthConfig) -> Router
where
    M: MailSender + Send + Sync + 'static,
{
    let repo = DocumentRepository::new(store, std::sync::Arc::new(config.clone()));
    auth_router_generic(repo, mailer, config)
}

/// Create a generic Auth router for any repository implementation
pub fn auth_router_generic<R, M>(repo: R, mailer: M, config: AuthConfig) -> Router
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    auth_router_with_state(AuthAppState::new(repo, mailer, config))
}

/// Create the Auth router from prepared state
pub fn auth_router_with_state<R, M>(state: AuthAppState<R, M>) -> Router
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    let member_guard = AccessGuard::new(
        state.sessions(),
        state.config.clone(),
        state.config.member_roles.iter().cloned(),
    );
    let admin_guard = AccessGuard::new(
        state.sessions(),
        state.config.clone(),
        state.config.admin_roles.iter().cloned(),
    );

    let member = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(middleware::from_fn(move |req: Request, next: Next| {
            require_roles(member_guard.clone(), req, next)
        }));

    let admin = Router::new()
        .route("/admin/approve", post(handlers::approve::<R, M>))
        .route("/admin/password/reset", post(handlers::reset_password::<R, M>))
        .route("/admin/sessions/sweep", post(handlers::sweep_sessions::<R, M>))
        .route_layer(middleware::from_fn(move |req: Request, next: Next| {
            require_roles(admin_guard.clone(), req, next)
        }));

    Router::new()
        .route("/signup", post(handlers::sign_up::<R, M>))
        .route("/signin", post(handlers::sign_in::<R, M>))
        .route("/signout", post(handlers::sign_out::<R, M>))
        .route("/status", get(handlers::session_status::<R, M>))
        .route("/password/change", post(handlers::change_password::<R, M>))
        .merge(member)
        .merge(admin)
        .with_state(state)
}
