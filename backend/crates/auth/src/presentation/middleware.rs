//! Access Control Middleware
//!
//! Guards routes by role. Each request is judged on its own:
//!
//! | outcome           | status | redirect                                   |
//! |-------------------|--------|--------------------------------------------|
//! | no session cookie | 401    | log-out route                              |
//! | session invalid   | 403    | log-out route                              |
//! | role not allowed  | 403    | same-site `Referer`, else no-rights route  |
//!
//! Redirects carry a short flash message cookie for the landing page. An
//! authorized request reaches the handler with [`CurrentSession`] in its
//! extensions.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::cookie::{Cookie, SameSite, extract_cookie};
use platform::crypto::{from_base64_url, to_base64_url};

use crate::application::config::AuthConfig;
use crate::application::session::SessionManager;
use crate::domain::entity::Session;
use crate::domain::repository::SessionRepository;
use crate::domain::value_object::SessionToken;

/// Flash cookie lifetime
const FLASH_MAX_AGE_SECS: i64 = 60;

const MSG_SIGN_IN: &str = "Please sign in to continue";
const MSG_SESSION_INVALID: &str = "Your session is no longer valid, please sign in again";
const MSG_FORBIDDEN: &str = "You do not have access to that page";

/// Validated session, available to guarded handlers
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

/// Outcome of evaluating one request
#[derive(Debug, Clone)]
pub enum AccessDecision {
    Unauthenticated,
    SessionInvalid,
    Forbidden,
    Authorized(Session),
}

/// Role guard for a group of routes
pub struct AccessGuard<R>
where
    R: SessionRepository,
{
    sessions: SessionManager<R>,
    config: Arc<AuthConfig>,
    allowed_roles: Arc<[String]>,
}

impl<R> Clone for AccessGuard<R>
where
    R: SessionRepository,
{
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            config: self.config.clone(),
            allowed_roles: self.allowed_roles.clone(),
        }
    }
}

impl<R> AccessGuard<R>
where
    R: SessionRepository + Send + Sync + 'static,
{
    pub fn new<I, S>(sessions: SessionManager<R>, config: Arc<AuthConfig>, allowed_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sessions,
            config,
            allowed_roles: allowed_roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Evaluate the request's session against the allowed roles
    pub async fn decide(&self, headers: &HeaderMap) -> AccessDecision {
        let Some(token) = extract_cookie(headers, &self.config.session_cookie_name)
            .and_then(SessionToken::from_client)
        else {
            return AccessDecision::Unauthenticated;
        };

        let session = match self.sessions.fetch(&token).await {
            Ok(session) => session,
            Err(e) => {
                if e.is_store_failure() {
                    tracing::error!(error = %e, "Session lookup failed");
                } else {
                    tracing::debug!(code = e.code(), "Session rejected");
                }
                return AccessDecision::SessionInvalid;
            }
        };

        if !self.sessions.can_access(&session, self.allowed_roles.iter()) {
            tracing::warn!(email = %session.email, role = %session.role, "Access denied by role");
            return AccessDecision::Forbidden;
        }

        AccessDecision::Authorized(session)
    }

    /// Redirect response for a refused request
    fn refusal(&self, decision: &AccessDecision, headers: &HeaderMap) -> Response {
        let (status, location, message) = match decision {
            AccessDecision::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                self.config.log_out_redirect.clone(),
                MSG_SIGN_IN,
            ),
            AccessDecision::SessionInvalid => (
                StatusCode::FORBIDDEN,
                self.config.log_out_redirect.clone(),
                MSG_SESSION_INVALID,
            ),
            AccessDecision::Forbidden | AccessDecision::Authorized(_) => (
                StatusCode::FORBIDDEN,
                same_site_referer(headers).unwrap_or_else(|| self.config.no_rights_redirect.clone()),
                MSG_FORBIDDEN,
            ),
        };

        let mut response = status.into_response();
        let response_headers = response.headers_mut();

        if let Ok(location) = HeaderValue::from_str(&location) {
            response_headers.insert(header::LOCATION, location);
        }
        response_headers.append(
            header::SET_COOKIE,
            flash_cookie(&self.config, message).to_header_value(),
        );
        if matches!(decision, AccessDecision::SessionInvalid) {
            response_headers.append(
                header::SET_COOKIE,
                self.sessions.removal_cookie().to_header_value(),
            );
        }

        response
    }
}

/// Middleware that requires a session whose role the guard allows
pub async fn require_roles<R>(
    guard: AccessGuard<R>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response>
where
    R: SessionRepository + Send + Sync + 'static,
{
    match guard.decide(req.headers()).await {
        AccessDecision::Authorized(session) => {
            req.extensions_mut().insert(CurrentSession(session));
            Ok(next.run(req).await)
        }
        refused => Err(guard.refusal(&refused, req.headers())),
    }
}

// ============================================================================
// Flash Messages
// ============================================================================

fn flash_cookie(config: &AuthConfig, message: &str) -> Cookie {
    Cookie::new(
        config.flash_cookie_name.as_str(),
        to_base64_url(message.as_bytes()),
    )
    .http_only(false)
    .secure(config.cookie_secure)
    .same_site(SameSite::Strict)
    .max_age(FLASH_MAX_AGE_SECS)
}

/// Read the flash message left by a redirect, if any
pub fn read_flash(headers: &HeaderMap, config: &AuthConfig) -> Option<String> {
    let raw = extract_cookie(headers, &config.flash_cookie_name)?;
    let bytes = from_base64_url(&raw).ok()?;
    String::from_utf8(bytes).ok()
}

/// Cookie that clears the flash message
pub fn flash_removal(config: &AuthConfig) -> Cookie {
    flash_cookie(config, "").removal()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Path of the `Referer` if it points at this site
fn same_site_referer(headers: &HeaderMap) -> Option<String> {
    let referer = headers.get(header::REFERER)?.to_str().ok()?;
    let uri: Uri = referer.parse().ok()?;

    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    match uri.authority() {
        None if path.starts_with('/') && !path.starts_with("//") => Some(path),
        None => None,
        Some(authority) => {
            let host = headers.get(header::HOST)?.to_str().ok()?;
            (authority.as_str().eq_ignore_ascii_case(host)).then_some(path)
        }
    }
}
