//! HTTP Handlers

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, Extension, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use platform::client::extract_client_ip;
use platform::clock::{Clock, SystemClock};
use platform::cookie::extract_cookie;
use platform::mail::MailSender;

use crate::application::config::AuthConfig;
use crate::application::{
    AccountManager, ChangePasswordUseCase, RegisterInput, ResetPasswordUseCase, SessionManager,
    SignInInput, SignInUseCase, SignOutUseCase,
};
use crate::domain::repository::{AccountRepository, SessionRepository};
use crate::domain::value_object::{AppData, SessionToken};
use crate::error::AuthResult;
use crate::presentation::dto::{
    ApproveRequest, ChangePasswordRequest, MeResponse, ResetPasswordRequest,
    SessionStatusResponse, SignInRequest, SignInResponse, SignUpRequest, SignUpResponse,
    SweepResponse,
};
use crate::presentation::middleware::{CurrentSession, flash_removal, read_flash};

/// Shared state for auth handlers
pub struct AuthAppState<R, M>
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub mailer: Arc<M>,
    pub config: Arc<AuthConfig>,
    pub clock: Arc<dyn Clock>,
}

impl<R, M> Clone for AuthAppState<R, M>
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            mailer: self.mailer.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<R, M> AuthAppState<R, M>
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    pub fn new(repo: R, mailer: M, config: AuthConfig) -> Self {
        Self {
            repo: Arc::new(repo),
            mailer: Arc::new(mailer),
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sessions(&self) -> SessionManager<R> {
        SessionManager::new(self.repo.clone(), self.config.clone()).with_clock(self.clock.clone())
    }

    fn accounts(&self) -> AccountManager<R> {
        AccountManager::new(self.repo.clone(), self.config.clone())
    }
}

/// Client IP: first `X-Forwarded-For` hop, else the peer address
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let direct = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(Self(extract_client_ip(&parts.headers, direct)))
    }
}

impl ClientIp {
    fn into_string(self) -> Option<String> {
        self.0.map(|ip| ip.to_string())
    }
}

// ============================================================================
// Sign Up
// ============================================================================

/// POST /signup
pub async fn sign_up<R, M>(
    State(state): State<AuthAppState<R, M>>,
    client_ip: ClientIp,
    Json(req): Json<SignUpRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    let input = RegisterInput {
        email: req.email,
        password: req.password,
        user_id: req.user_id,
        role: None,
        first_name: req.first_name,
        last_name: req.last_name,
        data: AppData::new(req.data),
        ip: client_ip.into_string(),
    };

    let output = state.accounts().register(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user_id: output.user_id.to_string(),
            approved: false,
        }),
    ))
}

// ============================================================================
// Sign In
// ============================================================================

/// POST /signin
pub async fn sign_in<R, M>(
    State(state): State<AuthAppState<R, M>>,
    client_ip: ClientIp,
    Json(req): Json<SignInRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    let use_case = SignInUseCase::new(state.repo.clone(), state.sessions(), state.config.clone());

    let output = use_case
        .execute(SignInInput {
            email: req.email,
            password: req.password,
            ip: client_ip.into_string(),
        })
        .await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, output.cookie.to_header_value())],
        Json(SignInResponse {
            email: output.email.to_string(),
            role: output.role.to_string(),
            data: output.data.into_value(),
            redirect_to: state.config.sign_in_redirect.clone(),
        }),
    ))
}

// ============================================================================
// Sign Out
// ============================================================================

/// POST /signout
pub async fn sign_out<R, M>(
    State(state): State<AuthAppState<R, M>>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    let sessions = state.sessions();

    if let Some(token) = session_token(&headers, &state.config) {
        // the cookie is cleared regardless
        if let Err(e) = SignOutUseCase::new(sessions.clone()).execute(&token).await {
            tracing::warn!(error = %e, "Session delete failed during sign-out");
        }
    }

    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, sessions.removal_cookie().to_header_value())],
    )
}

// ============================================================================
// Session Status
// ============================================================================

/// GET /status
pub async fn session_status<R, M>(
    State(state): State<AuthAppState<R, M>>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    let session = match session_token(&headers, &state.config) {
        Some(token) => state.sessions().fetch(&token).await.ok(),
        None => None,
    };
    let flash = read_flash(&headers, &state.config);
    let had_flash = flash.is_some();

    let body = match session {
        Some(session) => SessionStatusResponse {
            authenticated: true,
            email: Some(session.email.to_string()),
            role: Some(session.role.to_string()),
            expires_at_ms: Some(session.expires_at_ms),
            flash,
        },
        None => SessionStatusResponse {
            authenticated: false,
            email: None,
            role: None,
            expires_at_ms: None,
            flash,
        },
    };

    let mut response = Json(body).into_response();
    if had_flash {
        response.headers_mut().append(
            header::SET_COOKIE,
            flash_removal(&state.config).to_header_value(),
        );
    }
    response
}

// ============================================================================
// Password Change
// ============================================================================

/// POST /password/change
pub async fn change_password<R, M>(
    State(state): State<AuthAppState<R, M>>,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<StatusCode>
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    ChangePasswordUseCase::new(state.repo.clone(), state.config.clone())
        .execute(&req.email, req.old_password, req.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Member Routes (guarded)
// ============================================================================

/// GET /me
pub async fn me(Extension(CurrentSession(session)): Extension<CurrentSession>) -> Json<MeResponse> {
    Json(MeResponse {
        email: session.email.to_string(),
        first_name: session.first_name,
        last_name: session.last_name,
        role: session.role.to_string(),
        data: session.data.into_value(),
        ip: session.ip,
        expires_at_ms: session.expires_at_ms,
    })
}

// ============================================================================
// Admin Routes (guarded)
// ============================================================================

/// POST /admin/approve
pub async fn approve<R, M>(
    State(state): State<AuthAppState<R, M>>,
    Extension(CurrentSession(admin)): Extension<CurrentSession>,
    Json(req): Json<ApproveRequest>,
) -> AuthResult<StatusCode>
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    state.accounts().set_approval(&req.email, req.approved).await?;

    tracing::info!(admin = %admin.email, email = %req.email, approved = req.approved, "Approval set by admin");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/password/reset
pub async fn reset_password<R, M>(
    State(state): State<AuthAppState<R, M>>,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<StatusCode>
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    ResetPasswordUseCase::new(state.repo.clone(), state.mailer.clone(), state.config.clone())
        .reset_and_notify(&req.email, &req.message)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/sessions/sweep
pub async fn sweep_sessions<R, M>(
    State(state): State<AuthAppState<R, M>>,
) -> AuthResult<Json<SweepResponse>>
where
    R: AccountRepository + SessionRepository + Send + Sync + 'static,
    M: MailSender + Send + Sync + 'static,
{
    let sessions_deleted = state.sessions().sweep_expired().await?;
    Ok(Json(SweepResponse { sessions_deleted }))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn session_token(headers: &HeaderMap, config: &AuthConfig) -> Option<SessionToken> {
    extract_cookie(headers, &config.session_cookie_name).and_then(SessionToken::from_client)
}
