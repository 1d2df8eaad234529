//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

mod config;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use auth::application::SessionManager;
use auth::{DocumentRepository, PgDocumentStore, auth_router};
use axum::{
    Router, http,
    http::{Method, header},
};
use platform::mail::{LogMailSender, SmtpMailSender};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

type PgRepository = DocumentRepository<PgDocumentStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_config = ServerConfig::from_env()?;
    let auth_config = server_config.auth.clone();

    // Database connection
    let database_url =
        env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let store = PgDocumentStore::new(pool.clone());
    store
        .ensure_unique_field(&auth_config.users_collection, "email")
        .await?;

    let sessions = SessionManager::new(
        Arc::new(DocumentRepository::new(
            store.clone(),
            Arc::new(auth_config.clone()),
        )),
        Arc::new(auth_config.clone()),
    );

    // Startup cleanup: remove expired sessions
    // Errors here should not prevent server startup
    sweep_sessions(&sessions).await;
    tokio::spawn(sweep_periodically(sessions, server_config.sweep_interval));

    let mail_endpoint = auth_config.mail.as_ref().map(|mail| mail.transport.endpoint());
    let auth_routes = match mail_endpoint {
        Some(endpoint) => {
            tracing::info!(%endpoint, "Password reset mail goes over SMTP");
            auth_router(store, SmtpMailSender, auth_config)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, password reset mail is disabled");
            auth_router(store, LogMailSender, auth_config)
        }
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api/auth", auth_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 31113));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn sweep_sessions(sessions: &SessionManager<PgRepository>) {
    match sessions.sweep_expired().await {
        Ok(deleted) => {
            tracing::info!(sessions_deleted = deleted, "Auth session cleanup completed");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Auth session cleanup failed, continuing anyway");
        }
    }
}

async fn sweep_periodically(sessions: SessionManager<PgRepository>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // the first tick fires immediately and startup already swept
    interval.tick().await;

    loop {
        interval.tick().await;
        sweep_sessions(&sessions).await;
    }
}
