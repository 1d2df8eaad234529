//! Application Configuration
//!
//! Configuration for the Auth application layer. One `AuthConfig` is built at
//! startup, validated, and shared as `Arc<AuthConfig>` by every component;
//! nothing reads ambient global state.

use std::time::Duration;

use platform::mail::MailTransport;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No {0} provided")]
    Missing(&'static str),

    #[error("Invalid {option}: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },
}

/// How account identifiers are assigned at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierMode {
    /// A UUIDv4 is generated and the store picks the document key
    #[default]
    AutoAssigned,
    /// The caller supplies the identifier, which also keys the document
    Explicit,
}

/// Password reset mail settings
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub transport: MailTransport,
    pub reset_subject: String,
}

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session cookie name
    pub session_cookie_name: String,
    /// Cookie carrying one-shot messages for redirect targets
    pub flash_cookie_name: String,
    /// Where to send a client after sign-in
    pub sign_in_redirect: String,
    /// Where to send a client without a session
    pub log_out_redirect: String,
    /// Where to send a client lacking the required role (no Referer)
    pub no_rights_redirect: String,
    /// Session lifetime
    pub session_ttl: Duration,
    /// Collection holding accounts
    pub users_collection: String,
    /// Collection holding sessions
    pub sessions_collection: String,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Minimum length of newly chosen passwords
    pub password_min_length: usize,
    pub identifier_mode: IdentifierMode,
    /// Roles allowed on member routes
    pub member_roles: Vec<String>,
    /// Roles allowed on admin routes
    pub admin_roles: Vec<String>,
    /// Required for reset mail delivery
    pub mail: Option<MailSettings>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: "session".to_string(),
            flash_cookie_name: "flash".to_string(),
            sign_in_redirect: "/".to_string(),
            log_out_redirect: "/login".to_string(),
            no_rights_redirect: "/".to_string(),
            session_ttl: Duration::from_secs(24 * 3600), // 1 day
            users_collection: "users".to_string(),
            sessions_collection: "sessions".to_string(),
            cookie_secure: true,
            password_pepper: None,
            password_min_length: 8,
            identifier_mode: IdentifierMode::AutoAssigned,
            member_roles: vec!["user".to_string(), "admin".to_string()],
            admin_roles: vec!["admin".to_string()],
            mail: None,
        }
    }
}

impl AuthConfig {
    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Default::default()
        }
    }

    /// Fail fast on unusable settings, naming the offending option
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.session_cookie_name, "name for session cookie"),
            (&self.flash_cookie_name, "name for flash cookie"),
            (&self.sign_in_redirect, "sign-in redirect route"),
            (&self.log_out_redirect, "log-out redirect route"),
            (&self.no_rights_redirect, "no-rights redirect route"),
            (&self.users_collection, "users collection name"),
            (&self.sessions_collection, "sessions collection name"),
        ];
        for (value, what) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(what));
            }
        }

        for (name, option) in [
            (&self.session_cookie_name, "session cookie name"),
            (&self.flash_cookie_name, "flash cookie name"),
        ] {
            if !is_cookie_token(name) {
                return Err(ConfigError::Invalid {
                    option,
                    reason: format!("'{name}' is not a valid cookie name"),
                });
            }
        }

        if self.session_ttl.as_secs() == 0 {
            return Err(ConfigError::Invalid {
                option: "session lifetime",
                reason: "must be at least one second".to_string(),
            });
        }

        if self.users_collection == self.sessions_collection {
            return Err(ConfigError::Invalid {
                option: "sessions collection name",
                reason: "must differ from the users collection".to_string(),
            });
        }

        if self.password_min_length == 0 {
            return Err(ConfigError::Invalid {
                option: "password minimum length",
                reason: "must be positive".to_string(),
            });
        }

        if self.member_roles.is_empty() {
            return Err(ConfigError::Missing("member roles"));
        }
        if self.admin_roles.is_empty() {
            return Err(ConfigError::Missing("admin roles"));
        }

        if let Some(mail) = &self.mail {
            if mail.transport.host.trim().is_empty() {
                return Err(ConfigError::Missing("mail host"));
            }
            if mail.transport.from.trim().is_empty() {
                return Err(ConfigError::Missing("mail sender address"));
            }
            if mail.transport.port == 0 {
                return Err(ConfigError::Invalid {
                    option: "mail port",
                    reason: "must be positive".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get session TTL in milliseconds
    pub fn session_ttl_ms(&self) -> i64 {
        self.session_ttl.as_millis() as i64
    }
}

/// RFC 6265 cookie-name characters
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            c.is_ascii_graphic()
                && !matches!(
                    c,
                    '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '['
                        | ']' | '?' | '=' | '{' | '}'
                )
        })
}
