//! Environment Configuration
//!
//! Builds the auth configuration from `AUTH_*` and `SMTP_*` variables.
//! Unset variables keep the defaults of [`AuthConfig`].

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use auth::config::{AuthConfig, IdentifierMode, MailSettings};
use platform::mail::MailTransport;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_RESET_SUBJECT: &str = "Your password has been reset";

/// Settings for the api binary
pub struct ServerConfig {
    pub auth: AuthConfig,
    pub sweep_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let auth = auth_config_from_env()?;
        auth.validate().context("Invalid auth configuration")?;

        let sweep_secs = parsed("AUTH_SWEEP_INTERVAL_SECS")?.unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        if sweep_secs == 0 {
            return Err(anyhow!("AUTH_SWEEP_INTERVAL_SECS must be positive"));
        }

        Ok(Self {
            auth,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}

fn auth_config_from_env() -> Result<AuthConfig> {
    let mut config = if cfg!(debug_assertions) {
        AuthConfig::development()
    } else {
        AuthConfig::default()
    };

    if let Some(v) = var("AUTH_SESSION_COOKIE") {
        config.session_cookie_name = v;
    }
    if let Some(v) = var("AUTH_FLASH_COOKIE") {
        config.flash_cookie_name = v;
    }
    if let Some(v) = var("AUTH_SIGN_IN_REDIRECT") {
        config.sign_in_redirect = v;
    }
    if let Some(v) = var("AUTH_LOG_OUT_REDIRECT") {
        config.log_out_redirect = v;
    }
    if let Some(v) = var("AUTH_NO_RIGHTS_REDIRECT") {
        config.no_rights_redirect = v;
    }
    if let Some(secs) = parsed::<u64>("AUTH_SESSION_TTL_SECS")? {
        config.session_ttl = Duration::from_secs(secs);
    }
    if let Some(v) = var("AUTH_USERS_COLLECTION") {
        config.users_collection = v;
    }
    if let Some(v) = var("AUTH_SESSIONS_COLLECTION") {
        config.sessions_collection = v;
    }
    if let Some(secure) = parsed::<bool>("AUTH_COOKIE_SECURE")? {
        config.cookie_secure = secure;
    }
    if let Some(v) = var("AUTH_PASSWORD_PEPPER") {
        config.password_pepper = Some(v.into_bytes());
    }
    if let Some(len) = parsed::<usize>("AUTH_PASSWORD_MIN_LENGTH")? {
        config.password_min_length = len;
    }
    if let Some(v) = var("AUTH_IDENTIFIER_MODE") {
        config.identifier_mode = match v.to_ascii_lowercase().as_str() {
            "auto" => IdentifierMode::AutoAssigned,
            "explicit" => IdentifierMode::Explicit,
            other => return Err(anyhow!("AUTH_IDENTIFIER_MODE: unknown mode '{other}'")),
        };
    }
    if let Some(v) = var("AUTH_MEMBER_ROLES") {
        config.member_roles = role_list(&v);
    }
    if let Some(v) = var("AUTH_ADMIN_ROLES") {
        config.admin_roles = role_list(&v);
    }

    config.mail = mail_settings_from_env()?;
    Ok(config)
}

/// Mail is optional; setting `SMTP_HOST` turns it on
fn mail_settings_from_env() -> Result<Option<MailSettings>> {
    let Some(host) = var("SMTP_HOST") else {
        return Ok(None);
    };

    let transport = MailTransport {
        from: var("SMTP_FROM").context("SMTP_FROM must be set when SMTP_HOST is")?,
        username: var("SMTP_USERNAME").unwrap_or_default(),
        password: var("SMTP_PASSWORD").unwrap_or_default(),
        host,
        port: parsed("SMTP_PORT")?.unwrap_or(587),
    };

    Ok(Some(MailSettings {
        transport,
        reset_subject: var("AUTH_RESET_SUBJECT")
            .unwrap_or_else(|| DEFAULT_RESET_SUBJECT.to_string()),
    }))
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| anyhow!("{name}: cannot parse '{v}': {e}"))
        })
        .transpose()
}

fn role_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}
