//! Application Layer
//!
//! Use cases and application services.

pub mod account;
pub mod config;
pub mod hasher;
pub mod password;
pub mod session;
pub mod sign_in;
pub mod sign_out;

// Re-exports
pub use account::{AccountManager, RegisterInput, RegisterOutput};
pub use config::{AuthConfig, ConfigError, IdentifierMode, MailSettings};
pub use hasher::PasswordHasher;
pub use password::{ChangePasswordUseCase, RESET_PASSWORD_LENGTH, ResetPasswordUseCase};
pub use session::SessionManager;
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_out::SignOutUseCase;
