//! Value Object Module

pub mod app_data;
pub mod email;
pub mod role;
pub mod session_token;
pub mod user_id;
pub mod user_password;

pub use app_data::AppData;
pub use email::Email;
pub use role::Role;
pub use session_token::SessionToken;
pub use user_id::UserId;
pub use user_password::{RawPassword, UserPassword};
