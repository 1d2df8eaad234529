//! Entity Module

pub mod account;
pub mod session;

pub use account::{Account, AccountChanges, AccountRef};
pub use session::Session;
