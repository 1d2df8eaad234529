//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations with no domain knowledge:
//! - Opaque token generation from the OS CSPRNG
//! - Password hashing (Argon2id)
//! - Cookie building and parsing
//! - Client IP extraction
//! - Wall clock abstraction
//! - Outbound mail capability

pub mod client;
pub mod clock;
pub mod cookie;
pub mod crypto;
pub mod mail;
pub mod password;
