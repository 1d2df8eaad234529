//! Shared Kernel
//!
//! The smallest cross-crate vocabulary: error classification and the
//! unified application error carried to the HTTP edge.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
