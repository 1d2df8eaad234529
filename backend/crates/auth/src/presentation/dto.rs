//! API DTOs (Data Transfer Objects)

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Sign Up
// ============================================================================

/// Sign up request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Only read in explicit identifier mode
    pub user_id: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub data: Value,
}

/// Sign up response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub user_id: String,
    pub approved: bool,
}

// ============================================================================
// Sign In
// ============================================================================

/// Sign in request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Sign in response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub email: String,
    pub role: String,
    pub data: Value,
    /// Where the client should go next
    pub redirect_to: String,
}

// ============================================================================
// Session Status
// ============================================================================

/// Session status response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub authenticated: bool,
    pub email: Option<String>,
    pub role: Option<String>,
    pub expires_at_ms: Option<i64>,
    /// Message left by the last access-control redirect
    pub flash: Option<String>,
}

/// Current session snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub data: Value,
    pub ip: Option<String>,
    pub expires_at_ms: i64,
}

// ============================================================================
// Password
// ============================================================================

/// Password change request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub old_password: String,
    pub new_password: String,
}

/// Administrative password reset request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    /// Greeting placed above the temporary password in the mail
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Administration
// ============================================================================

/// Approve or revoke an account
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub email: String,
    #[serde(default = "default_true")]
    pub approved: bool,
}

fn default_true() -> bool {
    true
}

/// Sweep result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResponse {
    pub sessions_deleted: u64,
}
