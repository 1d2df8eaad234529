//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};

/// Generate a random string over `[A-Za-z0-9]`
///
/// Every character is drawn from the operating system CSPRNG, so the result
/// is suitable as an unguessable bearer token.
pub fn random_alphanumeric(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Encode bytes as unpadded URL-safe base64 (cookie-safe)
pub fn to_base64_url(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode unpadded URL-safe base64
pub fn from_base64_url(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::URL_SAFE_NO_PAD.decode(s)
}
