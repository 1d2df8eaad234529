//! Application Data
//!
//! Schema-less payload the host application attaches to an account. Sessions
//! carry a copy taken at sign-in. Typed access goes through
//! [`AppData::decode`], which reports shape mismatches as `DecodeFailed`.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppData(Value);

impl AppData {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Encode a typed value
    pub fn encode<T: Serialize>(value: &T) -> AuthResult<Self> {
        serde_json::to_value(value)
            .map(Self)
            .map_err(AuthError::DecodeFailed)
    }

    /// Decode into a typed structure
    pub fn decode<T: DeserializeOwned>(&self) -> AuthResult<T> {
        T::deserialize(&self.0).map_err(AuthError::DecodeFailed)
    }

    /// No payload set
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}
