//! Login Port
//!
//! The credential exchange is an opaque external endpoint: credentials go in,
//! a result code and tokens come out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::identity::AuthTokens;

/// Result code the login endpoint returns on success.
pub const LOGIN_OK: &str = "OK";

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The endpoint refused the credentials.
    #[error("authentication failed: {0}")]
    Rejected(String),

    /// The endpoint could not be reached.
    #[error("login request failed: {0}")]
    Transport(String),

    /// The endpoint answered with something we could not decode.
    #[error("invalid login response: {0}")]
    InvalidResponse(String),
}

/// Email/password pair.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl LoginCredentials {
    /// Create new credentials.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Login endpoint response.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// `OK` on success, an error code otherwise.
    #[serde(default)]
    pub result: String,
    /// Account service token.
    #[serde(default)]
    pub acs_token: Option<String>,
    /// Account service token expiry.
    #[serde(default)]
    pub acs_token_expire: Option<String>,
    /// Trading platform token.
    #[serde(default)]
    pub utip_token: Option<String>,
    /// Web terminal token (unused).
    #[serde(default)]
    pub wo_token: Option<String>,
    /// Account id.
    #[serde(default)]
    pub acs_user_id: Option<i64>,
}

impl LoginResponse {
    /// Extract session tokens from a successful response.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] unless the result is `OK` and an
    /// account token is present.
    pub fn into_tokens(self) -> Result<AuthTokens, AuthError> {
        let acs_token = self.acs_token.filter(|token| !token.is_empty());
        match (self.result.as_str(), acs_token) {
            (LOGIN_OK, Some(acs_token)) => Ok(AuthTokens {
                acs_token,
                acs_token_expire: self.acs_token_expire.unwrap_or_default(),
                utip_token: self.utip_token.filter(|token| !token.is_empty()),
            }),
            ("", _) => Err(AuthError::Rejected("Authentication failed".to_string())),
            (result, _) => Err(AuthError::Rejected(result.to_string())),
        }
    }
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("result", &self.result)
            .field("acs_user_id", &self.acs_user_id)
            .finish_non_exhaustive()
    }
}

/// The external login endpoint.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange credentials for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be reached or its response
    /// cannot be decoded. A refused login is reported through the response's
    /// `result` field.
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, AuthError>;
}
