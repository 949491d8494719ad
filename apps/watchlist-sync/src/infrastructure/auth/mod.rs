//! HTTP Login Adapter
//!
//! Implements the [`Authenticator`] port against `POST <api>/v3/login`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::application::ports::{AuthError, Authenticator, LoginCredentials, LoginResponse};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://dev-virt-point.utip.work";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
    wt: bool,
}

/// reqwest-backed login client.
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    client: reqwest::Client,
    login_url: String,
}

impl HttpAuthenticator {
    /// Create a client for the API at `api_base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_base: &str) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            login_url: login_url(api_base),
        })
    }

    /// Full login endpoint URL.
    #[must_use]
    pub fn login_url(&self) -> &str {
        &self.login_url
    }
}

fn login_url(api_base: &str) -> String {
    format!("{}/v3/login", api_base.trim_end_matches('/'))
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginResponse, AuthError> {
        let body = LoginBody {
            email: &credentials.email,
            password: &credentials.password,
            wt: true,
        };

        let response = self
            .client
            .post(&self.login_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        // Refusals can arrive with an error status and a decodable body.
        match serde_json::from_str::<LoginResponse>(&text) {
            Ok(decoded) => Ok(decoded),
            Err(_) if !status.is_success() => {
                Err(AuthError::Transport(format!("HTTP {}", status.as_u16())))
            }
            Err(e) => Err(AuthError::InvalidResponse(e.to_string())),
        }
    }
}
