//! Identity Tokens
//!
//! Tokens issued by the login endpoint. The realtime feeds are scoped by a
//! single opaque identity token: the `utip` token when the server issued
//! one, the `acs` token otherwise.

/// Tokens for one authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthTokens {
    /// Account service token.
    pub acs_token: String,
    /// Expiry of the account service token, verbatim.
    pub acs_token_expire: String,
    /// Trading platform token, when issued.
    pub utip_token: Option<String>,
}

impl AuthTokens {
    /// The token that scopes realtime connections.
    #[must_use]
    pub fn identity_token(&self) -> &str {
        self.utip_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .unwrap_or(&self.acs_token)
    }
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("acs_token", &"[REDACTED]")
            .field("acs_token_expire", &self.acs_token_expire)
            .field("utip_token", &self.utip_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
