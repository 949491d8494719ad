//! Identity Session
//!
//! Holds the login tokens, persists them in the durable cache, and publishes
//! the identity token on a watch channel so the feeds can follow it.

use std::sync::Arc;

use tokio::sync::watch;

use crate::application::ports::{AuthError, Authenticator, DurableCache, LoginCredentials, keys};
use crate::domain::identity::AuthTokens;

/// Logged-in state and identity token publisher.
pub struct IdentitySession {
    cache: DurableCache,
    authenticator: Arc<dyn Authenticator>,
    tokens: Option<AuthTokens>,
    token_tx: watch::Sender<Option<String>>,
}

impl std::fmt::Debug for IdentitySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySession")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl IdentitySession {
    /// Create a logged-out session.
    #[must_use]
    pub fn new(cache: DurableCache, authenticator: Arc<dyn Authenticator>) -> Self {
        let (token_tx, _) = watch::channel(None);
        Self {
            cache,
            authenticator,
            tokens: None,
            token_tx,
        }
    }

    /// Pick up tokens a previous run left in the cache.
    ///
    /// Returns true if a session was restored.
    pub fn restore(&mut self) -> bool {
        let read = |key| self.cache.get_string(key).filter(|v| !v.is_empty());

        let (Some(acs_token), Some(acs_token_expire)) =
            (read(keys::ACS_TOKEN), read(keys::ACS_TOKEN_EXPIRE))
        else {
            tracing::debug!("No cached session");
            return false;
        };
        let utip_token = read(keys::UTIP_TOKEN);

        tracing::info!(expires = %acs_token_expire, "Session restored from cache");
        self.install(AuthTokens {
            acs_token,
            acs_token_expire,
            utip_token,
        });
        true
    }

    /// Exchange credentials for tokens and start the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable, the response cannot
    /// be decoded, or the login is refused. The session is unchanged on
    /// error.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), AuthError> {
        let credentials = LoginCredentials::new(email, password);
        let tokens = self
            .authenticator
            .login(&credentials)
            .await?
            .into_tokens()
            .inspect_err(|e| tracing::warn!(error = %e, "Login refused"))?;

        self.cache.set_string(keys::ACS_TOKEN, &tokens.acs_token);
        self.cache
            .set_string(keys::ACS_TOKEN_EXPIRE, &tokens.acs_token_expire);
        match &tokens.utip_token {
            Some(utip) => self.cache.set_string(keys::UTIP_TOKEN, utip),
            None => self.cache.remove(keys::UTIP_TOKEN),
        }

        tracing::info!(expires = %tokens.acs_token_expire, "Logged in");
        self.install(tokens);
        Ok(())
    }

    /// End the session and drop every cached entry tied to it.
    pub fn logout(&mut self) {
        self.tokens = None;
        for key in [
            keys::ACS_TOKEN,
            keys::ACS_TOKEN_EXPIRE,
            keys::UTIP_TOKEN,
            keys::SYMBOLS,
            keys::SUBSCRIPTIONS,
        ] {
            self.cache.remove(key);
        }
        self.token_tx.send_replace(None);
        tracing::info!("Logged out");
    }

    fn install(&mut self, tokens: AuthTokens) {
        let identity = tokens.identity_token().to_string();
        self.tokens = Some(tokens);
        self.token_tx.send_replace(Some(identity));
    }

    /// Current identity token.
    #[must_use]
    pub fn identity_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(AuthTokens::identity_token)
    }

    /// Current tokens.
    #[must_use]
    pub const fn tokens(&self) -> Option<&AuthTokens> {
        self.tokens.as_ref()
    }

    /// True while logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    /// Follow identity token changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token_tx.subscribe()
    }
}
