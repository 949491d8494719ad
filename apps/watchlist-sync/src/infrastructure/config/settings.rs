//! Client Configuration Settings
//!
//! Configuration types for the watchlist client, loaded from environment
//! variables. Unset or unparsable numeric values fall back to defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::application::feeds::{
    CATALOG_TIMEOUT, CatalogFeedConfig, QuoteStreamConfig, ReconnectConfig,
};
use crate::application::feeds::catalog::DEFAULT_CATALOG_URL;
use crate::application::feeds::quotes::DEFAULT_QUOTES_URL;
use crate::application::services::{CoordinatorSettings, DEFAULT_SUBSCRIPTION_COUNT};
use crate::infrastructure::auth::DEFAULT_API_URL;

/// Default location of the durable cache file.
pub const DEFAULT_CACHE_PATH: &str = ".watchlist/cache.json";

/// Account credentials for unattended login.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(email: String, password: String) -> Self {
        Self { email, password }
    }

    /// Account email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Remote endpoints.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// HTTP API base (login).
    pub api_url: String,
    /// Catalog WebSocket base; the token is appended.
    pub catalog_url: String,
    /// Quote WebSocket URL.
    pub quotes_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            quotes_url: DEFAULT_QUOTES_URL.to_string(),
        }
    }
}

/// WebSocket reconnection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote endpoints.
    pub endpoints: Endpoints,
    /// Durable cache file.
    pub cache_path: PathBuf,
    /// Bounded wait for the catalog.
    pub catalog_timeout: Duration,
    /// Symbols subscribed by default on a fresh cache.
    pub default_subscriptions: usize,
    /// Quote stream reconnection.
    pub websocket: WebSocketSettings,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
    /// Credentials for unattended login, if configured.
    pub credentials: Option<Credentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            catalog_timeout: CATALOG_TIMEOUT,
            default_subscriptions: DEFAULT_SUBSCRIPTION_COUNT,
            websocket: WebSocketSettings::default(),
            metrics_port: 0,
            credentials: None,
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint is set but empty, or if only one of
    /// email and password is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Env(lookup);

        let endpoints = Endpoints {
            api_url: env.url("WATCHLIST_API_URL", defaults.endpoints.api_url)?,
            catalog_url: env.url("WATCHLIST_CATALOG_URL", defaults.endpoints.catalog_url)?,
            quotes_url: env.url("WATCHLIST_QUOTES_URL", defaults.endpoints.quotes_url)?,
        };

        let websocket = WebSocketSettings {
            reconnect_delay_initial: env.duration_millis(
                "WATCHLIST_RECONNECT_DELAY_INITIAL_MS",
                defaults.websocket.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.duration_secs(
                "WATCHLIST_RECONNECT_DELAY_MAX_SECS",
                defaults.websocket.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parse(
                "WATCHLIST_RECONNECT_DELAY_MULTIPLIER",
                defaults.websocket.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: env.parse(
                "WATCHLIST_MAX_RECONNECT_ATTEMPTS",
                defaults.websocket.max_reconnect_attempts,
            ),
        };

        let email = env.non_empty("WATCHLIST_EMAIL");
        let password = env.non_empty("WATCHLIST_PASSWORD");
        let credentials = match (email, password) {
            (Some(email), Some(password)) => Some(Credentials::new(email, password)),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteCredentials),
        };

        Ok(Self {
            endpoints,
            cache_path: env
                .non_empty("WATCHLIST_CACHE_PATH")
                .map_or(defaults.cache_path, PathBuf::from),
            catalog_timeout: env
                .duration_secs("WATCHLIST_CATALOG_TIMEOUT_SECS", defaults.catalog_timeout),
            default_subscriptions: env.parse(
                "WATCHLIST_DEFAULT_SUBSCRIPTIONS",
                defaults.default_subscriptions,
            ),
            websocket,
            metrics_port: env.parse("WATCHLIST_METRICS_PORT", defaults.metrics_port),
            credentials,
        })
    }

    /// Settings for the subscription coordinator.
    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            catalog: CatalogFeedConfig {
                url_base: self.endpoints.catalog_url.clone(),
                timeout: self.catalog_timeout,
            },
            default_subscription_count: self.default_subscriptions,
        }
    }

    /// Settings for the quote stream.
    #[must_use]
    pub fn quote_stream_config(&self) -> QuoteStreamConfig {
        QuoteStreamConfig {
            url: self.endpoints.quotes_url.clone(),
            reconnect: ReconnectConfig::from_websocket_settings(&self.websocket),
        }
    }
}

/// Configuration error.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Only one of email and password is set.
    #[error("WATCHLIST_EMAIL and WATCHLIST_PASSWORD must be set together")]
    IncompleteCredentials,
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn non_empty(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn url(&self, key: &str, default: String) -> Result<String, ConfigError> {
        match (self.0)(key) {
            Some(v) if v.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
            Some(v) => Ok(v.trim().to_string()),
            None => Ok(default),
        }
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        (self.0)(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        (self.0)(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        (self.0)(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
