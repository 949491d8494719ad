//! Configuration Module
//!
//! Environment-driven configuration for the watchlist client.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, Credentials, DEFAULT_CACHE_PATH, Endpoints, WebSocketSettings,
};
