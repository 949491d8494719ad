#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Watchlist Sync - Realtime Symbol and Quote Synchronization
//!
//! The client-side core of a quote watchlist. It keeps a symbol catalog and
//! a user's subscription set in step with an identity token, streams quotes
//! for the subscribed symbols, and persists what it learns in a durable
//! key-value cache so the next start paints instantly.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and rules
//!   - `catalog`: Symbol records and the fallback dataset
//!   - `subscription`: Ordered subscription set and set-equality key
//!   - `quote`: Quotes and the latest-wins quote board
//!   - `identity`: Login tokens
//!   - `streaming`: Feed generations (epochs)
//!
//! - **Application**: Feeds, services and ports
//!   - `ports`: Realtime channel, key-value storage, login
//!   - `feeds`: Catalog feed and quote stream tasks
//!   - `services`: Session, coordinator, quote subscriber, watchlist loop
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `realtime`: WebSocket and in-memory transports
//!   - `storage`: JSON file and in-memory stores
//!   - `auth`: HTTP login client
//!   - `config`: Environment configuration
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! IdentitySession ──token──► SubscriptionCoordinator ──catalog──► DurableCache
//!                                   │      ▲
//!                      subscriptions│      │CatalogFeedEvent
//!                                   ▼      │
//!                             QuoteSubscriber ◄──QuoteStreamEvent── QuoteStream
//!                                   │
//!                                   ▼
//!                               QuoteBoard
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Feeds, services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::catalog::{Symbol, SymbolRecord, fallback_symbols};
pub use domain::identity::AuthTokens;
pub use domain::quote::{Quote, QuoteBoard};
pub use domain::streaming::{Epoch, EpochCounter};
pub use domain::subscription::{SubscriptionSet, SymbolSetKey};

// Ports
pub use application::ports::{
    AuthError, Authenticator, ChannelEvent, ChannelState, DurableCache, KeyValueStore,
    RealtimeChannel, StorageError, Transport,
};

// Feeds
pub use application::feeds::{
    CatalogFeed, CatalogFeedConfig, CatalogFeedError, CatalogFeedEvent, CatalogSource,
    FeedHandle, QuoteStream, QuoteStreamConfig, QuoteStreamEvent, ReconnectConfig,
    ReconnectError,
};

// Services
pub use application::services::{
    CoordinatorSettings, IdentitySession, QuoteSubscriber, StreamChange, SubscriptionCoordinator,
    TokenTransition, WatchlistService,
};

// Infrastructure
pub use infrastructure::auth::HttpAuthenticator;
pub use infrastructure::config::{ClientConfig, ConfigError, WebSocketSettings};
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::realtime::{InMemoryTransport, MemoryPeer, WebSocketTransport};
pub use infrastructure::storage::{FileStore, MemoryStore};
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
