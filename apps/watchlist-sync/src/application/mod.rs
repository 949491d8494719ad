//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the realtime feeds, the services that own watchlist
//! state, and the port interfaces that define how they reach external
//! systems.

/// Port interfaces for external systems (transport, storage, login).
pub mod ports;

/// Catalog feed and quote stream tasks.
pub mod feeds;

/// Stateful services: session, coordinator, quote subscriber, watchlist.
pub mod services;
