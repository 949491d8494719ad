//! Domain Layer - Core watchlist types and business rules.
//!
//! This layer contains the core domain types for the watchlist with no
//! I/O. Everything here is plain Rust with serialization support.

/// Symbol catalog records and the embedded fallback dataset.
pub mod catalog;

/// Identity tokens issued by the login endpoint.
pub mod identity;

/// Live quotes and the latest-wins quote board.
pub mod quote;

/// Feed generations used to discard callbacks from stale instances.
pub mod streaming;

/// The user's subscribed-symbol set.
pub mod subscription;
