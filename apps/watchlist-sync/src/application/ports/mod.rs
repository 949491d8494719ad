//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Transport`: Drives one realtime socket behind a [`RealtimeChannel`]
//! - `KeyValueStore`: Persistent local storage behind the [`DurableCache`]
//! - `Authenticator`: The opaque external login endpoint

mod auth;
mod channel;
mod storage;

pub use auth::{AuthError, Authenticator, LoginCredentials, LoginResponse};
pub use channel::{ChannelEvent, ChannelLink, ChannelState, RealtimeChannel, Transport};
pub use storage::{DurableCache, KeyValueStore, StorageError, keys};
