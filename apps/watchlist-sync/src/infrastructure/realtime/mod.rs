//! Realtime Transports
//!
//! Adapters implementing the [`Transport`] port.
//!
//! - `WebSocketTransport`: tokio-tungstenite client used in production
//! - `InMemoryTransport`: scriptable peers for tests and local demos
//!
//! [`Transport`]: crate::application::ports::Transport

mod memory;
mod websocket;

pub use memory::{InMemoryTransport, MemoryPeer};
pub use websocket::WebSocketTransport;
