//! Key-Value Stores
//!
//! Adapters implementing the [`KeyValueStore`] port.
//!
//! [`KeyValueStore`]: crate::application::ports::KeyValueStore

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;
