//! Durable Key-Value Cache
//!
//! [`KeyValueStore`] is the raw persistence port (string keys, string
//! values). [`DurableCache`] layers typed JSON get/set on top of it with the
//! semantics of browser local storage: failures are logged and read as
//! "absent", never raised to the caller.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Keys written by this crate.
pub mod keys {
    /// Cached symbol catalog.
    pub const SYMBOLS: &str = "symbols-list";
    /// Persisted subscription set.
    pub const SUBSCRIPTIONS: &str = "subscribed-symbols";
    /// Account service token.
    pub const ACS_TOKEN: &str = "acsToken";
    /// Account service token expiry.
    pub const ACS_TOKEN_EXPIRE: &str = "acsTokenExpire";
    /// Trading platform token.
    pub const UTIP_TOKEN: &str = "utipToken";
}

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be encoded or decoded.
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Raw persistent key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion cannot be persisted.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed JSON cache over a [`KeyValueStore`].
#[derive(Clone)]
pub struct DurableCache {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for DurableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableCache").finish_non_exhaustive()
    }
}

impl DurableCache {
    /// Wrap `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Decode the JSON value under `key`. Missing or unreadable → `None`.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_string(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring undecodable cache entry");
                None
            }
        }
    }

    /// Encode `value` as JSON and store it under `key`.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_string(key, &raw),
            Err(e) => tracing::warn!(key, error = %e, "Failed to encode cache entry"),
        }
    }

    /// Read the raw string under `key`.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    /// Store a raw string under `key`.
    pub fn set_string(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!(key, error = %e, "Failed to write cache entry");
        }
    }

    /// Delete `key`.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key, error = %e, "Failed to remove cache entry");
        }
    }

    /// True if a value is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get_string(key).is_some()
    }
}
