//! Realtime Feeds
//!
//! Each feed runs as one spawned tokio task that owns a [`RealtimeChannel`]
//! and only emits events. All state lives with the receiver of those events.
//!
//! [`RealtimeChannel`]: crate::application::ports::RealtimeChannel

pub mod catalog;
pub mod messages;
pub mod quotes;
pub mod reconnect;

use tokio_util::sync::CancellationToken;

pub use catalog::{
    CATALOG_TIMEOUT, CatalogFeed, CatalogFeedConfig, CatalogFeedError, CatalogFeedEvent,
    CatalogSource,
};
pub use quotes::{QuoteStream, QuoteStreamConfig, QuoteStreamEvent};
pub use reconnect::{Backoff, ReconnectConfig, ReconnectError, ReconnectPolicy};

/// Disposer for a running feed.
///
/// Disposing cancels the feed task, which closes its channel and stops its
/// timers. Safe to call any number of times; dropping the handle disposes it.
#[derive(Debug)]
pub struct FeedHandle {
    cancel: CancellationToken,
}

impl FeedHandle {
    pub(crate) const fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// A handle for a feed that never started.
    #[must_use]
    pub fn noop() -> Self {
        let cancel = CancellationToken::new();
        cancel.cancel();
        Self { cancel }
    }

    /// Stop the feed.
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    /// True once [`FeedHandle::dispose`] ran.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}
