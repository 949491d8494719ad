//! Symbol Catalog Feed
//!
//! Fetches the symbol list for one identity token over a token-scoped
//! channel. The request goes out once the channel opens, and the feed waits
//! a bounded time for the answer. When the answer does not come (timeout,
//! channel error, early close) the feed emits the static fallback catalog
//! followed by an error, in that order, and stops. Once a live catalog has
//! arrived those failure paths are muted and later catalog frames are
//! forwarded as refreshes.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::FeedHandle;
use super::messages::{CatalogRequest, InboundFrame};
use crate::application::ports::{ChannelEvent, RealtimeChannel, Transport};
use crate::domain::catalog::{SymbolRecord, fallback_symbols};
use crate::domain::streaming::Epoch;
use crate::infrastructure::metrics::{self, FeedKind};

/// How long to wait for the catalog before falling back.
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Default catalog endpoint base; the token is appended as a path segment.
pub const DEFAULT_CATALOG_URL: &str = "wss://dev-virt-point.utip.work/session";

/// Catalog feed settings.
#[derive(Debug, Clone)]
pub struct CatalogFeedConfig {
    /// Endpoint base; the token is appended as a path segment.
    pub url_base: String,
    /// Bounded wait for the first catalog frame.
    pub timeout: Duration,
}

impl Default for CatalogFeedConfig {
    fn default() -> Self {
        Self {
            url_base: DEFAULT_CATALOG_URL.to_string(),
            timeout: CATALOG_TIMEOUT,
        }
    }
}

impl CatalogFeedConfig {
    /// Token-scoped endpoint.
    #[must_use]
    pub fn endpoint(&self, token: &str) -> String {
        format!("{}/{token}?fragment=1", self.url_base.trim_end_matches('/'))
    }
}

/// Where an emitted catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    /// Received from the server.
    Live,
    /// The static fallback dataset.
    Fallback,
}

/// Why the feed fell back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogFeedError {
    /// No catalog frame within the bounded wait.
    #[error("Symbols not received within timeout. Using fallback data.")]
    Timeout,

    /// The channel reported an error before the catalog arrived.
    #[error("Symbol connection error: {0}. Using fallback data.")]
    Connection(String),

    /// The channel closed before the catalog arrived.
    #[error("Could not fetch symbols. Using fallback data.")]
    Closed,
}

impl CatalogFeedError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection(_) => "connection",
            Self::Closed => "closed",
        }
    }
}

/// Events emitted by a catalog feed, tagged with its epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogFeedEvent {
    /// A complete catalog.
    Symbols {
        /// Feed generation.
        epoch: Epoch,
        /// Records in server order.
        symbols: Vec<SymbolRecord>,
        /// Live or fallback.
        source: CatalogSource,
    },
    /// The feed failed; always preceded by a fallback catalog.
    Error {
        /// Feed generation.
        epoch: Epoch,
        /// Failure cause.
        error: CatalogFeedError,
    },
}

impl CatalogFeedEvent {
    /// Generation of the feed that produced this event.
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        match self {
            Self::Symbols { epoch, .. } | Self::Error { epoch, .. } => *epoch,
        }
    }
}

/// Token-scoped catalog feed.
#[derive(Debug)]
pub struct CatalogFeed;

impl CatalogFeed {
    /// Start a feed for `token`.
    ///
    /// Spawns the feed task on the current tokio runtime. The bounded wait
    /// starts now, not when the channel opens.
    pub fn start(
        transport: &dyn Transport,
        config: &CatalogFeedConfig,
        token: &str,
        epoch: Epoch,
        events: mpsc::UnboundedSender<CatalogFeedEvent>,
    ) -> FeedHandle {
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + config.timeout;
        let (channel, channel_events) =
            RealtimeChannel::connect(transport, config.endpoint(token), cancel.child_token());

        tracing::info!(%epoch, timeout_secs = config.timeout.as_secs(), "Catalog feed started");

        let task = FeedTask {
            epoch,
            channel,
            events,
            received: false,
        };
        tokio::spawn(task.run(channel_events, cancel.clone(), deadline));

        FeedHandle::new(cancel)
    }
}

struct FeedTask {
    epoch: Epoch,
    channel: RealtimeChannel,
    events: mpsc::UnboundedSender<CatalogFeedEvent>,
    received: bool,
}

impl FeedTask {
    async fn run(
        mut self,
        mut channel_events: mpsc::UnboundedReceiver<ChannelEvent>,
        cancel: CancellationToken,
        deadline: Instant,
    ) {
        let timeout = tokio::time::sleep_until(deadline);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::debug!(epoch = %self.epoch, "Catalog feed disposed");
                    break;
                }

                event = channel_events.recv() => {
                    if !self.on_channel_event(event) {
                        break;
                    }
                }

                () = &mut timeout, if !self.received => {
                    tracing::warn!(epoch = %self.epoch, "Catalog not received in time");
                    self.fall_back(CatalogFeedError::Timeout);
                    break;
                }
            }
        }

        self.channel.close();
    }

    /// Returns false once the feed is finished.
    fn on_channel_event(&mut self, event: Option<ChannelEvent>) -> bool {
        match event {
            Some(ChannelEvent::Opened) => {
                metrics::record_channel_opened(FeedKind::Catalog);
                if !self.channel.send(&CatalogRequest::default()) {
                    tracing::warn!(epoch = %self.epoch, "Catalog request not sent");
                }
                true
            }
            Some(ChannelEvent::Message(value)) => {
                match InboundFrame::decode(value) {
                    Ok(InboundFrame::Catalog(symbols)) => {
                        tracing::info!(
                            epoch = %self.epoch,
                            count = symbols.len(),
                            refresh = self.received,
                            "Catalog received"
                        );
                        self.received = true;
                        self.emit(CatalogFeedEvent::Symbols {
                            epoch: self.epoch,
                            symbols,
                            source: CatalogSource::Live,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(epoch = %self.epoch, error = %e, "Ignoring frame"),
                }
                true
            }
            Some(ChannelEvent::Error(reason)) => {
                if self.received {
                    tracing::warn!(epoch = %self.epoch, %reason, "Catalog channel error after catalog");
                    return true;
                }
                self.fall_back(CatalogFeedError::Connection(reason));
                false
            }
            Some(ChannelEvent::Closed) | None => {
                if self.received {
                    tracing::debug!(epoch = %self.epoch, "Catalog channel closed");
                } else {
                    self.fall_back(CatalogFeedError::Closed);
                }
                false
            }
        }
    }

    fn fall_back(&self, error: CatalogFeedError) {
        metrics::record_catalog_fallback(error.reason());
        tracing::warn!(epoch = %self.epoch, reason = error.reason(), "Using fallback catalog");

        self.channel.close();
        self.emit(CatalogFeedEvent::Symbols {
            epoch: self.epoch,
            symbols: fallback_symbols(),
            source: CatalogSource::Fallback,
        });
        self.emit(CatalogFeedEvent::Error {
            epoch: self.epoch,
            error,
        });
    }

    fn emit(&self, event: CatalogFeedEvent) {
        // Receiver gone means the owner shut down.
        let _ = self.events.send(event);
    }
}
