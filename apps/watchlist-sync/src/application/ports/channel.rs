//! Realtime Channel
//!
//! One bidirectional JSON message channel. The caller holds a
//! [`RealtimeChannel`] and reads [`ChannelEvent`]s from a receiver; a
//! [`Transport`] adapter holds the matching [`ChannelLink`] and drives the
//! actual socket.
//!
//! # Contract
//!
//! - `send` is a no-op unless the channel is open. Nothing is queued.
//! - `close` is idempotent. After an owner-initiated close no further events
//!   are delivered.
//! - Inbound frames are parsed as JSON in [`ChannelLink::deliver_text`].
//!   Frames that fail to parse are logged and dropped.
//! - [`ChannelEvent::Opened`] is the first point at which `send` succeeds.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::metrics;

// =============================================================================
// Events and State
// =============================================================================

/// Events delivered to the channel owner, in transport order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The connection is open; requests may be sent.
    Opened,
    /// A JSON frame arrived.
    Message(serde_json::Value),
    /// The transport reported an error.
    Error(String),
    /// The remote end closed or the connection was lost.
    Closed,
}

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    /// Connection in progress.
    Connecting = 0,
    /// Connection established.
    Open = 1,
    /// Connection closed by either side.
    Closed = 2,
}

impl ChannelState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    const fn new() -> Self {
        Self(AtomicU8::new(ChannelState::Connecting as u8))
    }

    fn get(&self) -> ChannelState {
        ChannelState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn open(&self) -> bool {
        self.0
            .compare_exchange(
                ChannelState::Connecting as u8,
                ChannelState::Open as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Returns the previous state.
    fn close(&self) -> ChannelState {
        ChannelState::from_u8(self.0.swap(ChannelState::Closed as u8, Ordering::SeqCst))
    }
}

// =============================================================================
// Transport Port
// =============================================================================

/// Drives one socket for a channel.
///
/// Implementations take ownership of the link, connect to `link.url()`,
/// and report progress through the link's methods. They must stop promptly
/// once `link.cancel_token()` is cancelled, and call
/// [`ChannelLink::closed`] when the connection ends for any other reason.
pub trait Transport: Send + Sync + 'static {
    /// Start driving `link`. Must not block.
    fn open(&self, link: ChannelLink);
}

// =============================================================================
// Channel Handle
// =============================================================================

/// Caller-side handle of one realtime connection.
#[derive(Debug)]
pub struct RealtimeChannel {
    url: String,
    state: Arc<StateCell>,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl RealtimeChannel {
    /// Establish one connection through `transport`.
    ///
    /// Cancelling `cancel` has the same effect as [`RealtimeChannel::close`].
    pub fn connect(
        transport: &dyn Transport,
        url: impl Into<String>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let url = url.into();
        let state = Arc::new(StateCell::new());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let link = ChannelLink {
            url: url.clone(),
            state: Arc::clone(&state),
            events: events_tx,
            outbound: outbound_rx,
            cancel: cancel.clone(),
        };

        tracing::debug!(url = %redact_url(&url), "Opening realtime channel");
        transport.open(link);

        let channel = Self {
            url,
            state,
            outbound: outbound_tx,
            cancel,
        };
        (channel, events_rx)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        if self.cancel.is_cancelled() {
            return ChannelState::Closed;
        }
        self.state.get()
    }

    /// True once the transport reported the connection open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Serialize `payload` and hand it to the transport.
    ///
    /// Returns false (and sends nothing) unless the channel is open.
    pub fn send<T: Serialize>(&self, payload: &T) -> bool {
        if !self.is_open() {
            tracing::trace!(state = ?self.state(), "Dropping send on channel that is not open");
            return false;
        }

        match serde_json::to_string(payload) {
            Ok(text) => self.outbound.send(text).is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize outbound frame");
                false
            }
        }
    }

    /// Close the connection. Safe to call any number of times.
    pub fn close(&self) {
        let previous = self.state.close();
        if previous == ChannelState::Open {
            metrics::adjust_open_channels(-1.0);
        }
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            tracing::debug!(
                url = %redact_url(&self.url),
                previous = ?previous,
                "Realtime channel closed"
            );
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// Transport Side
// =============================================================================

/// Transport-side end of a channel.
#[derive(Debug)]
pub struct ChannelLink {
    url: String,
    state: Arc<StateCell>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

impl ChannelLink {
    /// Endpoint to connect to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Token cancelled when the owner closes the channel.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True once the owner closed the channel.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next frame the owner wants sent. `None` once the owner is gone.
    pub async fn next_outbound(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Next queued outbound frame, without waiting.
    pub fn try_next_outbound(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Report the connection as established.
    pub fn opened(&self) {
        if self.is_cancelled() {
            return;
        }
        if self.state.open() {
            metrics::adjust_open_channels(1.0);
            self.emit(ChannelEvent::Opened);
        }
    }

    /// Parse an inbound text frame and deliver it.
    pub fn deliver_text(&self, text: &str) {
        if self.is_cancelled() {
            return;
        }
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => self.emit(ChannelEvent::Message(value)),
            Err(e) => {
                metrics::record_malformed_frame();
                tracing::warn!(
                    error = %e,
                    frame = %truncate(text, 120),
                    "Dropping malformed frame"
                );
            }
        }
    }

    /// Report a transport error.
    pub fn failed(&self, reason: impl Into<String>) {
        if self.is_cancelled() {
            return;
        }
        self.emit(ChannelEvent::Error(reason.into()));
    }

    /// Report the connection as finished. Only the first call has an effect.
    pub fn closed(&self) {
        let previous = self.state.close();
        if previous == ChannelState::Open {
            metrics::adjust_open_channels(-1.0);
        }
        if previous == ChannelState::Closed || self.is_cancelled() {
            return;
        }
        self.emit(ChannelEvent::Closed);
    }

    fn emit(&self, event: ChannelEvent) {
        // The owner may already be gone; nothing to deliver to.
        let _ = self.events.send(event);
    }
}

/// Strip the path and query from `url` for logging; catalog URLs embed the
/// identity token.
pub(crate) fn redact_url(url: &str) -> &str {
    let after_scheme = url.find("://").map_or(0, |i| i + 3);
    url[after_scheme..]
        .find('/')
        .map_or(url, |i| &url[..after_scheme + i])
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}
