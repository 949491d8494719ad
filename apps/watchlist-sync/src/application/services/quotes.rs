//! Quote Subscriber
//!
//! Keeps one quote stream open for the current subscription set and folds
//! its quotes into a [`QuoteBoard`]. Requests are compared as sets, so
//! reordering the same symbols never reconnects.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::application::feeds::{FeedHandle, QuoteStream, QuoteStreamConfig, QuoteStreamEvent};
use crate::application::ports::Transport;
use crate::domain::catalog::Symbol;
use crate::domain::quote::{Quote, QuoteBoard};
use crate::domain::streaming::{Epoch, EpochCounter};
use crate::domain::subscription::SymbolSetKey;

/// What [`QuoteSubscriber::request`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChange {
    /// Same set as the open stream.
    Unchanged,
    /// A new stream was opened (replacing any previous one).
    Opened,
    /// The stream was closed because the set became empty.
    Closed,
}

struct ActiveStream {
    key: SymbolSetKey,
    epoch: Epoch,
    handle: FeedHandle,
}

/// Owner of the quote stream and the live quote board.
pub struct QuoteSubscriber {
    transport: Arc<dyn Transport>,
    config: QuoteStreamConfig,
    epochs: EpochCounter,
    active: Option<ActiveStream>,
    board: QuoteBoard,
    connected: bool,
    events_tx: mpsc::UnboundedSender<QuoteStreamEvent>,
    events_rx: mpsc::UnboundedReceiver<QuoteStreamEvent>,
}

impl std::fmt::Debug for QuoteSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteSubscriber")
            .field("active", &self.active.as_ref().map(|a| a.key.symbols()))
            .field("quotes", &self.board.len())
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl QuoteSubscriber {
    /// Create a subscriber with no stream.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: QuoteStreamConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            config,
            epochs: EpochCounter::new(),
            active: None,
            board: QuoteBoard::new(),
            connected: false,
            events_tx,
            events_rx,
        }
    }

    /// Make the open stream match `symbols`.
    pub fn request(&mut self, symbols: &[Symbol]) -> StreamChange {
        let key = SymbolSetKey::new(symbols);

        if key.is_empty() {
            if self.active.is_none() {
                return StreamChange::Unchanged;
            }
            self.reset();
            return StreamChange::Closed;
        }

        if self.active.as_ref().is_some_and(|a| a.key == key) {
            return StreamChange::Unchanged;
        }

        self.dispose_active();
        let epoch = self.epochs.advance();
        self.board.retain_symbols(key.symbols());
        self.connected = false;

        let handle = QuoteStream::open(
            Arc::clone(&self.transport),
            &self.config,
            symbols,
            epoch,
            self.events_tx.clone(),
        );
        tracing::debug!(%epoch, symbols = key.symbols().len(), "Quote stream replaced");
        self.active = Some(ActiveStream { key, epoch, handle });
        StreamChange::Opened
    }

    /// Close the stream and forget every quote.
    pub fn reset(&mut self) {
        self.dispose_active();
        self.epochs.advance();
        self.board.clear();
        self.connected = false;
    }

    fn dispose_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.dispose();
        }
    }

    /// Wait for the next stream event.
    pub async fn next_event(&mut self) -> Option<QuoteStreamEvent> {
        self.events_rx.recv().await
    }

    /// Apply one stream event. Returns the quote it carried, if it was
    /// current.
    pub fn apply(&mut self, event: QuoteStreamEvent) -> Option<Quote> {
        if !self.epochs.is_current(event.epoch()) {
            tracing::trace!(epoch = %event.epoch(), "Dropping stale quote event");
            return None;
        }

        match event {
            QuoteStreamEvent::Quote { quote, .. } => {
                self.board.apply(quote.clone());
                Some(quote)
            }
            QuoteStreamEvent::Connected { .. } => {
                self.connected = true;
                None
            }
            QuoteStreamEvent::Reconnecting { .. } | QuoteStreamEvent::Disconnected { .. } => {
                self.connected = false;
                None
            }
            QuoteStreamEvent::Error { message, .. } => {
                tracing::warn!(%message, "Quote stream error");
                None
            }
            QuoteStreamEvent::Stopped { error, .. } => {
                // The task is gone; the next request for this set must dial again.
                tracing::warn!(error = %error, "Quote stream gave up");
                self.active = None;
                self.connected = false;
                None
            }
        }
    }

    /// Apply every event already queued. Returns the quotes applied.
    pub fn drain_pending(&mut self) -> Vec<Quote> {
        let mut quotes = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            quotes.extend(self.apply(event));
        }
        quotes
    }

    /// Latest quote per symbol.
    #[must_use]
    pub const fn board(&self) -> &QuoteBoard {
        &self.board
    }

    /// Latest quote for `symbol`.
    #[must_use]
    pub fn quote(&self, symbol: &str) -> Option<&Quote> {
        self.board.get(symbol)
    }

    /// True while the stream is open and subscribed.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Sorted symbols of the open stream.
    #[must_use]
    pub fn streamed_symbols(&self) -> &[Symbol] {
        self.active.as_ref().map_or(&[], |a| a.key.symbols())
    }
}
