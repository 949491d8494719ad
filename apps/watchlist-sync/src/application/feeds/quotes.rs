//! Quote Stream
//!
//! One channel per symbol set. The subscribe request carries the full set
//! and is sent on every open; there is no incremental add/remove. Every quote
//! frame for a requested symbol is forwarded once. Lost connections are
//! retried with [`ReconnectPolicy`] until the stream is disposed or the
//! attempt limit runs out, at which point the stream reports
//! [`QuoteStreamEvent::Stopped`] and its task ends.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::FeedHandle;
use super::messages::{InboundFrame, QuoteSubscribeRequest};
use super::reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
use crate::application::ports::{ChannelEvent, RealtimeChannel, Transport};
use crate::domain::catalog::Symbol;
use crate::domain::quote::Quote;
use crate::domain::streaming::Epoch;
use crate::infrastructure::metrics::{self, FeedKind};

/// Default quote endpoint.
pub const DEFAULT_QUOTES_URL: &str = "wss://dev-virt-point.utip.work/session";

/// Quote stream settings.
#[derive(Debug, Clone)]
pub struct QuoteStreamConfig {
    /// Endpoint URL.
    pub url: String,
    /// Backoff for lost connections.
    pub reconnect: ReconnectConfig,
}

impl Default for QuoteStreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_QUOTES_URL.to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Events emitted by a quote stream, tagged with its epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteStreamEvent {
    /// Channel open and subscribe request sent.
    Connected {
        /// Stream generation.
        epoch: Epoch,
    },
    /// A quote for one of the requested symbols.
    Quote {
        /// Stream generation.
        epoch: Epoch,
        /// The quote.
        quote: Quote,
    },
    /// Waiting before reconnection attempt `attempt`.
    Reconnecting {
        /// Stream generation.
        epoch: Epoch,
        /// 1-based attempt number.
        attempt: u32,
    },
    /// The connection was lost.
    Disconnected {
        /// Stream generation.
        epoch: Epoch,
    },
    /// A transport error. The stream keeps retrying.
    Error {
        /// Stream generation.
        epoch: Epoch,
        /// Description.
        message: String,
    },
    /// Reconnection attempts ran out. No further events follow.
    Stopped {
        /// Stream generation.
        epoch: Epoch,
        /// Why the stream gave up.
        error: ReconnectError,
    },
}

impl QuoteStreamEvent {
    /// Generation of the stream that produced this event.
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        match self {
            Self::Connected { epoch }
            | Self::Quote { epoch, .. }
            | Self::Reconnecting { epoch, .. }
            | Self::Disconnected { epoch }
            | Self::Error { epoch, .. }
            | Self::Stopped { epoch, .. } => *epoch,
        }
    }
}

/// Quote stream for a fixed symbol set.
#[derive(Debug)]
pub struct QuoteStream;

impl QuoteStream {
    /// Open a stream for `symbols`.
    ///
    /// An empty set opens nothing and returns a no-op handle.
    pub fn open(
        transport: Arc<dyn Transport>,
        config: &QuoteStreamConfig,
        symbols: &[Symbol],
        epoch: Epoch,
        events: mpsc::UnboundedSender<QuoteStreamEvent>,
    ) -> FeedHandle {
        if symbols.is_empty() {
            return FeedHandle::noop();
        }

        let cancel = CancellationToken::new();
        tracing::info!(%epoch, symbols = symbols.len(), "Quote stream opening");

        let task = StreamTask {
            transport,
            url: config.url.clone(),
            symbols: symbols.to_vec(),
            wanted: symbols.iter().cloned().collect(),
            policy: ReconnectPolicy::new(config.reconnect.clone()),
            epoch,
            events,
        };
        tokio::spawn(task.run(cancel.clone()));

        FeedHandle::new(cancel)
    }
}

enum Outcome {
    Disposed,
    Lost,
}

struct StreamTask {
    transport: Arc<dyn Transport>,
    url: String,
    symbols: Vec<Symbol>,
    wanted: HashSet<Symbol>,
    policy: ReconnectPolicy,
    epoch: Epoch,
    events: mpsc::UnboundedSender<QuoteStreamEvent>,
}

impl StreamTask {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            if let Outcome::Disposed = self.connect_once(&cancel).await {
                break;
            }
            self.emit(QuoteStreamEvent::Disconnected { epoch: self.epoch });

            let backoff = match self.policy.next_backoff() {
                Ok(backoff) => backoff,
                Err(error) => {
                    tracing::error!(epoch = %self.epoch, error = %error, "Quote stream stopped");
                    self.emit(QuoteStreamEvent::Stopped {
                        epoch: self.epoch,
                        error,
                    });
                    break;
                }
            };

            metrics::record_reconnect(FeedKind::Quotes);
            tracing::info!(
                epoch = %self.epoch,
                attempt = backoff.attempt,
                delay_ms = u64::try_from(backoff.delay.as_millis()).unwrap_or(u64::MAX),
                "Quote stream reconnecting"
            );
            self.emit(QuoteStreamEvent::Reconnecting {
                epoch: self.epoch,
                attempt: backoff.attempt,
            });

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(backoff.delay) => {}
            }
        }
        tracing::debug!(epoch = %self.epoch, "Quote stream finished");
    }

    async fn connect_once(&mut self, cancel: &CancellationToken) -> Outcome {
        let (channel, mut channel_events) =
            RealtimeChannel::connect(self.transport.as_ref(), self.url.clone(), cancel.child_token());

        let outcome = loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break Outcome::Disposed,

                event = channel_events.recv() => match event {
                    Some(ChannelEvent::Opened) => {
                        metrics::record_channel_opened(FeedKind::Quotes);
                        self.policy.reset();
                        if channel.send(&QuoteSubscribeRequest::tickers(&self.symbols)) {
                            self.emit(QuoteStreamEvent::Connected { epoch: self.epoch });
                        }
                    }
                    Some(ChannelEvent::Message(value)) => self.on_frame(value),
                    Some(ChannelEvent::Error(reason)) => {
                        tracing::warn!(epoch = %self.epoch, %reason, "Quote channel error");
                        self.emit(QuoteStreamEvent::Error {
                            epoch: self.epoch,
                            message: reason,
                        });
                    }
                    Some(ChannelEvent::Closed) | None => break Outcome::Lost,
                },
            }
        };

        channel.close();
        outcome
    }

    fn on_frame(&self, value: serde_json::Value) {
        match InboundFrame::decode(value) {
            Ok(InboundFrame::Quote(details)) if self.wanted.contains(&details.symbol) => {
                metrics::record_quote_received();
                self.emit(QuoteStreamEvent::Quote {
                    epoch: self.epoch,
                    quote: details.into_quote(),
                });
            }
            Ok(InboundFrame::Quote(details)) => {
                tracing::trace!(symbol = %details.symbol, "Ignoring quote for unrequested symbol");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(epoch = %self.epoch, error = %e, "Ignoring frame"),
        }
    }

    fn emit(&self, event: QuoteStreamEvent) {
        let _ = self.events.send(event);
    }
}
