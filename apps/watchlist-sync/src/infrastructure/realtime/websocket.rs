//! WebSocket Transport
//!
//! Drives one tokio-tungstenite connection per channel. Text frames (and
//! binary frames that are valid UTF-8) go to [`ChannelLink::deliver_text`];
//! pings are answered here.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::application::ports::{ChannelLink, Transport};
use crate::infrastructure::metrics;

/// Production transport over `wss://`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, link: ChannelLink) {
        tokio::spawn(drive(link));
    }
}

async fn drive(mut link: ChannelLink) {
    let cancel = link.cancel_token();

    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => Ok(()),
        result = run(&mut link) => result,
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "WebSocket connection failed");
        link.failed(e.to_string());
    }
    link.closed();
}

async fn run(link: &mut ChannelLink) -> Result<(), tungstenite::Error> {
    let (stream, _response) = tokio_tungstenite::connect_async(link.url()).await?;
    let (mut write, mut read) = stream.split();
    link.opened();

    loop {
        tokio::select! {
            outbound = link.next_outbound() => match outbound {
                Some(text) => write.send(Message::Text(text.into())).await?,
                None => {
                    // Owner dropped the channel.
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
            },

            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => link.deliver_text(text.as_str()),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => link.deliver_text(text),
                    Err(_) => {
                        metrics::record_malformed_frame();
                        tracing::warn!(len = data.len(), "Dropping non-UTF-8 binary frame");
                    }
                },
                Some(Ok(Message::Ping(data))) => write.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(reason = ?frame.map(|f| f.reason), "Server sent close frame");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => {
                    tracing::debug!("WebSocket stream ended");
                    return Ok(());
                }
            },
        }
    }
}
