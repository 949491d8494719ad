//! In-Memory Transport
//!
//! Every channel opened through [`InMemoryTransport`] becomes a
//! [`MemoryPeer`] that the test (or demo) plays the server side of: open it,
//! push frames, fail it, close it, and inspect what the client sent.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::application::ports::{ChannelLink, Transport};

/// Transport whose connections are driven by hand.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    peers: Mutex<Vec<Arc<MemoryPeer>>>,
    auto_open: bool,
    connected: Notify,
}

impl InMemoryTransport {
    /// Peers start in the connecting state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Peers are opened as soon as they connect.
    #[must_use]
    pub fn with_auto_open() -> Self {
        Self {
            inner: Arc::new(Inner {
                auto_open: true,
                ..Inner::default()
            }),
        }
    }

    /// Connections made so far, closed ones included.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.peers.lock().len()
    }

    /// The `index`-th connection.
    #[must_use]
    pub fn peer(&self, index: usize) -> Option<Arc<MemoryPeer>> {
        self.inner.peers.lock().get(index).cloned()
    }

    /// The most recent connection.
    #[must_use]
    pub fn last_peer(&self) -> Option<Arc<MemoryPeer>> {
        self.inner.peers.lock().last().cloned()
    }

    /// Wait until the `index`-th connection exists.
    pub async fn wait_for_connection(&self, index: usize) -> Arc<MemoryPeer> {
        loop {
            let notified = self.inner.connected.notified();
            if let Some(peer) = self.peer(index) {
                return peer;
            }
            notified.await;
        }
    }
}

impl Transport for InMemoryTransport {
    fn open(&self, link: ChannelLink) {
        let peer = Arc::new(MemoryPeer {
            url: link.url().to_string(),
            link: Mutex::new(link),
            sent: Mutex::new(Vec::new()),
        });
        if self.inner.auto_open {
            peer.open();
        }
        self.inner.peers.lock().push(peer);
        self.inner.connected.notify_waiters();
    }
}

/// Server side of one in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    link: Mutex<ChannelLink>,
    sent: Mutex<Vec<serde_json::Value>>,
}

impl MemoryPeer {
    /// URL the client connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Accept the connection.
    pub fn open(&self) {
        self.link.lock().opened();
    }

    /// Send a JSON frame to the client.
    pub fn push_json(&self, frame: &serde_json::Value) {
        self.link.lock().deliver_text(&frame.to_string());
    }

    /// Send a raw text frame to the client.
    pub fn push_text(&self, text: &str) {
        self.link.lock().deliver_text(text);
    }

    /// Report a transport error.
    pub fn fail(&self, reason: &str) {
        self.link.lock().failed(reason);
    }

    /// Close from the server side.
    pub fn close_remote(&self) {
        self.link.lock().closed();
    }

    /// True once the client closed the connection.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.link.lock().is_cancelled()
    }

    /// Every frame the client sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<serde_json::Value> {
        let mut link = self.link.lock();
        let mut sent = self.sent.lock();
        while let Some(text) = link.try_next_outbound() {
            match serde_json::from_str(&text) {
                Ok(value) => sent.push(value),
                Err(_) => sent.push(serde_json::Value::String(text)),
            }
        }
        sent.clone()
    }
}
