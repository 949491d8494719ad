//! Prometheus Metrics Module
//!
//! Exposes client metrics in Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Channels**: Opens per feed and the number currently open
//! - **Frames**: Quotes received and malformed frames dropped
//! - **Catalog**: Fallbacks by reason
//! - **Subscriptions**: Current subscription set size
//!
//! Recording functions are cheap no-ops until a recorder is installed, so
//! library code and tests call them unconditionally.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Calling it again after a successful install does nothing.
///
/// # Errors
///
/// Returns an error if the recorder or the listener cannot be set up.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()?;

    register_metrics();
    let _ = INSTALLED.set(());
    tracing::info!(port, "Prometheus metrics listener started");
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "watchlist_channel_opens_total",
        "Realtime channels that reached the open state"
    );
    describe_gauge!(
        "watchlist_open_channels",
        "Realtime channels currently open"
    );
    describe_counter!(
        "watchlist_malformed_frames_total",
        "Inbound frames dropped because they were not valid JSON"
    );
    describe_counter!(
        "watchlist_catalog_fallbacks_total",
        "Catalog requests answered with the fallback dataset"
    );
    describe_counter!(
        "watchlist_quotes_received_total",
        "Quotes received for subscribed symbols"
    );
    describe_counter!(
        "watchlist_reconnects_total",
        "Quote stream reconnection attempts"
    );
    describe_gauge!(
        "watchlist_subscribed_symbols",
        "Symbols in the subscription set"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for feed types.
#[derive(Debug, Clone, Copy)]
pub enum FeedKind {
    /// Symbol catalog feed.
    Catalog,
    /// Quote stream.
    Quotes,
}

impl FeedKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Quotes => "quotes",
        }
    }
}

/// Record a channel reaching the open state.
pub fn record_channel_opened(feed: FeedKind) {
    counter!("watchlist_channel_opens_total", "feed" => feed.as_str()).increment(1);
}

/// Move the open-channel gauge by `delta`.
pub fn adjust_open_channels(delta: f64) {
    gauge!("watchlist_open_channels").increment(delta);
}

/// Record a dropped malformed frame.
pub fn record_malformed_frame() {
    counter!("watchlist_malformed_frames_total").increment(1);
}

/// Record a fallback catalog and why it was used.
pub fn record_catalog_fallback(reason: &'static str) {
    counter!("watchlist_catalog_fallbacks_total", "reason" => reason).increment(1);
}

/// Record a quote for a subscribed symbol.
pub fn record_quote_received() {
    counter!("watchlist_quotes_received_total").increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect(feed: FeedKind) {
    counter!("watchlist_reconnects_total", "feed" => feed.as_str()).increment(1);
}

/// Update the subscription set size.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribed_symbols(count: usize) {
    gauge!("watchlist_subscribed_symbols").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
