//! Quote Stream Integration Tests
//!
//! Covers the subscribe handshake, quote filtering, set-equality reuse of
//! the open stream, reconnection, and stale-event suppression.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use watchlist_sync::{
    EpochCounter, InMemoryTransport, MemoryPeer, QuoteStream, QuoteStreamConfig,
    QuoteStreamEvent, QuoteSubscriber, ReconnectConfig, ReconnectError, StreamChange, Symbol,
    Transport,
};

fn symbols(ids: &[&str]) -> Vec<Symbol> {
    ids.iter().map(|s| (*s).to_string()).collect()
}

fn quote_frame(symbol: &str, bid: &str, ask: &str) -> Value {
    json!({
        "msgType": "quote",
        "quoteDetails": {
            "symbol": symbol,
            "bid": bid,
            "ask": ask,
            "date": "2024-05-01T10:00:00Z",
            "venue": "LP1"
        }
    })
}

fn config(max_attempts: u32) -> QuoteStreamConfig {
    QuoteStreamConfig {
        url: "wss://quotes.test/stream".to_string(),
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts,
        },
    }
}

fn transport_arc(transport: &InMemoryTransport) -> Arc<dyn Transport> {
    Arc::new(transport.clone())
}

async fn wait_for_sent(peer: &MemoryPeer) -> Vec<Value> {
    for _ in 0..50 {
        let sent = peer.sent();
        if !sent.is_empty() {
            return sent;
        }
        tokio::task::yield_now().await;
    }
    panic!("client never sent a frame");
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn empty_set_opens_nothing() {
    let transport = InMemoryTransport::with_auto_open();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = QuoteStream::open(
        transport_arc(&transport),
        &config(0),
        &[],
        EpochCounter::new().advance(),
        tx,
    );

    assert!(handle.is_disposed());
    assert_eq!(transport.connection_count(), 0);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn subscribe_request_carries_full_set() {
    let transport = InMemoryTransport::with_auto_open();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let epoch = EpochCounter::new().advance();

    let _handle = QuoteStream::open(
        transport_arc(&transport),
        &config(0),
        &symbols(&["EURUSD", "USDJPY"]),
        epoch,
        tx,
    );

    let peer = transport.wait_for_connection(0).await;
    assert_eq!(peer.url(), "wss://quotes.test/stream");
    assert_eq!(rx.recv().await, Some(QuoteStreamEvent::Connected { epoch }));
    assert_eq!(
        wait_for_sent(&peer).await,
        vec![json!({"requestType": "tickers", "symbols": ["EURUSD", "USDJPY"]})]
    );
}

#[tokio::test]
async fn only_requested_symbols_are_forwarded() {
    let transport = InMemoryTransport::with_auto_open();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _handle = QuoteStream::open(
        transport_arc(&transport),
        &config(0),
        &symbols(&["EURUSD"]),
        EpochCounter::new().advance(),
        tx,
    );
    let peer = transport.wait_for_connection(0).await;
    assert!(matches!(rx.recv().await, Some(QuoteStreamEvent::Connected { .. })));

    peer.push_json(&quote_frame("GBPUSD", "1.2501", "1.2503"));
    peer.push_json(&json!({"msgType": "quote", "quoteDetails": {"symbol": "EURUSD"}}));
    peer.push_json(&quote_frame("EURUSD", "1.0841", "1.0843"));

    let Some(QuoteStreamEvent::Quote { quote, .. }) = rx.recv().await else {
        panic!("expected a quote");
    };
    assert_eq!(quote.symbol, "EURUSD");
    assert_eq!(quote.bid, Decimal::new(10841, 4));
    assert_eq!(quote.ask, Decimal::new(10843, 4));
    assert_eq!(quote.venue, "LP1");
    assert_eq!(quote.timestamp, "2024-05-01T10:00:00Z");
}

#[tokio::test]
async fn reordered_set_keeps_stream() {
    let transport = InMemoryTransport::with_auto_open();
    let mut subscriber = QuoteSubscriber::new(transport_arc(&transport), config(0));

    assert_eq!(
        subscriber.request(&symbols(&["A", "B", "C"])),
        StreamChange::Opened
    );
    assert_eq!(
        subscriber.request(&symbols(&["C", "A", "B"])),
        StreamChange::Unchanged
    );
    settle().await;
    assert_eq!(transport.connection_count(), 1);
    assert_eq!(subscriber.streamed_symbols(), symbols(&["A", "B", "C"]).as_slice());
}

#[tokio::test]
async fn changed_set_replaces_stream() {
    let transport = InMemoryTransport::with_auto_open();
    let mut subscriber = QuoteSubscriber::new(transport_arc(&transport), config(0));

    subscriber.request(&symbols(&["A", "B"]));
    let first = transport.wait_for_connection(0).await;

    assert_eq!(
        subscriber.request(&symbols(&["A", "B", "C"])),
        StreamChange::Opened
    );
    assert!(first.is_cancelled());

    let second = transport.wait_for_connection(1).await;
    assert_eq!(transport.connection_count(), 2);
    assert_eq!(
        wait_for_sent(&second).await,
        vec![json!({"requestType": "tickers", "symbols": ["A", "B", "C"]})]
    );
}

#[tokio::test]
async fn emptied_set_closes_stream() {
    let transport = InMemoryTransport::with_auto_open();
    let mut subscriber = QuoteSubscriber::new(transport_arc(&transport), config(0));

    assert_eq!(subscriber.request(&[]), StreamChange::Unchanged);
    subscriber.request(&symbols(&["A"]));
    let peer = transport.wait_for_connection(0).await;
    assert_eq!(subscriber.request(&[]), StreamChange::Closed);
    assert!(peer.is_cancelled());
    assert!(subscriber.streamed_symbols().is_empty());
}

#[tokio::test]
async fn board_keeps_latest_quote_per_symbol() {
    let transport = InMemoryTransport::with_auto_open();
    let mut subscriber = QuoteSubscriber::new(transport_arc(&transport), config(0));
    subscriber.request(&symbols(&["EURUSD"]));
    let peer = transport.wait_for_connection(0).await;

    peer.push_json(&quote_frame("EURUSD", "1.0841", "1.0843"));
    peer.push_json(&quote_frame("EURUSD", "1.0850", "1.0852"));
    settle().await;

    let applied = subscriber.drain_pending();
    assert_eq!(applied.len(), 2);
    assert!(subscriber.is_connected());
    assert_eq!(subscriber.board().len(), 1);
    assert_eq!(
        subscriber.quote("EURUSD").unwrap().bid,
        Decimal::new(10850, 4)
    );
}

#[tokio::test]
async fn stale_stream_events_are_dropped() {
    let transport = InMemoryTransport::with_auto_open();
    let mut subscriber = QuoteSubscriber::new(transport_arc(&transport), config(0));

    subscriber.request(&symbols(&["EURUSD"]));
    let old = transport.wait_for_connection(0).await;
    old.push_json(&quote_frame("EURUSD", "1.0", "1.1"));
    settle().await;

    // Connected and the quote are queued but not yet applied.
    subscriber.request(&symbols(&["EURUSD", "GBPUSD"]));
    old.push_json(&quote_frame("EURUSD", "1.2", "1.3"));

    assert!(subscriber.drain_pending().is_empty());
    assert!(subscriber.quote("EURUSD").is_none());
    assert!(!subscriber.is_connected());
}

#[tokio::test(start_paused = true)]
async fn lost_connection_is_retried_with_backoff() {
    let transport = InMemoryTransport::with_auto_open();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let epoch = EpochCounter::new().advance();

    let _handle = QuoteStream::open(
        transport_arc(&transport),
        &config(0),
        &symbols(&["EURUSD"]),
        epoch,
        tx,
    );
    assert_eq!(rx.recv().await, Some(QuoteStreamEvent::Connected { epoch }));

    transport.peer(0).unwrap().close_remote();
    assert_eq!(rx.recv().await, Some(QuoteStreamEvent::Disconnected { epoch }));
    assert_eq!(
        rx.recv().await,
        Some(QuoteStreamEvent::Reconnecting { epoch, attempt: 1 })
    );
    assert_eq!(rx.recv().await, Some(QuoteStreamEvent::Connected { epoch }));

    let second = transport.peer(1).unwrap();
    assert_eq!(
        wait_for_sent(&second).await,
        vec![json!({"requestType": "tickers", "symbols": ["EURUSD"]})]
    );

    second.close_remote();
    assert_eq!(rx.recv().await, Some(QuoteStreamEvent::Disconnected { epoch }));
    assert_eq!(
        rx.recv().await,
        Some(QuoteStreamEvent::Reconnecting { epoch, attempt: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let transport = InMemoryTransport::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let epoch = EpochCounter::new().advance();

    let _handle = QuoteStream::open(
        transport_arc(&transport),
        &config(2),
        &symbols(&["EURUSD"]),
        epoch,
        tx,
    );

    for attempt in 1..=2 {
        let index = usize::try_from(attempt - 1).unwrap();
        transport.wait_for_connection(index).await.close_remote();
        assert_eq!(rx.recv().await, Some(QuoteStreamEvent::Disconnected { epoch }));
        assert_eq!(
            rx.recv().await,
            Some(QuoteStreamEvent::Reconnecting { epoch, attempt })
        );
    }

    transport.wait_for_connection(2).await.close_remote();
    assert_eq!(rx.recv().await, Some(QuoteStreamEvent::Disconnected { epoch }));

    let mut tail = Vec::new();
    while let Some(event) = rx.recv().await {
        tail.push(event);
    }
    assert_eq!(
        tail,
        vec![QuoteStreamEvent::Stopped {
            epoch,
            error: ReconnectError::MaxAttemptsExceeded(2),
        }]
    );
    assert_eq!(transport.connection_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn same_set_reopens_after_stream_gives_up() {
    let transport = InMemoryTransport::new();
    let mut subscriber = QuoteSubscriber::new(transport_arc(&transport), config(1));
    let wanted = symbols(&["EURUSD"]);

    assert_eq!(subscriber.request(&wanted), StreamChange::Opened);
    transport.wait_for_connection(0).await.close_remote();
    assert_eq!(subscriber.request(&wanted), StreamChange::Unchanged);
    transport.wait_for_connection(1).await.close_remote();

    loop {
        let event = subscriber.next_event().await.expect("stream ended silently");
        let stopped = matches!(event, QuoteStreamEvent::Stopped { .. });
        subscriber.apply(event);
        if stopped {
            break;
        }
    }
    assert!(!subscriber.is_connected());
    assert!(subscriber.streamed_symbols().is_empty());

    assert_eq!(subscriber.request(&wanted), StreamChange::Opened);
    let third = transport.wait_for_connection(2).await;
    third.open();
    assert_eq!(
        wait_for_sent(&third).await,
        vec![json!({"requestType": "tickers", "symbols": ["EURUSD"]})]
    );
    assert_eq!(transport.connection_count(), 3);
    assert_eq!(subscriber.streamed_symbols(), wanted.as_slice());
}

#[tokio::test(start_paused = true)]
async fn dispose_stops_reconnecting() {
    let transport = InMemoryTransport::with_auto_open();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = QuoteStream::open(
        transport_arc(&transport),
        &config(0),
        &symbols(&["EURUSD"]),
        EpochCounter::new().advance(),
        tx,
    );
    assert!(matches!(rx.recv().await, Some(QuoteStreamEvent::Connected { .. })));

    transport.peer(0).unwrap().close_remote();
    assert!(matches!(rx.recv().await, Some(QuoteStreamEvent::Disconnected { .. })));
    assert!(matches!(rx.recv().await, Some(QuoteStreamEvent::Reconnecting { .. })));

    handle.dispose();
    while rx.recv().await.is_some() {}
    assert_eq!(transport.connection_count(), 1);
}
