//! Subscription Coordinator Integration Tests
//!
//! Token transitions, catalog installation, default seeding, fallback and
//! cache behavior, driven through the in-memory transport and store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use watchlist_sync::application::ports::keys;
use watchlist_sync::{
    CoordinatorSettings, DurableCache, InMemoryTransport, MemoryPeer, MemoryStore, Symbol,
    SubscriptionCoordinator, SymbolRecord, TokenTransition,
};

fn catalog_frame(symbols: &[&str]) -> Value {
    let entries: Vec<Value> = symbols
        .iter()
        .map(|s| json!({"symbolName": s, "Group": "Forex", "Currency": "USD"}))
        .collect();
    json!({"msgType": "symbols", "symbolsArray": entries})
}

fn ids(symbols: &[&str]) -> Vec<Symbol> {
    symbols.iter().map(|s| (*s).to_string()).collect()
}

struct Harness {
    transport: InMemoryTransport,
    cache: DurableCache,
    coordinator: SubscriptionCoordinator,
}

impl Harness {
    fn new() -> Self {
        Self::with_cache(DurableCache::new(Arc::new(MemoryStore::new())))
    }

    fn with_cache(cache: DurableCache) -> Self {
        let transport = InMemoryTransport::with_auto_open();
        let coordinator = SubscriptionCoordinator::new(
            cache.clone(),
            Arc::new(transport.clone()),
            CoordinatorSettings::default(),
        );
        Self {
            transport,
            cache,
            coordinator,
        }
    }

    /// Answer the catalog request on connection `index` and apply the result.
    async fn serve_catalog(&mut self, index: usize, symbols: &[&str]) -> Arc<MemoryPeer> {
        let peer = self.transport.wait_for_connection(index).await;
        wait_for_request(&peer).await;
        peer.push_json(&catalog_frame(symbols));
        assert!(self.coordinator.process_next().await);
        peer
    }
}

async fn wait_for_request(peer: &MemoryPeer) {
    for _ in 0..50 {
        if !peer.sent().is_empty() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("catalog request never sent");
}

#[tokio::test]
async fn first_catalog_seeds_subscriptions() {
    let mut h = Harness::new();

    assert_eq!(h.coordinator.observe_token(Some("tok")), TokenTransition::Started);
    assert!(h.coordinator.is_loading());

    h.serve_catalog(0, &["EURUSD"]).await;

    assert_eq!(h.coordinator.all_symbols().len(), 1);
    assert_eq!(h.coordinator.subscribed_symbols(), ids(&["EURUSD"]).as_slice());
    assert!(h.coordinator.is_subscribed("EURUSD"));
    assert!(h.coordinator.error().is_none());
    assert!(!h.coordinator.is_loading());
}

#[tokio::test]
async fn seeds_first_ten_in_catalog_order() {
    let mut h = Harness::new();
    let catalog: Vec<String> = (1..=12).map(|i| format!("SYM{i:02}")).collect();
    let catalog: Vec<&str> = catalog.iter().map(String::as_str).collect();

    h.coordinator.observe_token(Some("tok"));
    h.serve_catalog(0, &catalog).await;

    let expected = ids(&catalog[..10]);
    assert_eq!(h.coordinator.subscribed_symbols(), expected.as_slice());
    assert_eq!(
        h.cache.get::<Vec<Symbol>>(keys::SUBSCRIPTIONS).unwrap(),
        expected
    );
    assert_eq!(
        h.cache
            .get::<Vec<SymbolRecord>>(keys::SYMBOLS)
            .unwrap()
            .len(),
        12
    );
}

#[tokio::test]
async fn stored_subscriptions_are_not_reseeded() {
    let cache = DurableCache::new(Arc::new(MemoryStore::new()));
    cache.set(keys::SUBSCRIPTIONS, &ids(&[]));
    let mut h = Harness::with_cache(cache);

    h.coordinator.observe_token(Some("tok"));
    h.serve_catalog(0, &["EURUSD", "GBPUSD"]).await;

    assert!(h.coordinator.subscribed_symbols().is_empty());
}

#[tokio::test]
async fn same_token_keeps_single_feed() {
    let mut h = Harness::new();

    h.coordinator.observe_token(Some("tok"));
    assert_eq!(h.coordinator.observe_token(Some("tok")), TokenTransition::Unchanged);
    tokio::task::yield_now().await;

    assert_eq!(h.transport.connection_count(), 1);
}

#[tokio::test]
async fn no_token_is_idle() {
    let mut h = Harness::new();
    assert_eq!(h.coordinator.observe_token(None), TokenTransition::Idle);
    assert_eq!(h.coordinator.observe_token(Some("")), TokenTransition::Idle);
    assert!(!h.coordinator.has_active_feed());
    assert_eq!(h.transport.connection_count(), 0);
}

#[tokio::test]
async fn logout_clears_memory_and_cache() {
    let mut h = Harness::new();
    h.coordinator.observe_token(Some("tok"));
    let peer = h.serve_catalog(0, &["EURUSD", "GBPUSD"]).await;
    h.coordinator.toggle_subscription("XAUUSD");

    assert_eq!(h.coordinator.observe_token(None), TokenTransition::LoggedOut);

    assert!(h.coordinator.all_symbols().is_empty());
    assert!(h.coordinator.subscribed_symbols().is_empty());
    assert!(h.coordinator.error().is_none());
    assert!(!h.coordinator.is_loading());
    assert!(!h.cache.contains(keys::SYMBOLS));
    assert!(!h.cache.contains(keys::SUBSCRIPTIONS));
    assert!(peer.is_cancelled());
    assert!(!h.coordinator.has_active_feed());
}

#[tokio::test]
async fn logout_after_shutdown_still_clears() {
    let mut h = Harness::new();
    h.coordinator.observe_token(Some("T1"));
    h.serve_catalog(0, &["EURUSD", "USDJPY"]).await;

    h.coordinator.shutdown();
    assert!(!h.coordinator.has_active_feed());

    assert_eq!(h.coordinator.observe_token(None), TokenTransition::LoggedOut);
    assert!(h.coordinator.all_symbols().is_empty());
    assert!(h.coordinator.subscribed_symbols().is_empty());
    assert!(!h.cache.contains(keys::SYMBOLS));
    assert!(!h.cache.contains(keys::SUBSCRIPTIONS));
    assert_eq!(h.coordinator.observe_token(None), TokenTransition::Idle);
}

#[tokio::test]
async fn same_token_after_shutdown_restarts_feed() {
    let mut h = Harness::new();
    h.coordinator.observe_token(Some("T1"));
    h.serve_catalog(0, &["EURUSD"]).await;
    h.coordinator.shutdown();

    assert_eq!(h.coordinator.observe_token(Some("T1")), TokenTransition::Started);
    assert!(h.coordinator.has_active_feed());
    assert_eq!(h.coordinator.all_symbols().len(), 1);

    let peer = h.transport.wait_for_connection(1).await;
    assert!(peer.url().contains("/T1?"));
    assert_eq!(h.coordinator.observe_token(Some("T1")), TokenTransition::Unchanged);
    assert_eq!(h.transport.connection_count(), 2);
}

#[tokio::test]
async fn connection_error_installs_fallback() {
    let mut h = Harness::new();
    h.coordinator.observe_token(Some("tok"));
    let peer = h.transport.wait_for_connection(0).await;

    peer.fail("connection refused");
    assert!(h.coordinator.process_next().await);
    assert!(h.coordinator.process_next().await);

    assert_eq!(h.coordinator.all_symbols().len(), 10);
    assert_eq!(h.coordinator.subscribed_symbols().len(), 10);
    assert_eq!(
        h.coordinator.error(),
        Some("Symbol connection error: connection refused. Using fallback data.")
    );
    assert!(!h.coordinator.is_loading());
}

#[tokio::test(start_paused = true)]
async fn silent_server_falls_back_after_timeout() {
    let mut h = Harness::new();
    h.coordinator.observe_token(Some("tok"));

    assert!(h.coordinator.process_next().await);
    assert!(h.coordinator.process_next().await);

    assert_eq!(h.coordinator.all_symbols()[0].symbol, "EURUSD");
    assert_eq!(
        h.coordinator.error(),
        Some("Symbols not received within timeout. Using fallback data.")
    );
}

#[tokio::test(start_paused = true)]
async fn custom_timeout_is_honored() {
    let transport = InMemoryTransport::with_auto_open();
    let mut coordinator = SubscriptionCoordinator::new(
        DurableCache::new(Arc::new(MemoryStore::new())),
        Arc::new(transport),
        CoordinatorSettings::default().with_timeout(Duration::from_secs(2)),
    );
    let started = tokio::time::Instant::now();

    coordinator.observe_token(Some("tok"));
    coordinator.process_next().await;

    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(2));
    assert!(waited < Duration::from_secs(10));
}

#[tokio::test]
async fn cached_catalog_paints_before_server_answers() {
    let cache = DurableCache::new(Arc::new(MemoryStore::new()));
    cache.set(
        keys::SYMBOLS,
        &vec![
            SymbolRecord::with_defaults("EURUSD"),
            SymbolRecord::with_defaults("GBPUSD"),
        ],
    );
    cache.set(keys::SUBSCRIPTIONS, &ids(&["GBPUSD"]));
    let mut h = Harness::with_cache(cache);

    assert_eq!(h.coordinator.observe_token(Some("tok")), TokenTransition::Started);

    assert_eq!(h.coordinator.all_symbols().len(), 2);
    assert_eq!(h.coordinator.subscribed_symbols(), ids(&["GBPUSD"]).as_slice());
    assert!(!h.coordinator.is_loading());

    h.serve_catalog(0, &["EURUSD", "GBPUSD", "USDJPY"]).await;
    assert_eq!(h.coordinator.all_symbols().len(), 3);
    assert_eq!(h.coordinator.subscribed_symbols(), ids(&["GBPUSD"]).as_slice());
}

#[tokio::test]
async fn fallback_does_not_replace_cached_catalog() {
    let cache = DurableCache::new(Arc::new(MemoryStore::new()));
    cache.set(keys::SYMBOLS, &vec![SymbolRecord::with_defaults("NZDUSD")]);
    let mut h = Harness::with_cache(cache);

    h.coordinator.observe_token(Some("tok"));
    h.transport.wait_for_connection(0).await.close_remote();
    h.coordinator.process_next().await;
    h.coordinator.process_next().await;

    assert_eq!(h.coordinator.all_symbols().len(), 1);
    assert_eq!(h.coordinator.all_symbols()[0].symbol, "NZDUSD");
    assert_eq!(
        h.coordinator.error(),
        Some("Could not fetch symbols. Using fallback data.")
    );
}

#[tokio::test]
async fn live_catalog_clears_error() {
    let mut h = Harness::new();
    h.coordinator.observe_token(Some("tok"));
    h.transport.wait_for_connection(0).await.fail("refused");
    h.coordinator.process_next().await;
    h.coordinator.process_next().await;
    assert!(h.coordinator.error().is_some());

    assert!(h.coordinator.refresh());
    h.serve_catalog(1, &["EURUSD"]).await;

    assert!(h.coordinator.error().is_none());
    assert_eq!(h.coordinator.all_symbols().len(), 1);
}

#[tokio::test]
async fn rotation_replaces_feed_and_drops_stale_events() {
    let mut h = Harness::new();
    h.coordinator.observe_token(Some("a"));
    let first = h.transport.wait_for_connection(0).await;
    wait_for_request(&first).await;
    first.push_json(&catalog_frame(&["EURUSD"]));
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    assert_eq!(h.coordinator.observe_token(Some("b")), TokenTransition::Rotated);
    assert!(first.is_cancelled());
    assert_eq!(h.coordinator.drain_pending(), 0);
    assert!(h.coordinator.all_symbols().is_empty());

    let second = h.serve_catalog(1, &["GBPUSD"]).await;
    assert!(second.url().ends_with("/b?fragment=1"));
    assert_eq!(h.coordinator.all_symbols()[0].symbol, "GBPUSD");
}

#[tokio::test]
async fn toggle_persists_and_watchlist_follows_catalog_order() {
    let mut h = Harness::new();
    h.coordinator.observe_token(Some("tok"));
    h.serve_catalog(0, &["EURUSD", "GBPUSD", "XAUUSD"]).await;

    assert!(!h.coordinator.toggle_subscription("GBPUSD"));
    assert!(h.coordinator.toggle_subscription("BTCUSD"));

    assert_eq!(
        h.cache.get::<Vec<Symbol>>(keys::SUBSCRIPTIONS).unwrap(),
        ids(&["EURUSD", "XAUUSD", "BTCUSD"])
    );

    let watchlist: Vec<String> = h
        .coordinator
        .watchlist(None)
        .into_iter()
        .map(|r| r.symbol)
        .collect();
    assert_eq!(watchlist, ids(&["EURUSD", "XAUUSD", "BTCUSD"]));

    let filtered = h.coordinator.watchlist(Some("btc"));
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].description, "BTCUSD description");
}

#[tokio::test]
async fn state_survives_restart_through_cache() {
    let cache = DurableCache::new(Arc::new(MemoryStore::new()));
    {
        let mut h = Harness::with_cache(cache.clone());
        h.coordinator.observe_token(Some("tok"));
        h.serve_catalog(0, &["EURUSD", "GBPUSD"]).await;
        h.coordinator.toggle_subscription("EURUSD");
        h.coordinator.shutdown();
    }

    let mut h = Harness::with_cache(cache);
    h.coordinator.observe_token(Some("tok"));

    assert_eq!(h.coordinator.all_symbols().len(), 2);
    assert_eq!(h.coordinator.subscribed_symbols(), ids(&["GBPUSD"]).as_slice());
}
