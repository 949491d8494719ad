//! Subscription Coordinator
//!
//! Owns the symbol catalog and the subscription set, and keeps exactly one
//! catalog feed open for the current identity token.
//!
//! # Token transitions
//!
//! | Before  | After     | Effect                                              |
//! |---------|-----------|-----------------------------------------------------|
//! | none    | token     | paint from cache, start feed                        |
//! | token   | same      | nothing, or restart the feed after [`shutdown`]     |
//! | token   | other     | dispose feed, start a new one, keep in-memory state |
//! | token   | none      | dispose feed, clear state and cached entries        |
//!
//! "Before" is the last token observed, not whether a feed is running, so a
//! logout still clears state after the feed was shut down.
//!
//! Feed failures never escape: they are recorded in [`error`] next to a
//! catalog that is guaranteed non-empty (possibly the fallback set).
//!
//! [`error`]: SubscriptionCoordinator::error
//! [`shutdown`]: SubscriptionCoordinator::shutdown

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::application::feeds::{
    CatalogFeed, CatalogFeedConfig, CatalogFeedEvent, CatalogSource, FeedHandle,
};
use crate::application::ports::{DurableCache, Transport, keys};
use crate::domain::catalog::{Symbol, SymbolRecord};
use crate::domain::streaming::{Epoch, EpochCounter};
use crate::domain::subscription::SubscriptionSet;
use crate::infrastructure::metrics;

/// Symbols subscribed by default when the cache holds no subscription set.
pub const DEFAULT_SUBSCRIPTION_COUNT: usize = 10;

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Catalog feed endpoint and timeout.
    pub catalog: CatalogFeedConfig,
    /// How many catalog symbols to subscribe by default.
    pub default_subscription_count: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            catalog: CatalogFeedConfig::default(),
            default_subscription_count: DEFAULT_SUBSCRIPTION_COUNT,
        }
    }
}

impl CoordinatorSettings {
    /// Override the catalog timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.catalog.timeout = timeout;
        self
    }
}

/// What [`SubscriptionCoordinator::observe_token`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTransition {
    /// Same token as the active feed; nothing changed.
    Unchanged,
    /// First token, or the same token after a shutdown; feed started.
    Started,
    /// Token changed; old feed replaced.
    Rotated,
    /// Token cleared; state wiped.
    LoggedOut,
    /// No token before or after, and nothing to clear.
    Idle,
}

struct ActiveFeed {
    epoch: Epoch,
    handle: FeedHandle,
}

/// Token-driven owner of catalog and subscriptions.
pub struct SubscriptionCoordinator {
    cache: DurableCache,
    transport: Arc<dyn Transport>,
    settings: CoordinatorSettings,
    epochs: EpochCounter,
    token: Option<String>,
    active: Option<ActiveFeed>,
    catalog: Vec<SymbolRecord>,
    subscriptions: SubscriptionSet,
    loading: bool,
    error: Option<String>,
    events_tx: mpsc::UnboundedSender<CatalogFeedEvent>,
    events_rx: mpsc::UnboundedReceiver<CatalogFeedEvent>,
}

impl std::fmt::Debug for SubscriptionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionCoordinator")
            .field("epoch", &self.epochs.current())
            .field("has_token", &self.token.is_some())
            .field("active", &self.active.as_ref().map(|a| a.epoch))
            .field("catalog", &self.catalog.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("loading", &self.loading)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl SubscriptionCoordinator {
    /// Create an idle coordinator.
    #[must_use]
    pub fn new(
        cache: DurableCache,
        transport: Arc<dyn Transport>,
        settings: CoordinatorSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            cache,
            transport,
            settings,
            epochs: EpochCounter::new(),
            token: None,
            active: None,
            catalog: Vec::new(),
            subscriptions: SubscriptionSet::new(),
            loading: false,
            error: None,
            events_tx,
            events_rx,
        }
    }

    // =========================================================================
    // Token Transitions
    // =========================================================================

    /// React to the current identity token.
    ///
    /// Must run inside a tokio runtime when a feed has to be started.
    pub fn observe_token(&mut self, token: Option<&str>) -> TokenTransition {
        let token = token.filter(|t| !t.is_empty());
        let previous = self.token.clone();

        match (previous.as_deref(), token) {
            (Some(previous), Some(token)) if previous == token && self.active.is_some() => {
                tracing::trace!("Token unchanged; keeping catalog feed");
                TokenTransition::Unchanged
            }
            (previous, Some(token)) => {
                let transition = match previous {
                    Some(previous) if previous != token => {
                        self.dispose_active();
                        TokenTransition::Rotated
                    }
                    Some(_) => TokenTransition::Started,
                    None => {
                        self.load_cached();
                        TokenTransition::Started
                    }
                };
                let token = token.to_string();
                self.start_feed(&token);
                self.token = Some(token);
                tracing::info!(transition = ?transition, "Identity token observed");
                transition
            }
            (previous, None) if previous.is_some() || self.holds_state() => {
                self.dispose_active();
                self.epochs.advance();
                self.token = None;
                self.clear();
                tracing::info!("Logged out; catalog and subscriptions cleared");
                TokenTransition::LoggedOut
            }
            (_, None) => TokenTransition::Idle,
        }
    }

    /// Re-request the catalog for the current token.
    ///
    /// Returns false when there is no token.
    pub fn refresh(&mut self) -> bool {
        let Some(token) = self.token.clone() else {
            return false;
        };
        self.dispose_active();
        self.start_feed(&token);
        true
    }

    /// Stop the active feed without touching state.
    ///
    /// The token is remembered: observing it again restarts the feed, and
    /// observing no token still clears everything.
    pub fn shutdown(&mut self) {
        self.dispose_active();
        self.epochs.advance();
    }

    fn holds_state(&self) -> bool {
        !self.catalog.is_empty() || !self.subscriptions.is_empty()
    }

    fn start_feed(&mut self, token: &str) {
        let epoch = self.epochs.advance();
        let handle = CatalogFeed::start(
            self.transport.as_ref(),
            &self.settings.catalog,
            token,
            epoch,
            self.events_tx.clone(),
        );
        self.active = Some(ActiveFeed {
            epoch,
            handle,
        });
        self.loading = self.catalog.is_empty();
    }

    fn dispose_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.dispose();
            tracing::debug!(epoch = %active.epoch, "Catalog feed disposed");
        }
    }

    fn load_cached(&mut self) {
        if let Some(catalog) = self.cache.get::<Vec<SymbolRecord>>(keys::SYMBOLS) {
            tracing::debug!(count = catalog.len(), "Catalog painted from cache");
            self.catalog = catalog;
        }
        if let Some(subscriptions) = self.cache.get::<SubscriptionSet>(keys::SUBSCRIPTIONS) {
            self.subscriptions = subscriptions;
            metrics::set_subscribed_symbols(self.subscriptions.len());
        }
    }

    fn clear(&mut self) {
        self.catalog.clear();
        self.subscriptions.clear();
        self.error = None;
        self.loading = false;
        self.cache.remove(keys::SYMBOLS);
        self.cache.remove(keys::SUBSCRIPTIONS);
        metrics::set_subscribed_symbols(0);
    }

    // =========================================================================
    // Feed Events
    // =========================================================================

    /// Wait for the next feed event.
    pub async fn next_event(&mut self) -> Option<CatalogFeedEvent> {
        self.events_rx.recv().await
    }

    /// Wait for and apply the next feed event.
    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => self.handle_event(event),
            None => false,
        }
    }

    /// Apply every event already queued. Returns how many changed state.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.handle_event(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one feed event. Returns false for events from a stale feed.
    pub fn handle_event(&mut self, event: CatalogFeedEvent) -> bool {
        let epoch = event.epoch();
        if !self.epochs.is_current(epoch) {
            tracing::debug!(%epoch, current = %self.epochs.current(), "Dropping stale catalog event");
            return false;
        }

        match event {
            CatalogFeedEvent::Symbols {
                symbols,
                source: CatalogSource::Live,
                ..
            } => {
                self.install_catalog(symbols);
                self.error = None;
            }
            CatalogFeedEvent::Symbols {
                symbols,
                source: CatalogSource::Fallback,
                ..
            } => {
                if self.catalog.is_empty() {
                    self.install_catalog(symbols);
                } else {
                    tracing::debug!(count = self.catalog.len(), "Keeping existing catalog over fallback");
                }
            }
            CatalogFeedEvent::Error { error, .. } => {
                tracing::warn!(error = %error, "Catalog feed failed");
                self.error = Some(error.to_string());
            }
        }
        self.loading = false;
        true
    }

    /// Replace the catalog, persist it, and seed default subscriptions when
    /// none were ever stored.
    fn install_catalog(&mut self, symbols: Vec<SymbolRecord>) {
        self.cache.set(keys::SYMBOLS, &symbols);
        self.catalog = symbols;

        if !self.catalog.is_empty() && !self.cache.contains(keys::SUBSCRIPTIONS) {
            self.subscriptions = SubscriptionSet::seeded_from(
                &self.catalog,
                self.settings.default_subscription_count,
            );
            tracing::info!(count = self.subscriptions.len(), "Seeded default subscriptions");
            self.persist_subscriptions();
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Flip membership of `symbol` and persist. Returns the new membership.
    pub fn toggle_subscription(&mut self, symbol: &str) -> bool {
        let subscribed = self.subscriptions.toggle(symbol);
        self.persist_subscriptions();
        tracing::debug!(symbol, subscribed, "Subscription toggled");
        subscribed
    }

    fn persist_subscriptions(&self) {
        self.cache.set(keys::SUBSCRIPTIONS, &self.subscriptions);
        metrics::set_subscribed_symbols(self.subscriptions.len());
    }

    /// True if `symbol` is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, symbol: &str) -> bool {
        self.subscriptions.contains(symbol)
    }

    /// Subscribed ids in insertion order.
    #[must_use]
    pub fn subscribed_symbols(&self) -> &[Symbol] {
        self.subscriptions.as_slice()
    }

    /// Subscribed records in catalog order, optionally filtered by a
    /// case-insensitive query over id and description. Subscribed ids that
    /// the catalog does not list follow with default fields.
    #[must_use]
    pub fn watchlist(&self, query: Option<&str>) -> Vec<SymbolRecord> {
        let query = query.unwrap_or_default();
        let listed = self
            .catalog
            .iter()
            .filter(|record| self.subscriptions.contains(&record.symbol))
            .cloned();
        let unlisted = self
            .subscriptions
            .iter()
            .filter(|symbol| !self.catalog.iter().any(|r| &r.symbol == *symbol))
            .map(SymbolRecord::with_defaults);

        listed
            .chain(unlisted)
            .filter(|record| record.matches(query))
            .collect()
    }

    // =========================================================================
    // State
    // =========================================================================

    /// The catalog, in server order.
    #[must_use]
    pub fn all_symbols(&self) -> &[SymbolRecord] {
        &self.catalog
    }

    /// True while the first catalog for a token is pending.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Last feed error, cleared by the next live catalog.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True while a catalog feed is running for a token.
    #[must_use]
    pub const fn has_active_feed(&self) -> bool {
        self.active.is_some()
    }

    /// Generation of the running feed, if any.
    #[must_use]
    pub fn active_epoch(&self) -> Option<Epoch> {
        self.active.as_ref().map(|a| a.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::feeds::CatalogFeedError;
    use crate::domain::catalog::fallback_symbols;
    use crate::infrastructure::realtime::InMemoryTransport;
    use crate::infrastructure::storage::MemoryStore;

    fn coordinator(cache: &DurableCache) -> SubscriptionCoordinator {
        SubscriptionCoordinator::new(
            cache.clone(),
            Arc::new(InMemoryTransport::new()),
            CoordinatorSettings::default(),
        )
    }

    #[test]
    fn toggle_persists_without_network() {
        let cache = DurableCache::new(Arc::new(MemoryStore::new()));
        let mut coordinator = coordinator(&cache);

        assert!(coordinator.toggle_subscription("EURUSD"));
        assert!(coordinator.toggle_subscription("BTCUSD"));
        assert!(!coordinator.toggle_subscription("EURUSD"));

        assert!(coordinator.is_subscribed("BTCUSD"));
        assert!(!coordinator.is_subscribed("EURUSD"));
        assert_eq!(
            cache.get::<Vec<String>>(keys::SUBSCRIPTIONS).unwrap(),
            vec!["BTCUSD"]
        );
    }

    #[test]
    fn watchlist_appends_unlisted_symbols() {
        let cache = DurableCache::new(Arc::new(MemoryStore::new()));
        let mut coordinator = coordinator(&cache);
        coordinator.catalog = fallback_symbols();

        coordinator.toggle_subscription("XAUUSD");
        coordinator.toggle_subscription("NOTLISTED");
        coordinator.toggle_subscription("EURUSD");

        let ids: Vec<String> = coordinator
            .watchlist(None)
            .into_iter()
            .map(|r| r.symbol)
            .collect();
        assert_eq!(ids, vec!["EURUSD", "XAUUSD", "NOTLISTED"]);

        let gold = coordinator.watchlist(Some("gold"));
        assert_eq!(gold.len(), 1);
        assert_eq!(gold[0].symbol, "XAUUSD");

        let unlisted = coordinator.watchlist(Some("notlisted"));
        assert_eq!(unlisted[0].description, "NOTLISTED description");
    }

    #[test]
    fn no_token_is_idle() {
        let cache = DurableCache::new(Arc::new(MemoryStore::new()));
        let mut coordinator = coordinator(&cache);
        assert_eq!(coordinator.observe_token(None), TokenTransition::Idle);
        assert_eq!(coordinator.observe_token(Some("")), TokenTransition::Idle);
        assert!(!coordinator.refresh());
    }

    #[tokio::test]
    async fn feed_error_alone_records_error_without_installing() {
        let cache = DurableCache::new(Arc::new(MemoryStore::new()));
        let mut coordinator = coordinator(&cache);
        coordinator.observe_token(Some("tok"));
        let epoch = coordinator.active_epoch().unwrap();

        assert!(coordinator.handle_event(CatalogFeedEvent::Error {
            epoch,
            error: CatalogFeedError::Closed,
        }));

        assert!(coordinator.error().is_some());
        assert!(coordinator.all_symbols().is_empty());
        assert!(coordinator.subscribed_symbols().is_empty());
        assert!(!cache.contains(keys::SYMBOLS));
        assert!(!coordinator.is_loading());
    }
}
