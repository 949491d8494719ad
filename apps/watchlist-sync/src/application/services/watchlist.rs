//! Watchlist Service
//!
//! Glue between the session, the coordinator and the quote subscriber. One
//! `&mut self` loop owns all three, so every state change is applied in
//! arrival order and no state is shared across tasks.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::coordinator::{SubscriptionCoordinator, TokenTransition};
use super::quotes::{QuoteSubscriber, StreamChange};
use super::session::IdentitySession;
use crate::application::ports::AuthError;
use crate::domain::quote::Quote;

/// The assembled client core.
#[derive(Debug)]
pub struct WatchlistService {
    session: IdentitySession,
    coordinator: SubscriptionCoordinator,
    quotes: QuoteSubscriber,
    token_rx: watch::Receiver<Option<String>>,
}

impl WatchlistService {
    /// Wire the parts together.
    #[must_use]
    pub fn new(
        session: IdentitySession,
        coordinator: SubscriptionCoordinator,
        quotes: QuoteSubscriber,
    ) -> Self {
        let token_rx = session.subscribe();
        Self {
            session,
            coordinator,
            quotes,
            token_rx,
        }
    }

    /// Bring the coordinator and the quote stream in line with the current
    /// identity token.
    pub fn sync_token(&mut self) -> TokenTransition {
        let token = self.token_rx.borrow_and_update().clone();
        let transition = self.coordinator.observe_token(token.as_deref());
        if matches!(
            transition,
            TokenTransition::LoggedOut | TokenTransition::Rotated
        ) {
            self.quotes.reset();
        }
        self.sync_quotes();
        transition
    }

    /// Point the quote stream at the current subscription set.
    pub fn sync_quotes(&mut self) -> StreamChange {
        self.quotes.request(self.coordinator.subscribed_symbols())
    }

    /// Flip a subscription and follow it with the quote stream.
    pub fn toggle_subscription(&mut self, symbol: &str) -> bool {
        let subscribed = self.coordinator.toggle_subscription(symbol);
        self.sync_quotes();
        subscribed
    }

    /// Log in and start the feeds for the new token.
    ///
    /// # Errors
    ///
    /// Returns the login failure; feeds are left as they were.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), AuthError> {
        self.session.login(email, password).await?;
        self.sync_token();
        Ok(())
    }

    /// Log out and tear everything down.
    pub fn logout(&mut self) {
        self.session.logout();
        self.sync_token();
    }

    /// Drive the feeds until `cancel` fires, handing every applied quote to
    /// `on_quote`.
    pub async fn run(&mut self, cancel: CancellationToken, mut on_quote: impl FnMut(&Quote)) {
        self.sync_token();

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,

                changed = self.token_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.sync_token();
                }

                Some(event) = self.coordinator.next_event() => {
                    if self.coordinator.handle_event(event) {
                        self.sync_quotes();
                    }
                }

                Some(event) = self.quotes.next_event() => {
                    if let Some(quote) = self.quotes.apply(event) {
                        on_quote(&quote);
                    }
                }
            }
        }

        self.coordinator.shutdown();
        self.quotes.reset();
        tracing::info!("Watchlist service stopped");
    }

    /// The identity session.
    #[must_use]
    pub const fn session(&self) -> &IdentitySession {
        &self.session
    }

    /// The identity session, mutably.
    pub const fn session_mut(&mut self) -> &mut IdentitySession {
        &mut self.session
    }

    /// Catalog and subscriptions.
    #[must_use]
    pub const fn coordinator(&self) -> &SubscriptionCoordinator {
        &self.coordinator
    }

    /// Catalog and subscriptions, mutably.
    pub const fn coordinator_mut(&mut self) -> &mut SubscriptionCoordinator {
        &mut self.coordinator
    }

    /// Quote stream and board.
    #[must_use]
    pub const fn quotes(&self) -> &QuoteSubscriber {
        &self.quotes
    }

    /// Quote stream and board, mutably.
    pub const fn quotes_mut(&mut self) -> &mut QuoteSubscriber {
        &mut self.quotes
    }
}
