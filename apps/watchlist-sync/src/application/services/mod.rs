//! Application Services
//!
//! Services that own watchlist state and drive the feeds.
//!
//! - `IdentitySession`: Login tokens and identity token publication
//! - `SubscriptionCoordinator`: Catalog, subscriptions and the catalog feed
//! - `QuoteSubscriber`: Quote stream lifecycle and the quote board
//! - `WatchlistService`: Event loop tying the three together

mod coordinator;
mod quotes;
mod session;
mod watchlist;

pub use coordinator::{
    CoordinatorSettings, DEFAULT_SUBSCRIPTION_COUNT, SubscriptionCoordinator, TokenTransition,
};
pub use quotes::{QuoteSubscriber, StreamChange};
pub use session::IdentitySession;
pub use watchlist::WatchlistService;
