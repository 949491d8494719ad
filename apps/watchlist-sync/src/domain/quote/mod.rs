//! Quote Types
//!
//! A quote is the latest bid/ask for one symbol. The board keeps exactly one
//! quote per symbol; a newer quote overwrites the previous one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::Symbol;

/// Latest bid/ask for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol the quote belongs to.
    pub symbol: Symbol,
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// Server timestamp, verbatim.
    pub timestamp: String,
    /// Venue that produced the quote.
    pub venue: String,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

impl Quote {
    /// Midpoint of bid and ask.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Ask minus bid.
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// Live mapping of symbol to its most recent quote.
#[derive(Debug, Default, Clone)]
pub struct QuoteBoard {
    quotes: HashMap<Symbol, Quote>,
}

impl QuoteBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `quote`, returning the one it replaced.
    pub fn apply(&mut self, quote: Quote) -> Option<Quote> {
        self.quotes.insert(quote.symbol.clone(), quote)
    }

    /// Latest quote for `symbol`.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    /// Drop quotes for symbols not in `symbols`.
    pub fn retain_symbols(&mut self, symbols: &[Symbol]) {
        self.quotes.retain(|symbol, _| symbols.contains(symbol));
    }

    /// Remove every quote.
    pub fn clear(&mut self) {
        self.quotes.clear();
    }

    /// Number of symbols with a quote.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// True when no quote has been received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Iterate over all quotes in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Quote> {
        self.quotes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, bid: i64, ask: i64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            bid: Decimal::new(bid, 4),
            ask: Decimal::new(ask, 4),
            timestamp: "2024-01-15 10:00:00".to_string(),
            venue: "TEST".to_string(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn latest_quote_wins() {
        let mut board = QuoteBoard::new();
        assert!(board.apply(quote("EURUSD", 10_850, 10_852)).is_none());

        let previous = board.apply(quote("EURUSD", 10_851, 10_853)).unwrap();
        assert_eq!(previous.bid, Decimal::new(10_850, 4));
        assert_eq!(board.len(), 1);
        assert_eq!(board.get("EURUSD").unwrap().bid, Decimal::new(10_851, 4));
    }

    #[test]
    fn mid_and_spread() {
        let q = quote("EURUSD", 10_850, 10_852);
        assert_eq!(q.mid(), Decimal::new(10_851, 4));
        assert_eq!(q.spread(), Decimal::new(2, 4));
    }

    #[test]
    fn retain_drops_unsubscribed_symbols() {
        let mut board = QuoteBoard::new();
        board.apply(quote("EURUSD", 1, 2));
        board.apply(quote("USDJPY", 1, 2));

        board.retain_symbols(&["USDJPY".to_string()]);
        assert!(board.get("EURUSD").is_none());
        assert!(board.get("USDJPY").is_some());

        board.clear();
        assert!(board.is_empty());
    }
}
