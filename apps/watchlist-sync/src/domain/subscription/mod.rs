//! Subscription Set
//!
//! The user's chosen subset of the catalog for which live quotes are
//! requested.
//!
//! # Design
//!
//! The set is ordered by insertion and never holds duplicates. Insertion
//! order is the display order used for symbols that are not (yet) in the
//! catalog. Quote stream comparisons go through [`SymbolSetKey`], which is
//! order-insensitive, so reordering the same symbols never forces a
//! reconnect.

use serde::{Deserialize, Serialize};

use super::catalog::{Symbol, SymbolRecord};

// =============================================================================
// Subscription Set
// =============================================================================

/// Ordered, deduplicated set of subscribed symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Symbol>", into = "Vec<Symbol>")]
pub struct SubscriptionSet {
    symbols: Vec<Symbol>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            symbols: Vec::new(),
        }
    }

    /// Default subscriptions: the first `count` symbols in catalog order.
    #[must_use]
    pub fn seeded_from(catalog: &[SymbolRecord], count: usize) -> Self {
        catalog
            .iter()
            .take(count)
            .map(|record| record.symbol.clone())
            .collect()
    }

    /// Membership query.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Add `symbol` at the end. Returns false if it was already present.
    pub fn insert(&mut self, symbol: impl Into<Symbol>) -> bool {
        let symbol = symbol.into();
        if self.contains(&symbol) {
            return false;
        }
        self.symbols.push(symbol);
        true
    }

    /// Remove `symbol`. Returns false if it was not present.
    pub fn remove(&mut self, symbol: &str) -> bool {
        let before = self.symbols.len();
        self.symbols.retain(|s| s != symbol);
        self.symbols.len() != before
    }

    /// Flip membership of `symbol`. Returns the new membership.
    pub fn toggle(&mut self, symbol: &str) -> bool {
        if self.remove(symbol) {
            false
        } else {
            self.symbols.push(symbol.to_string());
            true
        }
    }

    /// Remove every symbol.
    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    /// Symbols in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Number of subscribed symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True when nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl FromIterator<Symbol> for SubscriptionSet {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        let mut set = Self::new();
        for symbol in iter {
            set.insert(symbol);
        }
        set
    }
}

impl From<Vec<Symbol>> for SubscriptionSet {
    fn from(symbols: Vec<Symbol>) -> Self {
        symbols.into_iter().collect()
    }
}

impl From<SubscriptionSet> for Vec<Symbol> {
    fn from(set: SubscriptionSet) -> Self {
        set.symbols
    }
}

// =============================================================================
// Order-insensitive key
// =============================================================================

/// Canonical (sorted, deduplicated) form of a requested symbol set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SymbolSetKey(Vec<Symbol>);

impl SymbolSetKey {
    /// Build the key for `symbols`.
    #[must_use]
    pub fn new(symbols: &[Symbol]) -> Self {
        let mut sorted = symbols.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        Self(sorted)
    }

    /// True for the empty set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted symbols.
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }
}
