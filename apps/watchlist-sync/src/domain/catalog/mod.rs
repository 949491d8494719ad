//! Symbol Catalog Types
//!
//! A catalog is the full list of tradable symbols available to an account.
//! Records are immutable once received and the whole list is replaced on
//! every refresh.
//!
//! The cache format mirrors the field names used by the web client
//! (`Symbol`, `Group`, `Description`, ...), so a cache written by either
//! client can be read by the other.

use serde::{Deserialize, Serialize};

/// A symbol identifier such as `EURUSD`.
pub type Symbol = String;

/// Placeholder used for missing textual catalog fields.
pub const NOT_AVAILABLE: &str = "N/A";

/// One tradable instrument from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SymbolRecord {
    /// Unique, stable symbol key.
    #[serde(rename = "Symbol")]
    pub symbol: Symbol,
    /// Instrument group (Forex, Crypto, ...).
    pub group: String,
    /// Human readable description.
    pub description: String,
    /// Swap charged on short positions.
    pub swap_short: f64,
    /// Swap charged on long positions.
    pub swap_long: f64,
    /// Units per lot.
    pub contract_size: f64,
    /// Quote currency.
    pub currency: String,
}

impl SymbolRecord {
    /// Build a record for `symbol` with every optional field defaulted.
    #[must_use]
    pub fn with_defaults(symbol: impl Into<Symbol>) -> Self {
        let symbol = symbol.into();
        Self {
            description: default_description(&symbol),
            symbol,
            group: NOT_AVAILABLE.to_string(),
            swap_short: 0.0,
            swap_long: 0.0,
            contract_size: 0.0,
            currency: NOT_AVAILABLE.to_string(),
        }
    }

    /// Case-insensitive match against the symbol and its description.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.symbol.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }
}

/// Description used when the server omits one.
#[must_use]
pub fn default_description(symbol: &str) -> String {
    format!("{symbol} description")
}

/// Static dataset used whenever the live catalog cannot be obtained in time.
#[must_use]
pub fn fallback_symbols() -> Vec<SymbolRecord> {
    FALLBACK
        .iter()
        .map(
            |&(symbol, group, description, swap_short, swap_long, contract_size, currency)| {
                SymbolRecord {
                    symbol: symbol.to_string(),
                    group: group.to_string(),
                    description: description.to_string(),
                    swap_short,
                    swap_long,
                    contract_size,
                    currency: currency.to_string(),
                }
            },
        )
        .collect()
}

type FallbackRow = (&'static str, &'static str, &'static str, f64, f64, f64, &'static str);

const FALLBACK: [FallbackRow; 10] = [
    ("EURUSD", "Forex", "Euro vs US Dollar", -0.8, -0.7, 100_000.0, "USD"),
    ("USDJPY", "Forex", "US Dollar vs Japanese Yen", -0.4, -0.3, 100_000.0, "JPY"),
    ("GBPUSD", "Forex", "British Pound vs US Dollar", -0.6, -0.5, 100_000.0, "USD"),
    ("AUDUSD", "Forex", "Australian Dollar vs US Dollar", -0.5, -0.4, 100_000.0, "USD"),
    ("USDCAD", "Forex", "US Dollar vs Canadian Dollar", -0.3, -0.2, 100_000.0, "CAD"),
    ("EURGBP", "Forex", "Euro vs British Pound", -0.4, -0.3, 100_000.0, "GBP"),
    ("BTCUSD", "Crypto", "Bitcoin vs US Dollar", -25.0, -22.5, 1.0, "USD"),
    ("ETHUSD", "Crypto", "Ethereum vs US Dollar", -1.5, -1.2, 1.0, "USD"),
    ("XAUUSD", "Metals", "Gold vs US Dollar", -2.5, -2.0, 100.0, "USD"),
    ("XAGUSD", "Metals", "Silver vs US Dollar", -0.15, -0.12, 5_000.0, "USD"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_dataset_is_non_empty_and_unique() {
        let symbols = fallback_symbols();
        assert_eq!(symbols.len(), 10);

        let mut ids: Vec<_> = symbols.iter().map(|s| s.symbol.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
        assert_eq!(symbols[0].symbol, "EURUSD");
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let record = SymbolRecord::with_defaults("NZDUSD");
        assert_eq!(record.description, "NZDUSD description");
        assert_eq!(record.group, "N/A");
        assert_eq!(record.currency, "N/A");
        assert!(record.swap_short.abs() < f64::EPSILON);
        assert!(record.contract_size.abs() < f64::EPSILON);
    }

    #[test]
    fn matches_symbol_or_description() {
        let gold = &fallback_symbols()[8];
        assert!(gold.matches("xau"));
        assert!(gold.matches("GOLD"));
        assert!(gold.matches("  "));
        assert!(!gold.matches("silver"));
    }

    #[test]
    fn cache_format_uses_pascal_case_keys() {
        let json = serde_json::to_value(SymbolRecord::with_defaults("EURUSD")).unwrap();
        assert_eq!(json["Symbol"], "EURUSD");
        assert_eq!(json["Group"], "N/A");
        assert!(json.get("SwapShort").is_some());
        assert!(json.get("ContractSize").is_some());
    }
}
