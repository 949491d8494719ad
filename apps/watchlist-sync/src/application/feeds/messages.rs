//! Wire Messages
//!
//! Frames exchanged with the realtime endpoints. Inbound frames are tagged
//! by `msgType`; anything we do not recognise decodes to
//! [`InboundFrame::Other`] and is ignored by the feeds.
//!
//! ```text
//! → {"commandCode":"2088","notSendQuotes":"1"}
//! ← {"msgType":"symbols","symbolsArray":[{"symbolName":"EURUSD",...}]}
//! → {"requestType":"tickers","symbols":["EURUSD","USDJPY"]}
//! ← {"msgType":"quote","quoteDetails":{"symbol":"EURUSD","bid":"1.1","ask":"1.2",...}}
//! ```

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::catalog::{NOT_AVAILABLE, Symbol, SymbolRecord, default_description};
use crate::domain::quote::Quote;

// =============================================================================
// Outbound
// =============================================================================

/// Command code asking the session endpoint for the symbol list.
pub const CATALOG_COMMAND_CODE: &str = "2088";

/// Request for the full symbol catalog, without a quote snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRequest {
    command_code: &'static str,
    not_send_quotes: &'static str,
}

impl Default for CatalogRequest {
    fn default() -> Self {
        Self {
            command_code: CATALOG_COMMAND_CODE,
            not_send_quotes: "1",
        }
    }
}

/// Subscribe to quotes for a fixed set of symbols.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSubscribeRequest<'a> {
    request_type: &'static str,
    symbols: &'a [Symbol],
}

impl<'a> QuoteSubscribeRequest<'a> {
    /// Build a `tickers` request for `symbols`.
    #[must_use]
    pub const fn tickers(symbols: &'a [Symbol]) -> Self {
        Self {
            request_type: "tickers",
            symbols,
        }
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Full symbol catalog.
    Catalog(Vec<SymbolRecord>),
    /// One quote update.
    Quote(QuoteDetails),
    /// Any other frame.
    Other,
}

/// Frame decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A recognised frame had an unexpected shape.
    #[error("malformed {kind} frame: {source}")]
    Malformed {
        /// `msgType` of the frame.
        kind: &'static str,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(tag = "msgType")]
enum TaggedFrame {
    #[serde(rename = "symbols")]
    Symbols {
        #[serde(rename = "symbolsArray")]
        symbols_array: Vec<serde_json::Value>,
    },
    #[serde(rename = "quote")]
    Quote {
        #[serde(rename = "quoteDetails")]
        quote_details: serde_json::Value,
    },
}

impl InboundFrame {
    /// Decode one parsed JSON frame.
    ///
    /// Catalog entries that cannot be read are skipped individually; a
    /// catalog frame never fails as a whole because of one bad entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a quote frame carries unreadable details.
    pub fn decode(value: serde_json::Value) -> Result<Self, FrameError> {
        let Ok(tagged) = serde_json::from_value::<TaggedFrame>(value) else {
            return Ok(Self::Other);
        };

        match tagged {
            TaggedFrame::Symbols { symbols_array } => {
                let records = symbols_array
                    .into_iter()
                    .filter_map(|entry| match serde_json::from_value::<RawSymbol>(entry) {
                        Ok(raw) => raw.into_record(),
                        Err(e) => {
                            tracing::debug!(error = %e, "Skipping unreadable catalog entry");
                            None
                        }
                    })
                    .collect();
                Ok(Self::Catalog(records))
            }
            TaggedFrame::Quote { quote_details } => serde_json::from_value(quote_details)
                .map(Self::Quote)
                .map_err(|source| FrameError::Malformed {
                    kind: "quote",
                    source,
                }),
        }
    }
}

/// Catalog entry as sent by the server. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSymbol {
    /// Symbol id.
    #[serde(rename = "symbolName", default)]
    pub symbol_name: Option<String>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Group.
    #[serde(rename = "Group", default)]
    pub group: Option<String>,
    /// Short swap.
    #[serde(rename = "SwapShort", default, deserialize_with = "lenient_f64")]
    pub swap_short: Option<f64>,
    /// Long swap.
    #[serde(rename = "SwapLong", default, deserialize_with = "lenient_f64")]
    pub swap_long: Option<f64>,
    /// Contract size.
    #[serde(rename = "ContractSize", default, deserialize_with = "lenient_f64")]
    pub contract_size: Option<f64>,
    /// Currency.
    #[serde(rename = "Currency", default)]
    pub currency: Option<String>,
}

impl RawSymbol {
    /// Fill defaults for missing fields. Entries without a symbol id are
    /// dropped.
    #[must_use]
    pub fn into_record(self) -> Option<SymbolRecord> {
        let symbol = non_empty(self.symbol_name)?;
        Some(SymbolRecord {
            description: non_empty(self.description)
                .unwrap_or_else(|| default_description(&symbol)),
            group: non_empty(self.group).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            swap_short: self.swap_short.unwrap_or_default(),
            swap_long: self.swap_long.unwrap_or_default(),
            contract_size: self.contract_size.unwrap_or_default(),
            currency: non_empty(self.currency).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            symbol,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Accepts a JSON number, a numeric string, or null. Anything else is `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Quote update as sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuoteDetails {
    /// Symbol id.
    pub symbol: Symbol,
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// Server timestamp.
    #[serde(default)]
    pub date: String,
    /// Venue name.
    #[serde(default, alias = "ExchangeName")]
    pub venue: String,
}

impl QuoteDetails {
    /// Stamp with the local receive time.
    #[must_use]
    pub fn into_quote(self) -> Quote {
        Quote {
            symbol: self.symbol,
            bid: self.bid,
            ask: self.ask,
            timestamp: self.date,
            venue: self.venue,
            received_at: Utc::now(),
        }
    }
}
