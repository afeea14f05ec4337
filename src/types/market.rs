//! Markets and currency pair resolution.
//!
//! Coinone identifies a market by the pair of exchange currency ids
//! (`target_currency`, `quote_currency`). [`MarketResolver`] turns that pair
//! into a unified [`Symbol`] and maps a unified symbol back to the ids needed
//! for a subscribe request.

use rustc_hash::FxHashMap;

use super::Symbol;
use crate::error::Error;

/// Exchange currency ids renamed to their common unified codes
const COMMON_CURRENCIES: &[(&str, &str)] = &[("XBT", "BTC"), ("BCC", "BCH"), ("BCHSV", "BSV")];

/// A spot market
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    /// Unified symbol (e.g., "BTC/KRW")
    pub symbol: Symbol,
    /// Unified base currency code
    pub base: String,
    /// Unified quote currency code
    pub quote: String,
    /// Exchange id of the base currency (`target_currency`)
    pub base_id: String,
    /// Exchange id of the quote currency (`quote_currency`)
    pub quote_id: String,
}

impl Market {
    /// Create a market whose exchange ids equal its unified codes
    pub fn new(base: &str, quote: &str) -> Self {
        let base = base.to_uppercase();
        let quote = quote.to_uppercase();
        Self {
            symbol: Symbol::from_codes(&base, &quote),
            base_id: base.clone(),
            quote_id: quote.clone(),
            base,
            quote,
        }
    }
}

/// Resolution of exchange currency ids to unified markets
///
/// Implementations must be cheap and non-blocking; the router calls
/// [`resolve`](MarketResolver::resolve) once per data frame.
pub trait MarketResolver: Send + Sync {
    /// Resolve a `(target_currency, quote_currency)` pair to a unified symbol
    ///
    /// # Errors
    ///
    /// Returns [`Error::MarketResolution`] if the pair is not a known market.
    fn resolve(&self, base_id: &str, quote_id: &str) -> Result<Symbol, Error>;

    /// Look up the market for a unified symbol
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadSymbol`] if no market is registered for `symbol`.
    fn market(&self, symbol: &str) -> Result<Market, Error>;
}

/// Table-backed [`MarketResolver`]
///
/// Exchange ids are matched case-insensitively and common aliases (such as
/// `XBT`) are normalized before a unified symbol is built.
///
/// # Example
///
/// ```rust
/// use coinone_stream::types::{MarketResolver, Markets};
///
/// let markets = Markets::from_pairs(&[("BTC", "KRW"), ("ETH", "KRW")]);
/// let symbol = markets.resolve("btc", "krw").unwrap();
/// assert_eq!(symbol.as_str(), "BTC/KRW");
/// ```
#[derive(Debug, Default, Clone)]
pub struct Markets {
    by_ids: FxHashMap<(String, String), Market>,
    by_symbol: FxHashMap<Symbol, Market>,
}

impl Markets {
    /// Create an empty market table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table from `(base_id, quote_id)` pairs
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut markets = Self::new();
        for (base_id, quote_id) in pairs {
            markets.insert_pair(base_id, quote_id);
        }
        markets
    }

    /// Register a market by its exchange ids
    ///
    /// The unified codes are derived with [`Markets::common_currency_code`].
    pub fn insert_pair(&mut self, base_id: &str, quote_id: &str) -> &Market {
        let base_id = base_id.to_uppercase();
        let quote_id = quote_id.to_uppercase();
        let base = Self::common_currency_code(&base_id);
        let quote = Self::common_currency_code(&quote_id);
        let market = Market {
            symbol: Symbol::from_codes(&base, &quote),
            base,
            quote,
            base_id,
            quote_id,
        };
        self.insert(market)
    }

    /// Register a fully specified market
    pub fn insert(&mut self, market: Market) -> &Market {
        self.by_symbol
            .insert(market.symbol.clone(), market.clone());
        let key = (market.base_id.clone(), market.quote_id.clone());
        self.by_ids.insert(key.clone(), market);
        &self.by_ids[&key]
    }

    /// Number of registered markets
    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    /// Check if no markets are registered
    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Map an upper-cased exchange currency id to its unified code
    pub fn common_currency_code(id: &str) -> String {
        COMMON_CURRENCIES
            .iter()
            .find(|(alias, _)| *alias == id)
            .map(|(_, code)| (*code).to_string())
            .unwrap_or_else(|| id.to_string())
    }
}

impl MarketResolver for Markets {
    fn resolve(&self, base_id: &str, quote_id: &str) -> Result<Symbol, Error> {
        let key = (base_id.to_uppercase(), quote_id.to_uppercase());
        self.by_ids
            .get(&key)
            .map(|m| m.symbol.clone())
            .ok_or_else(|| Error::MarketResolution {
                base: key.0,
                quote: key.1,
            })
    }

    fn market(&self, symbol: &str) -> Result<Market, Error> {
        self.by_symbol
            .get(&Symbol::from(symbol))
            .cloned()
            .ok_or_else(|| Error::BadSymbol(symbol.to_string()))
    }
}
