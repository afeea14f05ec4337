//! Latest ticker per symbol.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::types::{Symbol, Ticker};

/// Latest [`Ticker`] per symbol
///
/// Each update replaces the stored ticker; fields are never merged.
#[derive(Debug, Default)]
pub struct TickerCache {
    tickers: RwLock<FxHashMap<Symbol, Arc<Ticker>>>,
}

impl TickerCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `ticker` as the latest for its symbol
    pub fn set(&self, ticker: Ticker) -> Arc<Ticker> {
        let ticker = Arc::new(ticker);
        self.tickers
            .write()
            .insert(ticker.symbol.clone(), Arc::clone(&ticker));
        ticker
    }

    /// Get the latest ticker, or `None` if none has arrived yet
    pub fn get(&self, symbol: &Symbol) -> Option<Arc<Ticker>> {
        self.tickers.read().get(symbol).cloned()
    }

    /// Get number of symbols with a ticker
    pub fn len(&self) -> usize {
        self.tickers.read().len()
    }

    /// Check if no ticker has arrived yet
    pub fn is_empty(&self) -> bool {
        self.tickers.read().is_empty()
    }
}
