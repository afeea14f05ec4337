//! Order book store for handling multiple markets.
//!
//! This module provides [`OrderBookStore`], a thread-safe container holding
//! one [`OrderBook`] per symbol.
//!
//! # Design
//!
//! The outer map sits behind a `parking_lot::RwLock` that is only taken for
//! writing when a symbol is seen for the first time. Each book has its own
//! `Mutex`, so updates for one symbol are serialized even if several
//! connections route into the same store, while other symbols proceed
//! independently.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

use super::delta::parse_levels;
use super::{OrderBook, OrderBookView};
use crate::error::Error;
use crate::types::messages::RawLevel;
use crate::types::{Symbol, TimestampMs};

/// Manager for the order books of every symbol seen on the stream.
///
/// # Thread Safety
///
/// The store is safe to share across threads via `Arc<OrderBookStore>`.
/// Readers always receive clones, never references into live state.
///
/// # Example
///
/// ```rust
/// use coinone_stream::orderbook::OrderBookStore;
/// use coinone_stream::types::messages::RawLevel;
///
/// let store = OrderBookStore::new();
/// let symbol = "BTC/KRW".into();
/// store
///     .apply_snapshot(
///         &symbol,
///         &[RawLevel::new("58292000", "0.1045")],
///         &[RawLevel::new("58412000", "0.59919807")],
///         Some(1705288918649),
///         None,
///         serde_json::Value::Null,
///     )
///     .unwrap();
///
/// let view = store.limited_view(&symbol, Some(1)).unwrap();
/// assert_eq!(view.bids.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct OrderBookStore {
    /// Order books by unified symbol
    books: RwLock<FxHashMap<Symbol, Mutex<OrderBook>>>,
}

impl OrderBookStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a full snapshot for `symbol`
    ///
    /// Both sides are parsed before any state changes, then the book is
    /// created if needed, fully reset and refilled.
    ///
    /// # Returns
    ///
    /// An immutable copy of the updated book, ready to publish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if any level fails to parse; the
    /// stored book is left as it was.
    pub fn apply_snapshot(
        &self,
        symbol: &Symbol,
        bids: &[RawLevel],
        asks: &[RawLevel],
        timestamp: Option<TimestampMs>,
        nonce: Option<String>,
        info: Value,
    ) -> Result<Arc<OrderBook>, Error> {
        let bids = parse_levels(bids)?;
        let asks = parse_levels(asks)?;

        let update = |book: &mut OrderBook| {
            book.reset_with(&bids, &asks, timestamp, nonce, info);
            trace!(
                symbol = %book.symbol,
                bids = book.bids.len(),
                asks = book.asks.len(),
                "Order book reset"
            );
            Arc::new(book.clone())
        };

        {
            let books = self.books.read();
            if let Some(book) = books.get(symbol) {
                return Ok(update(&mut *book.lock()));
            }
        }

        let mut books = self.books.write();
        let book = books
            .entry(symbol.clone())
            .or_insert_with(|| Mutex::new(OrderBook::new(symbol.clone())));
        let snapshot = update(book.get_mut());
        Ok(snapshot)
    }

    /// Get a copy of the order book for `symbol`
    pub fn get(&self, symbol: &Symbol) -> Option<OrderBook> {
        let books = self.books.read();
        books.get(symbol).map(|b| b.lock().clone())
    }

    /// Get the top `limit` levels per side for `symbol`
    ///
    /// `None` returns every level. Does not modify the stored book.
    pub fn limited_view(&self, symbol: &Symbol, limit: Option<usize>) -> Option<OrderBookView> {
        let books = self.books.read();
        books.get(symbol).map(|b| b.lock().limit(limit))
    }

    /// Get number of tracked symbols
    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    /// Check if no symbol has received a snapshot yet
    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }

    /// Get all tracked symbols
    pub fn symbols(&self) -> Vec<Symbol> {
        self.books.read().keys().cloned().collect()
    }
}
