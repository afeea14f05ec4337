//! Core order book data structure.

use rust_decimal::Decimal;
use serde_json::Value;

use super::delta::apply_deltas;
use super::side::{BookSide, PriceLevel, SideKind};
use crate::types::{iso8601, Symbol, TimestampMs};

/// Order book for a single Coinone market.
///
/// Coinone sends complete snapshots, so a book is never patched across
/// messages: [`OrderBook::reset_with`] clears both sides before the new
/// levels are applied.
///
/// # Thread Safety
///
/// This struct is `Send + Sync` but not internally synchronized. The
/// [`OrderBookStore`](super::OrderBookStore) wraps each book in its own
/// mutex and only hands out clones.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBook {
    /// Unified symbol
    pub symbol: Symbol,
    /// Buy levels, best (highest) first
    pub bids: BookSide,
    /// Sell levels, best (lowest) first
    pub asks: BookSide,
    /// Exchange timestamp of the last snapshot (Unix ms)
    pub timestamp: Option<TimestampMs>,
    /// ISO-8601 form of `timestamp`
    pub datetime: Option<String>,
    /// Exchange snapshot id (`data.id`)
    pub nonce: Option<String>,
    /// Raw `data` payload of the last snapshot
    pub info: Value,
}

impl OrderBook {
    /// Create a new empty order book
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BookSide::new(SideKind::Bids),
            asks: BookSide::new(SideKind::Asks),
            timestamp: None,
            datetime: None,
            nonce: None,
            info: Value::Null,
        }
    }

    /// Replace the whole book with a snapshot
    ///
    /// Both sides are cleared, then `bids` and `asks` are applied. Levels
    /// from the previous snapshot survive only if they are repeated.
    pub fn reset_with(
        &mut self,
        bids: &[PriceLevel],
        asks: &[PriceLevel],
        timestamp: Option<TimestampMs>,
        nonce: Option<String>,
        info: Value,
    ) {
        self.bids.clear();
        self.asks.clear();
        apply_deltas(&mut self.bids, bids);
        apply_deltas(&mut self.asks, asks);
        self.timestamp = timestamp;
        self.datetime = timestamp.and_then(iso8601);
        self.nonce = nonce;
        self.info = info;
    }

    /// Get the best bid (highest bid)
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best()
    }

    /// Get the best ask (lowest ask)
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best()
    }

    /// Get the spread (best ask - best bid)
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        }
    }

    /// Check if the book is crossed (best bid >= best ask)
    ///
    /// This shouldn't happen in a healthy market but is useful for validation.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    /// Project the top `limit` levels of each side; `None` keeps every level
    #[must_use]
    pub fn limit(&self, limit: Option<usize>) -> OrderBookView {
        OrderBookView {
            symbol: self.symbol.clone(),
            bids: self.bids.top(limit),
            asks: self.asks.top(limit),
            timestamp: self.timestamp,
            datetime: self.datetime.clone(),
            nonce: self.nonce.clone(),
            info: self.info.clone(),
        }
    }

    /// Check if the order book is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Get the number of price levels as `(bids, asks)`
    #[must_use]
    pub fn num_levels(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }
}

/// Depth-limited, best-first copy of an [`OrderBook`]
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookView {
    /// Unified symbol
    pub symbol: Symbol,
    /// Bid levels, highest price first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, lowest price first
    pub asks: Vec<PriceLevel>,
    /// Exchange timestamp (Unix ms)
    pub timestamp: Option<TimestampMs>,
    /// ISO-8601 form of `timestamp`
    pub datetime: Option<String>,
    /// Exchange snapshot id
    pub nonce: Option<String>,
    /// Raw `data` payload
    pub info: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn book_with(bids: &[PriceLevel], asks: &[PriceLevel]) -> OrderBook {
        let mut book = OrderBook::new("BTC/KRW".into());
        book.reset_with(bids, asks, Some(1705288918649), Some("1".into()), json!({}));
        book
    }

    #[test]
    fn test_new_orderbook() {
        let book = OrderBook::new("BTC/KRW".into());
        assert_eq!(book.symbol.as_str(), "BTC/KRW");
        assert!(book.is_empty());
        assert_eq!(book.timestamp, None);
    }

    #[test]
    fn test_reset_replaces_everything() {
        let mut book = book_with(&[(dec!(100), dec!(1))], &[(dec!(110), dec!(1))]);
        book.reset_with(
            &[(dec!(98), dec!(2))],
            &[(dec!(112), dec!(2))],
            Some(1705288918650),
            None,
            json!({"id": "2"}),
        );

        assert_eq!(book.bids.get(&dec!(100)), None);
        assert_eq!(book.asks.get(&dec!(110)), None);
        assert_eq!(book.best_bid(), Some((dec!(98), dec!(2))));
        assert_eq!(book.best_ask(), Some((dec!(112), dec!(2))));
        assert_eq!(book.timestamp, Some(1705288918650));
        assert_eq!(book.datetime.as_deref(), Some("2024-01-15T03:21:58.650Z"));
        assert_eq!(book.info, json!({"id": "2"}));
    }

    #[test]
    fn test_spread_and_crossed() {
        let book = book_with(&[(dec!(100), dec!(1))], &[(dec!(102.5), dec!(1))]);
        assert_eq!(book.spread(), Some(dec!(2.5)));
        assert!(!book.is_crossed());

        let crossed = book_with(&[(dec!(103), dec!(1))], &[(dec!(102), dec!(1))]);
        assert!(crossed.is_crossed());
    }

    #[test]
    fn test_limit_is_a_projection() {
        let book = book_with(
            &[(dec!(100), dec!(1)), (dec!(99), dec!(2)), (dec!(98), dec!(3))],
            &[(dec!(101), dec!(1)), (dec!(102), dec!(2))],
        );

        let view = book.limit(Some(2));
        assert_eq!(view.bids, vec![(dec!(100), dec!(1)), (dec!(99), dec!(2))]);
        assert_eq!(view.asks, vec![(dec!(101), dec!(1)), (dec!(102), dec!(2))]);

        let full = book.limit(None);
        assert_eq!(full.bids.len(), 3);
        assert_eq!(book.num_levels(), (3, 2));
    }
}
