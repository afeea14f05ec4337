//! One side of an order book.
//!
//! Levels live in a `BTreeMap` keyed by price, which gives:
//!
//! - O(log n) insertion, deletion, and lookup
//! - O(1) access to the best level from either end
//! - Ordered iteration for depth-of-book queries

use std::collections::BTreeMap;

use rust_decimal::Decimal;

/// A `(price, size)` pair
pub type PriceLevel = (Decimal, Decimal);

/// Which side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideKind {
    /// Buy orders, best = highest price
    Bids,
    /// Sell orders, best = lowest price
    Asks,
}

/// Price-indexed levels of one book side
///
/// Never contains a zero-size level: storing size 0 removes the price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSide {
    kind: SideKind,
    /// price -> size, sorted ascending by price
    levels: BTreeMap<Decimal, Decimal>,
}

impl BookSide {
    /// Create an empty side
    #[must_use]
    pub fn new(kind: SideKind) -> Self {
        Self {
            kind,
            levels: BTreeMap::new(),
        }
    }

    /// Get the side kind
    #[must_use]
    pub fn kind(&self) -> SideKind {
        self.kind
    }

    /// Set a price level; size 0 removes it
    pub fn store(&mut self, price: Decimal, size: Decimal) {
        if size.is_zero() {
            self.levels.remove(&price);
        } else {
            self.levels.insert(price, size);
        }
    }

    /// Get the size resting at `price`
    #[must_use]
    pub fn get(&self, price: &Decimal) -> Option<Decimal> {
        self.levels.get(price).copied()
    }

    /// Get the best level (highest bid or lowest ask)
    #[must_use]
    pub fn best(&self) -> Option<PriceLevel> {
        match self.kind {
            SideKind::Bids => self.levels.last_key_value(),
            SideKind::Asks => self.levels.first_key_value(),
        }
        .map(|(&p, &s)| (p, s))
    }

    /// Iterate levels best first
    pub fn iter(&self) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let levels = self.levels.iter().map(|(&p, &s)| (p, s));
        match self.kind {
            SideKind::Bids => Box::new(levels.rev()),
            SideKind::Asks => Box::new(levels),
        }
    }

    /// Get the top `limit` levels best first; `None` returns every level
    #[must_use]
    pub fn top(&self, limit: Option<usize>) -> Vec<PriceLevel> {
        match limit {
            Some(n) => self.iter().take(n).collect(),
            None => self.iter().collect(),
        }
    }

    /// Total size across all levels
    #[must_use]
    pub fn total_size(&self) -> Decimal {
        self.levels.values().copied().sum()
    }

    /// Remove every level
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Number of price levels
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the side has no levels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bids_are_descending() {
        let mut bids = BookSide::new(SideKind::Bids);
        bids.store(dec!(100), dec!(1));
        bids.store(dec!(102), dec!(2));
        bids.store(dec!(101), dec!(3));

        assert_eq!(bids.best(), Some((dec!(102), dec!(2))));
        let prices: Vec<_> = bids.iter().map(|(p, _)| p).collect();
        assert_eq!(prices, vec![dec!(102), dec!(101), dec!(100)]);
    }

    #[test]
    fn test_asks_are_ascending() {
        let mut asks = BookSide::new(SideKind::Asks);
        asks.store(dec!(105), dec!(1));
        asks.store(dec!(103), dec!(2));

        assert_eq!(asks.best(), Some((dec!(103), dec!(2))));
        assert_eq!(asks.top(Some(1)), vec![(dec!(103), dec!(2))]);
        assert_eq!(asks.top(None).len(), 2);
    }

    #[test]
    fn test_zero_size_removes() {
        let mut asks = BookSide::new(SideKind::Asks);
        asks.store(dec!(103), dec!(2));
        asks.store(dec!(103), dec!(0.000));
        assert!(asks.is_empty());

        // Removing an absent level is a no-op
        asks.store(dec!(999), Decimal::ZERO);
        assert!(asks.is_empty());
    }

    #[test]
    fn test_total_size() {
        let mut bids = BookSide::new(SideKind::Bids);
        bids.store(dec!(1), dec!(0.5));
        bids.store(dec!(2), dec!(0.25));
        assert_eq!(bids.total_size(), dec!(0.75));
    }
}
