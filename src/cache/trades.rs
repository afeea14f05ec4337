//! Bounded trade history per symbol.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::types::{Symbol, TimestampMs, Trade};

/// Most recent trades of one symbol, oldest first
///
/// Holds at most `capacity` trades; appending past the cap drops from the
/// front. The history also counts every trade it has ever accepted, which
/// lets readers work out how many trades are new since they last looked.
///
/// Trades are shared between clones, so copying a history copies pointers.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeHistory {
    symbol: Symbol,
    capacity: usize,
    trades: VecDeque<Arc<Trade>>,
    appended: u64,
}

impl TradeHistory {
    /// Create an empty history holding up to `capacity` trades
    ///
    /// A capacity of 0 is treated as 1.
    #[must_use]
    pub fn new(symbol: Symbol, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol,
            capacity,
            trades: VecDeque::with_capacity(capacity.min(1024)),
            appended: 0,
        }
    }

    /// Append a trade, evicting the oldest ones past the cap
    pub fn push(&mut self, trade: Trade) {
        self.trades.push_back(Arc::new(trade));
        self.appended += 1;
        while self.trades.len() > self.capacity {
            self.trades.pop_front();
        }
    }

    /// Get the symbol
    #[must_use]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Get the cap
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of trades ever appended, including evicted ones
    #[must_use]
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Number of held trades appended after the reader saw `seen` in total
    #[must_use]
    pub fn new_since(&self, seen: u64) -> usize {
        let fresh = self.appended.saturating_sub(seen);
        usize::try_from(fresh).map_or(self.trades.len(), |n| n.min(self.trades.len()))
    }

    /// Iterate trades oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Trade> + '_ {
        self.trades.iter().map(|trade| trade.as_ref())
    }

    /// Get the most recent trade
    #[must_use]
    pub fn last(&self) -> Option<&Trade> {
        self.trades.back().map(Arc::as_ref)
    }

    /// Copy the trades into a vector, oldest first
    #[must_use]
    pub fn to_vec(&self) -> Vec<Trade> {
        self.iter().cloned().collect()
    }

    /// Number of held trades
    #[must_use]
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Check if no trade is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

/// Trade histories for every symbol seen on the stream
#[derive(Debug)]
pub struct TradeCache {
    limit: usize,
    histories: RwLock<FxHashMap<Symbol, Mutex<TradeHistory>>>,
}

impl TradeCache {
    /// Create a cache whose histories hold up to `limit` trades
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            histories: RwLock::new(FxHashMap::default()),
        }
    }

    /// Get the per-symbol cap
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append a trade to its symbol's history, creating the history if needed
    ///
    /// # Returns
    ///
    /// An immutable copy of the whole updated history. The copy shares its
    /// trades with the cached history.
    pub fn append(&self, trade: Trade) -> Arc<TradeHistory> {
        let symbol = trade.symbol.clone();
        let update = |history: &mut TradeHistory| {
            history.push(trade);
            Arc::new(history.clone())
        };

        {
            let histories = self.histories.read();
            if let Some(history) = histories.get(&symbol) {
                return update(&mut *history.lock());
            }
        }

        let mut histories = self.histories.write();
        let history = histories
            .entry(symbol.clone())
            .or_insert_with(|| Mutex::new(TradeHistory::new(symbol, self.limit)));
        update(history.get_mut())
    }

    /// Get a copy of the history for `symbol`
    pub fn get(&self, symbol: &Symbol) -> Option<TradeHistory> {
        self.histories.read().get(symbol).map(|h| h.lock().clone())
    }

    /// Get number of symbols with at least one trade
    pub fn len(&self) -> usize {
        self.histories.read().len()
    }

    /// Check if no trade has arrived yet
    pub fn is_empty(&self) -> bool {
        self.histories.read().is_empty()
    }
}

/// Select trades at or after `since`, keeping at most `limit`
///
/// With `tail` set the most recent `limit` trades are kept, otherwise the
/// oldest. Order is preserved either way. Trades without a timestamp never
/// pass a `since` filter.
pub fn filter_by_since_limit<'a, I>(
    trades: I,
    since: Option<TimestampMs>,
    limit: Option<usize>,
    tail: bool,
) -> Vec<Trade>
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut selected: Vec<Trade> = trades
        .into_iter()
        .filter(|t| match since {
            Some(since) => t.timestamp.is_some_and(|ts| ts >= since),
            None => true,
        })
        .cloned()
        .collect();

    if let Some(limit) = limit {
        if selected.len() > limit {
            if tail {
                selected.drain(..selected.len() - limit);
            } else {
                selected.truncate(limit);
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trade(id: u32, timestamp: TimestampMs) -> Trade {
        let data = json!({
            "id": id.to_string(),
            "timestamp": timestamp,
            "price": "100",
            "qty": "1",
            "is_seller_maker": false
        });
        Trade::from_data("BTC/KRW".into(), data.as_object().unwrap()).unwrap()
    }

    fn ids(trades: &[Trade]) -> Vec<String> {
        trades.iter().filter_map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_history_is_bounded() {
        let cap = 5;
        let mut history = TradeHistory::new("BTC/KRW".into(), cap);
        for i in 0..(cap as u32 + 3) {
            history.push(trade(i, i as i64));
        }

        assert_eq!(history.len(), cap);
        assert_eq!(history.appended(), 8);
        assert_eq!(ids(&history.to_vec()), vec!["3", "4", "5", "6", "7"]);
    }

    #[test]
    fn test_new_since() {
        let mut history = TradeHistory::new("BTC/KRW".into(), 3);
        for i in 0..2 {
            history.push(trade(i, 0));
        }
        assert_eq!(history.new_since(0), 2);
        assert_eq!(history.new_since(2), 0);

        for i in 2..10 {
            history.push(trade(i, 0));
        }
        assert_eq!(history.new_since(2), 3);
        assert_eq!(history.new_since(9), 1);
    }

    #[test]
    fn test_cache_creates_history_lazily() {
        let cache = TradeCache::new(2);
        assert!(cache.get(&"BTC/KRW".into()).is_none());

        cache.append(trade(1, 1));
        cache.append(trade(2, 2));
        let history = cache.append(trade(3, 3));

        assert_eq!(history.capacity(), 2);
        assert_eq!(ids(&history.to_vec()), vec!["2", "3"]);
        assert_eq!(cache.get(&"BTC/KRW".into()).unwrap(), *history);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_snapshots_share_trades() {
        let cache = TradeCache::new(1000);
        let first = cache.append(trade(1, 1));
        let second = cache.append(trade(2, 2));

        assert_eq!(second.len(), 2);
        assert!(Arc::ptr_eq(&first.trades[0], &second.trades[0]));
        // Two published snapshots plus the cached history
        assert_eq!(Arc::strong_count(&second.trades[0]), 3);
    }

    #[test]
    fn test_filter_by_since_limit() {
        let trades: Vec<Trade> = (1..=5).map(|i| trade(i, i as i64 * 10)).collect();

        let recent = filter_by_since_limit(&trades, Some(20), Some(2), true);
        assert_eq!(ids(&recent), vec!["4", "5"]);

        let oldest = filter_by_since_limit(&trades, Some(20), Some(2), false);
        assert_eq!(ids(&oldest), vec!["2", "3"]);

        let all = filter_by_since_limit(&trades, None, None, true);
        assert_eq!(all.len(), 5);

        let none = filter_by_since_limit(&trades, Some(51), None, true);
        assert!(none.is_empty());
    }
}
