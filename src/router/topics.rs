//! Topic-addressed publication of market data snapshots.
//!
//! Every publishable value lives under exactly one topic string,
//! `"<kind>:<symbol>"`. Each topic owns a `tokio::sync::watch` sender, so a
//! publish is a pointer swap that never blocks readers, and any number of
//! consumers can hold a receiver for the same topic.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::watch;

use crate::cache::TradeHistory;
use crate::error::Error;
use crate::orderbook::OrderBook;
use crate::types::{Channel, Symbol, Ticker};

/// Kind of published structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// Order book snapshots
    OrderBook,
    /// Tickers
    Ticker,
    /// Trade histories
    Trade,
}

impl TopicKind {
    /// Topic prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::OrderBook => "orderbook",
            TopicKind::Ticker => "ticker",
            TopicKind::Trade => "trade",
        }
    }

    /// The exchange channel that feeds this kind
    pub fn channel(&self) -> Channel {
        match self {
            TopicKind::OrderBook => Channel::OrderBook,
            TopicKind::Ticker => Channel::Ticker,
            TopicKind::Trade => Channel::Trade,
        }
    }
}

/// A `(kind, symbol)` address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    /// Kind of structure
    pub kind: TopicKind,
    /// Unified symbol
    pub symbol: Symbol,
}

impl Topic {
    /// Create a topic
    pub fn new(kind: TopicKind, symbol: Symbol) -> Self {
        Self { kind, symbol }
    }

    /// Order book topic for `symbol`
    pub fn order_book(symbol: &Symbol) -> Self {
        Self::new(TopicKind::OrderBook, symbol.clone())
    }

    /// Ticker topic for `symbol`
    pub fn ticker(symbol: &Symbol) -> Self {
        Self::new(TopicKind::Ticker, symbol.clone())
    }

    /// Trade topic for `symbol`
    pub fn trade(symbol: &Symbol) -> Self {
        Self::new(TopicKind::Trade, symbol.clone())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.symbol)
    }
}

/// Latest value per topic for one structure type
#[derive(Debug)]
pub struct TopicRegistry<T> {
    senders: RwLock<FxHashMap<String, watch::Sender<Option<Arc<T>>>>>,
}

impl<T> Default for TopicRegistry<T> {
    fn default() -> Self {
        Self {
            senders: RwLock::new(FxHashMap::default()),
        }
    }
}

impl<T> TopicRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `value` as the latest for `topic` and wake its consumers
    ///
    /// The value is kept even when nobody is subscribed yet, so a later
    /// subscriber starts from it.
    pub fn publish(&self, topic: &str, value: Arc<T>) {
        {
            let senders = self.senders.read();
            if let Some(tx) = senders.get(topic) {
                tx.send_replace(Some(value));
                return;
            }
        }

        let mut senders = self.senders.write();
        match senders.get(topic) {
            Some(tx) => {
                tx.send_replace(Some(value));
            }
            None => {
                let (tx, _rx) = watch::channel(Some(value));
                senders.insert(topic.to_string(), tx);
            }
        }
    }

    /// Get the latest value for `topic`
    pub fn latest(&self, topic: &str) -> Option<Arc<T>> {
        self.senders
            .read()
            .get(topic)
            .and_then(|tx| tx.borrow().clone())
    }

    /// Subscribe to `topic`, creating it if needed
    ///
    /// The stream first yields the latest value (if any), then every update.
    pub fn subscribe(&self, topic: &str) -> TopicStream<T> {
        TopicStream::new(self.receiver(topic), false)
    }

    /// Subscribe to `topic`, skipping the value that is current right now
    pub fn subscribe_updates(&self, topic: &str) -> TopicStream<T> {
        TopicStream::new(self.receiver(topic), true)
    }

    /// Number of consumers currently subscribed to `topic`
    pub fn receiver_count(&self, topic: &str) -> usize {
        self.senders
            .read()
            .get(topic)
            .map_or(0, |tx| tx.receiver_count())
    }

    fn receiver(&self, topic: &str) -> watch::Receiver<Option<Arc<T>>> {
        {
            let senders = self.senders.read();
            if let Some(tx) = senders.get(topic) {
                return tx.subscribe();
            }
        }
        let mut senders = self.senders.write();
        senders
            .entry(topic.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }
}

/// A consumer's view of one topic
///
/// Dropping the stream unsubscribes. Updates published faster than the
/// consumer reads are coalesced: [`next`](TopicStream::next) always returns
/// the newest value.
#[derive(Debug)]
pub struct TopicStream<T> {
    rx: watch::Receiver<Option<Arc<T>>>,
    primed: bool,
}

impl<T> TopicStream<T> {
    fn new(rx: watch::Receiver<Option<Arc<T>>>, skip_current: bool) -> Self {
        Self {
            rx,
            primed: skip_current,
        }
    }

    /// Get the latest value without waiting
    pub fn latest(&self) -> Option<Arc<T>> {
        self.rx.borrow().clone()
    }

    /// Wait for the next value
    ///
    /// The first call returns the current value immediately if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the registry has been dropped.
    pub async fn next(&mut self) -> Result<Arc<T>, Error> {
        if !self.primed {
            self.primed = true;
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Ok(value);
            }
        }
        loop {
            self.rx
                .changed()
                .await
                .map_err(|_| Error::ConnectionClosed)?;
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Ok(value);
            }
        }
    }
}

/// Registries for every published structure type
#[derive(Debug, Default)]
pub struct TopicHub {
    /// Order book snapshots
    pub order_books: TopicRegistry<OrderBook>,
    /// Tickers
    pub tickers: TopicRegistry<Ticker>,
    /// Trade histories
    pub trades: TopicRegistry<TradeHistory>,
}

impl TopicHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }
}
