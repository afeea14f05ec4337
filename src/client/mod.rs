//! Market data client for Coinone.
//!
//! This module contains:
//!
//! - [`CoinoneClient`] - `watch_*` calls that subscribe once and wait for the
//!   next published value, plus streaming subscriptions and cache reads
//! - [`Transport`] - the seam between the client and a connection
//! - [`connection`] - the bundled reconnecting WebSocket transport
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use coinone_stream::client::CoinoneClient;
//! use coinone_stream::types::Markets;
//! use coinone_stream::Config;
//!
//! # async fn example() -> coinone_stream::Result<()> {
//! let markets = Markets::from_pairs(&[("BTC", "KRW"), ("ETH", "KRW")]);
//! let client = CoinoneClient::connect(Config::new(), Arc::new(markets))?;
//!
//! let book = client.watch_order_book("BTC/KRW", Some(10)).await?;
//! println!("best bid: {:?}", book.bids.first());
//!
//! let trades = client.watch_trades("BTC/KRW", None, Some(50)).await?;
//! println!("{} new trades", trades.len());
//! # Ok(())
//! # }
//! ```

pub mod connection;

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::cache::{filter_by_since_limit, TradeHistory};
use crate::config::Config;
use crate::error::Error;
use crate::orderbook::{OrderBook, OrderBookView};
use crate::router::{Router, Topic, TopicRegistry, TopicStream};
use crate::types::messages::SubscribeRequest;
use crate::types::{MarketResolver, Symbol, Ticker, TimestampMs, Trade};

pub use connection::{Connection, ConnectionHandle, ConnectionState};

/// Outbound half of a stream connection
///
/// [`ConnectionHandle`] is the bundled implementation. Inbound frames do
/// not pass through this trait: whoever owns the socket feeds them to
/// [`Router::route_text`].
pub trait Transport: Send + Sync {
    /// Send a frame on the connection
    fn send(&self, message: String) -> impl Future<Output = Result<(), Error>> + Send;

    /// Send a subscribe frame for `topic`
    ///
    /// Implementations that reconnect should replay it on every new socket.
    fn subscribe(
        &self,
        topic: &str,
        message: String,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, message: String) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).send(message)
    }

    fn subscribe(
        &self,
        topic: &str,
        message: String,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).subscribe(topic, message)
    }
}

/// Coinone public market data client
///
/// # Thread Safety
///
/// All methods take `&self`. Any number of tasks may watch the same or
/// different topics concurrently.
pub struct CoinoneClient<T = ConnectionHandle> {
    config: Config,
    router: Arc<Router>,
    transport: T,
    /// Trades already returned by `watch_trades`, per symbol
    trade_cursors: Mutex<FxHashMap<Symbol, u64>>,
}

impl<T> std::fmt::Debug for CoinoneClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinoneClient")
            .field("config", &self.config)
            .field("router", &self.router)
            .finish()
    }
}

impl CoinoneClient<ConnectionHandle> {
    /// Validate `config` and start a connection to the stream
    ///
    /// Must be called from within a Tokio runtime. The socket is opened in
    /// the background; `watch_*` calls made before it is up are sent once it
    /// connects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn connect(config: Config, resolver: Arc<dyn MarketResolver>) -> Result<Self, Error> {
        config.validate()?;
        let router = Arc::new(Router::new(&config, resolver));
        let handle = Connection::spawn(config.clone(), Arc::clone(&router));
        info!(url = config.ws_url(), "Client started");
        Ok(Self::with_transport(config, router, handle))
    }

    /// Close the bundled connection
    pub fn close(&self) {
        self.transport.close();
    }
}

impl<T: Transport> CoinoneClient<T> {
    /// Build a client over an existing router and transport
    ///
    /// The caller is responsible for feeding inbound frames to `router`.
    pub fn with_transport(config: Config, router: Arc<Router>, transport: T) -> Self {
        Self {
            config,
            router,
            transport,
            trade_cursors: Mutex::new(FxHashMap::default()),
        }
    }

    /// Wait for the next order book snapshot of `symbol`
    ///
    /// Returns the top `limit` levels per side (`None` for all).
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadSymbol`] for an unknown symbol, the exchange
    /// error if the subscription is rejected, or a transport error.
    pub async fn watch_order_book(
        &self,
        symbol: &str,
        limit: Option<usize>,
    ) -> Result<OrderBookView, Error> {
        let symbol = self.symbol(symbol)?;
        let book = self
            .watch(&self.router.hub().order_books, Topic::order_book(&symbol))
            .await?;
        Ok(book.limit(limit))
    }

    /// Wait for the next ticker of `symbol`
    ///
    /// # Errors
    ///
    /// See [`CoinoneClient::watch_order_book`].
    pub async fn watch_ticker(&self, symbol: &str) -> Result<Arc<Ticker>, Error> {
        let symbol = self.symbol(symbol)?;
        self.watch(&self.router.hub().tickers, Topic::ticker(&symbol))
            .await
    }

    /// Wait for the next trade of `symbol`
    ///
    /// Returns trades at or after `since`, keeping the most recent `limit`.
    /// With new-updates mode on (the default) only trades not yet returned
    /// to a call that started before this one are included, so concurrent
    /// calls all see the trade that woke them.
    ///
    /// # Errors
    ///
    /// See [`CoinoneClient::watch_order_book`].
    pub async fn watch_trades(
        &self,
        symbol: &str,
        since: Option<TimestampMs>,
        limit: Option<usize>,
    ) -> Result<Vec<Trade>, Error> {
        let symbol = self.symbol(symbol)?;
        let seen = self.trade_cursors.lock().get(&symbol).copied().unwrap_or(0);
        let history = self
            .watch(&self.router.hub().trades, Topic::trade(&symbol))
            .await?;

        let limit = if self.config.new_updates() {
            let appended = history.appended();
            self.trade_cursors
                .lock()
                .entry(symbol)
                .and_modify(|cursor| *cursor = (*cursor).max(appended))
                .or_insert(appended);
            let fresh = history.new_since(seen);
            Some(limit.map_or(fresh, |l| l.min(fresh)))
        } else {
            limit
        };

        Ok(filter_by_since_limit(history.iter(), since, limit, true))
    }

    /// Stream every order book snapshot of `symbol`
    ///
    /// The stream yields the current book first, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadSymbol`] for an unknown symbol or a transport
    /// error. Exchange rejections are only logged.
    pub async fn subscribe_order_book(&self, symbol: &str) -> Result<TopicStream<OrderBook>, Error> {
        let symbol = self.symbol(symbol)?;
        self.stream(&self.router.hub().order_books, Topic::order_book(&symbol))
            .await
    }

    /// Stream every ticker of `symbol`
    ///
    /// # Errors
    ///
    /// See [`CoinoneClient::subscribe_order_book`].
    pub async fn subscribe_ticker(&self, symbol: &str) -> Result<TopicStream<Ticker>, Error> {
        let symbol = self.symbol(symbol)?;
        self.stream(&self.router.hub().tickers, Topic::ticker(&symbol))
            .await
    }

    /// Stream the trade history of `symbol` after every trade
    ///
    /// # Errors
    ///
    /// See [`CoinoneClient::subscribe_order_book`].
    pub async fn subscribe_trades(&self, symbol: &str) -> Result<TopicStream<TradeHistory>, Error> {
        let symbol = self.symbol(symbol)?;
        self.stream(&self.router.hub().trades, Topic::trade(&symbol))
            .await
    }

    /// Current order book of `symbol`, limited to `limit` levels per side
    pub fn order_book(&self, symbol: &str, limit: Option<usize>) -> Option<OrderBookView> {
        self.router
            .order_books()
            .limited_view(&Symbol::from(symbol), limit)
    }

    /// Latest ticker of `symbol`
    pub fn ticker(&self, symbol: &str) -> Option<Arc<Ticker>> {
        self.router.tickers().get(&Symbol::from(symbol))
    }

    /// Held trades of `symbol`, oldest first
    pub fn trades(&self, symbol: &str) -> Vec<Trade> {
        self.router
            .trades()
            .get(&Symbol::from(symbol))
            .map(|history| history.to_vec())
            .unwrap_or_default()
    }

    /// Time of the last pong (Unix ms)
    pub fn last_pong(&self) -> Option<TimestampMs> {
        self.router.last_pong()
    }

    /// Get the router holding all market state
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Get the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn symbol(&self, symbol: &str) -> Result<Symbol, Error> {
        Ok(self.router.resolver().market(symbol)?.symbol)
    }

    async fn watch<V>(&self, registry: &TopicRegistry<V>, topic: Topic) -> Result<Arc<V>, Error> {
        let key = topic.to_string();
        let mut updates = registry.subscribe_updates(&key);
        let mut waiter = self.router.pending().wait(&key);
        self.ensure_subscribed(&topic, &key).await?;

        tokio::select! {
            biased;
            value = updates.next() => value,
            Some(error) = waiter.rejected() => Err(error),
        }
    }

    async fn stream<V>(
        &self,
        registry: &TopicRegistry<V>,
        topic: Topic,
    ) -> Result<TopicStream<V>, Error> {
        let key = topic.to_string();
        let stream = registry.subscribe(&key);
        self.ensure_subscribed(&topic, &key).await?;
        Ok(stream)
    }

    /// Send the subscribe frame for `topic` unless it was already claimed
    ///
    /// If the caller is cancelled before the frame is out, the claim is
    /// released and a later call sends it.
    async fn ensure_subscribed(&self, topic: &Topic, key: &str) -> Result<(), Error> {
        let market = self.router.resolver().market(topic.symbol.as_str())?;
        let Some(request) = self.router.pending().claim(key) else {
            return Ok(());
        };

        let frame = SubscribeRequest::new(topic.kind.channel(), &market.base_id, &market.quote_id);
        let message = serde_json::to_string(&frame)?;
        self.transport.subscribe(key, message).await?;
        request.sent();
        debug!(topic = %key, "Subscribe request sent");
        Ok(())
    }
}
