//! Inbound frame routing and keepalive.
//!
//! [`Router`] owns all market state of a client: the order book store, the
//! ticker and trade caches, the topic hub that publishes snapshots, and the
//! queue of pending subscribe requests. A transport feeds it every inbound
//! frame, in arrival order, through [`Router::route_text`], and asks it for
//! the keepalive payload through [`Router::ping`].
//!
//! # Error handling
//!
//! Routing errors are local to one frame. A frame that fails to parse, lacks
//! fields, or names an unknown market is dropped and routing continues with
//! the next frame. Exchange `ERROR` frames reject the oldest pending
//! subscribe request and are reported as [`Dispatch::Rejected`].

pub mod pending;
pub mod topics;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::cache::{TickerCache, TradeCache};
use crate::config::Config;
use crate::error::Error;
use crate::orderbook::OrderBookStore;
use crate::types::messages::{
    currency_field, data_object, integer_field, raw_levels, string_field, PingRequest,
};
use crate::types::{now_ms, Channel, MarketResolver, ResponseKind, Symbol, Ticker, TimestampMs, Trade};

pub use pending::{PendingRequests, RequestGuard, WaitGuard};
pub use topics::{Topic, TopicHub, TopicKind, TopicRegistry, TopicStream};

/// Outcome of routing one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// An order book snapshot was applied and published
    OrderBook(Symbol),
    /// A ticker was stored and published
    Ticker(Symbol),
    /// A trade was appended and the history published
    Trade(Symbol),
    /// A keepalive answer was recorded
    Pong,
    /// The exchange rejected a request
    Rejected {
        /// Exchange error code
        code: i64,
        /// Topic of the rejected pending request, if one was outstanding
        topic: Option<String>,
    },
    /// The frame is not something this client handles
    Ignored,
}

/// Market state plus the logic that keeps it in sync with the stream.
///
/// # Thread Safety
///
/// All methods take `&self`; share the router via `Arc<Router>`. Per-symbol
/// state is serialized internally, so frames from several connections may
/// be routed concurrently.
pub struct Router {
    resolver: Arc<dyn MarketResolver>,
    order_books: OrderBookStore,
    tickers: TickerCache,
    trades: TradeCache,
    hub: TopicHub,
    pending: Arc<PendingRequests>,
    last_pong: Mutex<Option<TimestampMs>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("order_books", &self.order_books.len())
            .field("tickers", &self.tickers.len())
            .field("trades", &self.trades.len())
            .field("pending", &self.pending.len())
            .field("last_pong", &*self.last_pong.lock())
            .finish()
    }
}

impl Router {
    /// Create a router with empty state
    pub fn new(config: &Config, resolver: Arc<dyn MarketResolver>) -> Self {
        Self {
            resolver,
            order_books: OrderBookStore::new(),
            tickers: TickerCache::new(),
            trades: TradeCache::new(config.trades_limit()),
            hub: TopicHub::new(),
            pending: Arc::new(PendingRequests::new()),
            last_pong: Mutex::new(None),
        }
    }

    /// Route one raw text frame
    ///
    /// # Errors
    ///
    /// Returns a frame-local error ([`Error::Json`],
    /// [`Error::MalformedMessage`] or [`Error::MarketResolution`]) if the
    /// frame was dropped.
    pub fn route_text(&self, text: &str) -> Result<Dispatch, Error> {
        let frame: Value = serde_json::from_str(text)?;
        self.route(&frame)
    }

    /// Route one parsed frame
    ///
    /// # Errors
    ///
    /// See [`Router::route_text`].
    pub fn route(&self, frame: &Value) -> Result<Dispatch, Error> {
        match ResponseKind::of(frame) {
            Some(ResponseKind::Error) => Ok(self.handle_error(frame)),
            Some(ResponseKind::Pong) => Ok(self.handle_pong()),
            Some(ResponseKind::Data) => {
                let name = frame.get("channel").and_then(Value::as_str).unwrap_or("");
                match Channel::classify(name) {
                    Some(Channel::OrderBook) => self.handle_order_book(frame),
                    Some(Channel::Ticker) => self.handle_ticker(frame),
                    Some(Channel::Trade) => self.handle_trade(frame),
                    None => {
                        trace!(channel = name, "Ignoring data on unhandled channel");
                        Ok(Dispatch::Ignored)
                    }
                }
            }
            None => Ok(Dispatch::Ignored),
        }
    }

    /// Apply an `ORDERBOOK` frame and publish the new book
    pub fn handle_order_book(&self, frame: &Value) -> Result<Dispatch, Error> {
        let data = data_object(frame)?;
        let symbol = self.resolve_symbol(data)?;
        let bids = raw_levels(data, "bids")?;
        let asks = raw_levels(data, "asks")?;

        let book = self.order_books.apply_snapshot(
            &symbol,
            &bids,
            &asks,
            integer_field(data, "timestamp")?,
            string_field(data, "id"),
            Value::Object(data.clone()),
        )?;

        let topic = Topic::order_book(&symbol).to_string();
        debug!(
            topic = %topic,
            bids = book.bids.len(),
            asks = book.asks.len(),
            "Order book snapshot applied"
        );
        self.hub.order_books.publish(&topic, book);
        self.pending.resolve(&topic);
        Ok(Dispatch::OrderBook(symbol))
    }

    /// Store a `TICKER` frame and publish it
    pub fn handle_ticker(&self, frame: &Value) -> Result<Dispatch, Error> {
        let data = data_object(frame)?;
        let symbol = self.resolve_symbol(data)?;
        let ticker = self.tickers.set(Ticker::from_data(symbol.clone(), data)?);

        let topic = Topic::ticker(&symbol).to_string();
        debug!(topic = %topic, last = ?ticker.last, "Ticker updated");
        self.hub.tickers.publish(&topic, ticker);
        self.pending.resolve(&topic);
        Ok(Dispatch::Ticker(symbol))
    }

    /// Append a `TRADE` frame and publish the history
    pub fn handle_trade(&self, frame: &Value) -> Result<Dispatch, Error> {
        let data = data_object(frame)?;
        let symbol = self.resolve_symbol(data)?;
        let history = self.trades.append(Trade::from_data(symbol.clone(), data)?);

        let topic = Topic::trade(&symbol).to_string();
        debug!(topic = %topic, held = history.len(), "Trade appended");
        self.hub.trades.publish(&topic, history);
        self.pending.resolve(&topic);
        Ok(Dispatch::Trade(symbol))
    }

    /// Record a `PONG` frame
    pub fn handle_pong(&self) -> Dispatch {
        let now = now_ms();
        *self.last_pong.lock() = Some(now);
        trace!(at = now, "Pong received");
        Dispatch::Pong
    }

    fn handle_error(&self, frame: &Value) -> Dispatch {
        let empty = Map::new();
        let fields = frame.as_object().unwrap_or(&empty);
        let code = integer_field(fields, "error_code")
            .ok()
            .flatten()
            .unwrap_or_default();
        let message = string_field(fields, "message").unwrap_or_default();

        let topic = self.pending.reject_oldest(code, &message);
        match &topic {
            Some(topic) => warn!(code, topic = %topic, "Subscription rejected"),
            None => warn!(code, "Exchange error with no pending request"),
        }
        Dispatch::Rejected { code, topic }
    }

    fn resolve_symbol(&self, data: &Map<String, Value>) -> Result<Symbol, Error> {
        let base = currency_field(data, "target_currency")?;
        let quote = currency_field(data, "quote_currency")?;
        self.resolver.resolve(&base, &quote)
    }

    /// Keepalive payload to send on every tick
    pub fn ping(&self) -> PingRequest {
        PingRequest::new()
    }

    /// Time of the last pong (Unix ms), if any arrived
    pub fn last_pong(&self) -> Option<TimestampMs> {
        *self.last_pong.lock()
    }

    /// Market resolver used for every data frame
    pub fn resolver(&self) -> &Arc<dyn MarketResolver> {
        &self.resolver
    }

    /// Order book state
    pub fn order_books(&self) -> &OrderBookStore {
        &self.order_books
    }

    /// Ticker cache
    pub fn tickers(&self) -> &TickerCache {
        &self.tickers
    }

    /// Trade cache
    pub fn trades(&self) -> &TradeCache {
        &self.trades
    }

    /// Published snapshots by topic
    pub fn hub(&self) -> &TopicHub {
        &self.hub
    }

    /// Outstanding subscribe requests
    pub fn pending(&self) -> &Arc<PendingRequests> {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Markets, TradeSide};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn router() -> Router {
        let markets = Markets::from_pairs(&[("BTC", "KRW"), ("ETH", "KRW")]);
        Router::new(&Config::new(), Arc::new(markets))
    }

    fn book_frame(channel: &str) -> Value {
        json!({
            "response_type": "DATA",
            "channel": channel,
            "data": {
                "quote_currency": "KRW",
                "target_currency": "BTC",
                "timestamp": 1705288918649_i64,
                "id": "1705288918649001",
                "asks": [{"price": "58412000", "qty": "0.59919807"}],
                "bids": [{"price": "58292000", "qty": "0.1045"}]
            }
        })
    }

    fn data_frame(channel: &str) -> Value {
        json!({
            "response_type": "DATA",
            "channel": channel,
            "data": {
                "quote_currency": "KRW",
                "target_currency": "BTC",
                "id": "1",
                "timestamp": 1000,
                "price": "100",
                "qty": "0.5",
                "last": "100",
                "is_seller_maker": false
            }
        })
    }

    #[test]
    fn test_dispatch_by_channel() {
        let router = router();
        let btc = Symbol::from("BTC/KRW");

        assert_eq!(
            router.route(&book_frame("ORDERBOOK")).unwrap(),
            Dispatch::OrderBook(btc.clone())
        );
        assert_eq!(
            router.route(&book_frame("ORDERBOOK_SNAPSHOT")).unwrap(),
            Dispatch::OrderBook(btc.clone())
        );
        assert_eq!(
            router.route(&data_frame("TICKER")).unwrap(),
            Dispatch::Ticker(btc.clone())
        );
        assert_eq!(
            router.route(&data_frame("TRADE")).unwrap(),
            Dispatch::Trade(btc)
        );
        assert_eq!(
            router.route(&data_frame("UNKNOWN")).unwrap(),
            Dispatch::Ignored
        );
    }

    #[test]
    fn test_other_kinds_are_ignored() {
        let router = router();
        assert_eq!(
            router.route(&json!({"response_type": "CONNECTED"})).unwrap(),
            Dispatch::Ignored
        );
        assert_eq!(router.route(&json!({"foo": 1})).unwrap(), Dispatch::Ignored);
        assert_eq!(router.route(&json!([1, 2])).unwrap(), Dispatch::Ignored);
        assert!(router.order_books().is_empty());
    }

    #[test]
    fn test_order_book_published() {
        let router = router();
        router.route(&book_frame("ORDERBOOK")).unwrap();

        let book = router.hub().order_books.latest("orderbook:BTC/KRW").unwrap();
        assert_eq!(book.best_ask(), Some((dec!(58412000), dec!(0.59919807))));
        assert_eq!(book.datetime.as_deref(), Some("2024-01-15T03:21:58.649Z"));
        assert_eq!(book.info["id"], "1705288918649001");
    }

    #[test]
    fn test_trade_frame_scenario() {
        let router = router();
        let frame = r#"{"response_type":"DATA","channel":"TRADE","data":{"quote_currency":"KRW","target_currency":"BTC","id":"1","timestamp":1000,"price":"100","qty":"0.5","is_seller_maker":false}}"#;
        router.route_text(frame).unwrap();

        let history = router.hub().trades.latest("trade:BTC/KRW").unwrap();
        assert_eq!(history.len(), 1);
        let trade = history.last().unwrap();
        assert_eq!(trade.id.as_deref(), Some("1"));
        assert_eq!(trade.side, Some(TradeSide::Buy));
        assert_eq!(trade.price, Some(dec!(100)));
        assert_eq!(trade.amount, Some(dec!(0.5)));
        assert_eq!(trade.timestamp, Some(1000));
    }

    #[test]
    fn test_pong_touches_no_cache() {
        let router = router();
        assert_eq!(router.last_pong(), None);

        let before = now_ms();
        assert_eq!(
            router.route_text(r#"{"response_type":"PONG"}"#).unwrap(),
            Dispatch::Pong
        );

        assert!(router.last_pong().unwrap() >= before);
        assert!(router.order_books().is_empty());
        assert!(router.tickers().is_empty());
        assert!(router.trades().is_empty());
    }

    #[test]
    fn test_unknown_market_is_resolution_error() {
        let router = router();
        let mut frame = data_frame("TRADE");
        frame["data"]["target_currency"] = json!("DOGE");

        let err = router.route(&frame).unwrap_err();
        assert!(matches!(err, Error::MarketResolution { .. }));
        assert!(router.trades().is_empty());

        // Routing continues with the next frame
        assert!(router.route(&data_frame("TRADE")).is_ok());
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let router = router();
        let no_data = json!({"response_type": "DATA", "channel": "TICKER"});
        assert!(matches!(
            router.route(&no_data),
            Err(Error::MalformedMessage(_))
        ));

        let mut no_quote = data_frame("TICKER");
        no_quote["data"].as_object_mut().unwrap().remove("quote_currency");
        assert!(matches!(
            router.route(&no_quote),
            Err(Error::MalformedMessage(_))
        ));

        assert!(matches!(router.route_text("not json"), Err(Error::Json(_))));
        assert!(router.tickers().is_empty());
    }

    #[tokio::test]
    async fn test_error_frame_rejects_pending_request() {
        let router = router();
        let mut waiter = router.pending().wait("orderbook:BTC/KRW");
        router.pending().claim("orderbook:BTC/KRW").unwrap().sent();

        let dispatch = router
            .route(&json!({"response_type": "ERROR", "error_code": 4009, "message": "Invalid session"}))
            .unwrap();

        assert_eq!(
            dispatch,
            Dispatch::Rejected {
                code: 4009,
                topic: Some("orderbook:BTC/KRW".into())
            }
        );
        assert!(matches!(
            waiter.rejected().await,
            Some(Error::Authentication { code: 4009, .. })
        ));
        assert!(!router.pending().is_subscribed("orderbook:BTC/KRW"));
    }

    #[test]
    fn test_error_frame_without_pending_request() {
        let router = router();
        let dispatch = router
            .route(&json!({"response_type": "ERROR", "error_code": 160012, "message": "Invalid Topic"}))
            .unwrap();
        assert_eq!(
            dispatch,
            Dispatch::Rejected {
                code: 160012,
                topic: None
            }
        );
    }

    #[test]
    fn test_data_resolves_pending_request() {
        let router = router();
        router.pending().claim("ticker:BTC/KRW").unwrap().sent();
        router.route(&data_frame("TICKER")).unwrap();
        assert!(router.pending().is_empty());
        assert!(router.pending().is_subscribed("ticker:BTC/KRW"));
    }

    #[test]
    fn test_ping_payload() {
        let router = router();
        let json = serde_json::to_string(&router.ping()).unwrap();
        assert_eq!(json, r#"{"request_type":"PING"}"#);
    }
}
