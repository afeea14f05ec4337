//! WebSocket message types.
//!
//! This module contains the requests sent to Coinone, the discriminants used
//! to classify inbound frames, and the field accessors used to read
//! exchange-native payloads.
//!
//! Inbound frames are kept as [`serde_json::Value`] rather than decoded into
//! fixed structs: every published structure carries the raw payload as
//! `info`, and a frame with unexpected extra or missing fields must degrade
//! to a dropped message rather than a failed stream.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use super::TimestampMs;
use crate::error::Error;

/// Kind of an inbound frame (`response_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Channel data
    Data,
    /// Request rejected by the exchange
    Error,
    /// Keepalive answer
    Pong,
}

impl ResponseKind {
    /// Classify a frame by its `response_type` field
    ///
    /// Returns `None` for a missing or unrecognized kind; such frames are
    /// ignored by the router.
    pub fn of(frame: &Value) -> Option<Self> {
        match frame.get("response_type")?.as_str()? {
            "DATA" => Some(ResponseKind::Data),
            "ERROR" => Some(ResponseKind::Error),
            "PONG" => Some(ResponseKind::Pong),
            _ => None,
        }
    }
}

/// Public data channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    /// Order book snapshots
    #[serde(rename = "ORDERBOOK")]
    OrderBook,
    /// Ticker updates
    #[serde(rename = "TICKER")]
    Ticker,
    /// Executed trades
    #[serde(rename = "TRADE")]
    Trade,
}

impl Channel {
    /// All channels, in dispatch order
    pub const ALL: [Channel; 3] = [Channel::OrderBook, Channel::Ticker, Channel::Trade];

    /// Wire name of the channel
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::OrderBook => "ORDERBOOK",
            Channel::Ticker => "TICKER",
            Channel::Trade => "TRADE",
        }
    }

    /// Map an inbound `channel` field to a channel
    ///
    /// An exact match wins. Otherwise the first channel (in [`Channel::ALL`]
    /// order) whose name occurs inside `name` is chosen, so suffixed names
    /// such as `ORDERBOOK_SNAPSHOT` still route. Whether the exchange ever
    /// sends suffixed names is not documented; the fallback is kept so such
    /// frames are not lost.
    pub fn classify(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|c| c.as_str() == name)
            .or_else(|| Self::ALL.iter().find(|c| name.contains(c.as_str())))
            .copied()
    }
}

/// Outbound request kind (`request_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    /// Subscribe to a channel topic
    Subscribe,
    /// Keepalive
    Ping,
}

/// Currency pair addressed by a subscribe request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeTopic {
    /// Quote currency (e.g., "KRW")
    pub quote_currency: String,
    /// Base currency (e.g., "BTC")
    pub target_currency: String,
}

/// Subscribe request sent to the server
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    /// Always [`RequestType::Subscribe`]
    pub request_type: RequestType,
    /// Channel to subscribe to
    pub channel: Channel,
    /// Currency pair
    pub topic: SubscribeTopic,
}

impl SubscribeRequest {
    /// Create a subscribe request for a channel and currency pair
    pub fn new(channel: Channel, base: &str, quote: &str) -> Self {
        Self {
            request_type: RequestType::Subscribe,
            channel,
            topic: SubscribeTopic {
                quote_currency: quote.to_string(),
                target_currency: base.to_string(),
            },
        }
    }
}

/// Keepalive request sent to the server
#[derive(Debug, Clone, Serialize)]
pub struct PingRequest {
    /// Always [`RequestType::Ping`]
    pub request_type: RequestType,
}

impl PingRequest {
    /// Create a ping request
    pub fn new() -> Self {
        Self {
            request_type: RequestType::Ping,
        }
    }
}

impl Default for PingRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// A raw `{price, qty}` entry of one book side, exactly as sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLevel {
    /// Price as a decimal string
    pub price: String,
    /// Quantity as a decimal string
    pub qty: String,
}

impl RawLevel {
    /// Create a raw level from its string fields
    pub fn new(price: impl Into<String>, qty: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            qty: qty.into(),
        }
    }
}

/// Get the `data` object of a frame
pub fn data_object(frame: &Value) -> Result<&Map<String, Value>, Error> {
    frame
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::malformed("frame has no data object"))
}

/// Read a field as a string, accepting JSON strings and numbers
pub fn string_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a required currency id field, upper-cased
pub fn currency_field(data: &Map<String, Value>, key: &str) -> Result<String, Error> {
    string_field(data, key)
        .map(|s| s.to_uppercase())
        .ok_or_else(|| Error::malformed(format!("missing {}", key)))
}

/// Read an optional integer field, accepting JSON integers and integer strings
///
/// Absent and `null` fields yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`Error::MalformedMessage`] for fractional or out-of-range
/// numbers and for anything else that is not an integer.
pub fn integer_field(data: &Map<String, Value>, key: &str) -> Result<Option<TimestampMs>, Error> {
    let value = match data.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| Error::malformed(format!("{} is not an integer: {}", key, value)))
}

/// Read an optional decimal field
///
/// Absent and `null` fields yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`Error::MalformedMessage`] if the field is present but is not a
/// decimal number.
pub fn decimal_field(data: &Map<String, Value>, key: &str) -> Result<Option<Decimal>, Error> {
    match string_field(data, key) {
        None => match data.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(other) => Err(Error::malformed(format!("{} is not a number: {}", key, other))),
        },
        Some(s) => parse_decimal(&s)
            .map(Some)
            .ok_or_else(|| Error::malformed(format!("{} is not a decimal: {:?}", key, s))),
    }
}

/// Parse a decimal string without going through floating point
///
/// Plain notation is tried first, then scientific notation.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Read an array of `{price, qty}` objects; a missing array is empty
///
/// # Errors
///
/// Returns [`Error::MalformedMessage`] if the field is not an array or an
/// entry lacks `price` or `qty`.
pub fn raw_levels(data: &Map<String, Value>, key: &str) -> Result<Vec<RawLevel>, Error> {
    let entries = match data.get(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(Error::malformed(format!("{} is not an array", key))),
    };

    entries
        .iter()
        .map(|entry| {
            let entry = entry
                .as_object()
                .ok_or_else(|| Error::malformed(format!("{} entry is not an object", key)))?;
            let price = string_field(entry, "price")
                .ok_or_else(|| Error::malformed(format!("{} entry has no price", key)))?;
            let qty = string_field(entry, "qty")
                .ok_or_else(|| Error::malformed(format!("{} entry has no qty", key)))?;
            Ok(RawLevel { price, qty })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_subscribe_request_serialization() {
        let request = SubscribeRequest::new(Channel::OrderBook, "BTC", "KRW");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({
                "request_type": "SUBSCRIBE",
                "channel": "ORDERBOOK",
                "topic": {"quote_currency": "KRW", "target_currency": "BTC"}
            })
        );
    }

    #[test]
    fn test_ping_serialization() {
        let json = serde_json::to_string(&PingRequest::new()).unwrap();
        assert_eq!(json, r#"{"request_type":"PING"}"#);
    }

    #[test]
    fn test_response_kind() {
        assert_eq!(
            ResponseKind::of(&json!({"response_type": "DATA"})),
            Some(ResponseKind::Data)
        );
        assert_eq!(
            ResponseKind::of(&json!({"response_type": "PONG"})),
            Some(ResponseKind::Pong)
        );
        assert_eq!(ResponseKind::of(&json!({"response_type": "CONNECTED"})), None);
        assert_eq!(ResponseKind::of(&json!({"channel": "TRADE"})), None);
    }

    #[test]
    fn test_channel_classification() {
        assert_eq!(Channel::classify("ORDERBOOK"), Some(Channel::OrderBook));
        assert_eq!(
            Channel::classify("ORDERBOOK_SNAPSHOT"),
            Some(Channel::OrderBook)
        );
        assert_eq!(Channel::classify("TICKER"), Some(Channel::Ticker));
        assert_eq!(Channel::classify("TRADE"), Some(Channel::Trade));
        assert_eq!(Channel::classify("UNKNOWN"), None);
        assert_eq!(Channel::classify(""), None);
    }

    #[test]
    fn test_field_accessors() {
        let data = json!({
            "target_currency": "btc",
            "timestamp": 1705288918649_i64,
            "ts_str": "1705288918649",
            "price": "58412000",
            "qty": 0.5,
            "bad": "abc",
            "nothing": null
        });
        let data = data.as_object().unwrap();

        assert_eq!(currency_field(data, "target_currency").unwrap(), "BTC");
        assert!(currency_field(data, "quote_currency").is_err());
        assert_eq!(integer_field(data, "timestamp").unwrap(), Some(1705288918649));
        assert_eq!(integer_field(data, "ts_str").unwrap(), Some(1705288918649));
        assert_eq!(integer_field(data, "nothing").unwrap(), None);
        assert_eq!(decimal_field(data, "price").unwrap(), Some(dec!(58412000)));
        assert_eq!(decimal_field(data, "qty").unwrap(), Some(dec!(0.5)));
        assert_eq!(decimal_field(data, "nothing").unwrap(), None);
        assert_eq!(decimal_field(data, "missing").unwrap(), None);
        assert!(decimal_field(data, "bad").is_err());
    }

    #[test]
    fn test_integer_field_rejects_fractions() {
        let data = json!({
            "timestamp": 1705288918649.5,
            "whole_float": 1.0,
            "huge": u64::MAX,
            "word": "soon"
        });
        let data = data.as_object().unwrap();

        assert!(matches!(
            integer_field(data, "timestamp"),
            Err(Error::MalformedMessage(_))
        ));
        assert!(integer_field(data, "whole_float").is_err());
        assert!(integer_field(data, "huge").is_err());
        assert!(integer_field(data, "word").is_err());
        assert_eq!(integer_field(data, "missing").unwrap(), None);
    }

    #[test]
    fn test_parse_decimal_scientific() {
        assert_eq!(parse_decimal("1e-5"), Some(dec!(0.00001)));
        assert_eq!(parse_decimal(" 0.1045 "), Some(dec!(0.1045)));
        assert_eq!(parse_decimal("x"), None);
    }

    #[test]
    fn test_raw_levels() {
        let data = json!({
            "asks": [{"price": "58412000", "qty": "0.59919807"}],
            "broken": [{"price": "1"}]
        });
        let data = data.as_object().unwrap();

        let asks = raw_levels(data, "asks").unwrap();
        assert_eq!(asks, vec![RawLevel::new("58412000", "0.59919807")]);
        assert!(raw_levels(data, "bids").unwrap().is_empty());
        assert!(raw_levels(data, "broken").is_err());
    }
}
