//! Ticker snapshots.

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::messages::{decimal_field, integer_field};
use super::{iso8601, Symbol, TimestampMs};
use crate::error::Error;

/// Latest 24h statistics for one market
///
/// A ticker is never merged: every `TICKER` frame produces a whole new value
/// that replaces the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    /// Unified symbol
    pub symbol: Symbol,
    /// Exchange timestamp (Unix ms)
    pub timestamp: Option<TimestampMs>,
    /// ISO-8601 form of `timestamp`
    pub datetime: Option<String>,
    /// 24h high
    pub high: Option<Decimal>,
    /// 24h low
    pub low: Option<Decimal>,
    /// Best bid price
    pub bid: Option<Decimal>,
    /// Quantity at the best bid
    pub bid_volume: Option<Decimal>,
    /// Best ask price
    pub ask: Option<Decimal>,
    /// Quantity at the best ask
    pub ask_volume: Option<Decimal>,
    /// Volume-weighted average price (`quote_volume / base_volume`)
    pub vwap: Option<Decimal>,
    /// First price of the window
    pub open: Option<Decimal>,
    /// Last price of the window
    pub close: Option<Decimal>,
    /// Last traded price
    pub last: Option<Decimal>,
    /// Close of the previous window (not provided by the exchange)
    pub previous_close: Option<Decimal>,
    /// `last - open`
    pub change: Option<Decimal>,
    /// `change / open * 100`
    pub percentage: Option<Decimal>,
    /// `(open + last) / 2`
    pub average: Option<Decimal>,
    /// Volume in base currency
    pub base_volume: Option<Decimal>,
    /// Volume in quote currency
    pub quote_volume: Option<Decimal>,
    /// Raw `data` payload
    pub info: Value,
}

impl Ticker {
    /// Build a ticker from a `TICKER` frame's `data` object
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if a numeric field is present but
    /// not a decimal, or `timestamp` is not an integer.
    pub fn from_data(symbol: Symbol, data: &Map<String, Value>) -> Result<Self, Error> {
        let timestamp = integer_field(data, "timestamp")?;
        let open = decimal_field(data, "first")?;
        let last = decimal_field(data, "last")?;
        let base_volume = decimal_field(data, "target_volume")?;
        let quote_volume = decimal_field(data, "quote_volume")?;

        let change = match (open, last) {
            (Some(open), Some(last)) => Some(last - open),
            _ => None,
        };
        let percentage = match (change, open) {
            (Some(change), Some(open)) if !open.is_zero() => {
                change.checked_div(open).map(|r| r * Decimal::ONE_HUNDRED)
            }
            _ => None,
        };
        let average = match (open, last) {
            (Some(open), Some(last)) => (open + last).checked_div(Decimal::TWO),
            _ => None,
        };
        let vwap = match (quote_volume, base_volume) {
            (Some(quote), Some(base)) if !base.is_zero() => quote.checked_div(base),
            _ => None,
        };

        Ok(Self {
            symbol,
            timestamp,
            datetime: timestamp.and_then(iso8601),
            high: decimal_field(data, "high")?,
            low: decimal_field(data, "low")?,
            bid: decimal_field(data, "bid_best_price")?,
            bid_volume: decimal_field(data, "bid_best_qty")?,
            ask: decimal_field(data, "ask_best_price")?,
            ask_volume: decimal_field(data, "ask_best_qty")?,
            vwap,
            open,
            close: last,
            last,
            previous_close: None,
            change,
            percentage,
            average,
            base_volume,
            quote_volume,
            info: Value::Object(data.clone()),
        })
    }
}
