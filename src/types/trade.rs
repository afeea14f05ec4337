//! Trade records.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use super::messages::{decimal_field, integer_field, string_field};
use super::{iso8601, Symbol, TimestampMs};
use crate::error::Error;

/// Aggressor side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Buyer took liquidity
    Buy,
    /// Seller took liquidity
    Sell,
}

impl TradeSide {
    /// Derive the side from the exchange's `is_seller_maker` flag
    ///
    /// A maker seller means the buyer was the taker. An absent flag leaves
    /// the side unknown.
    pub fn from_seller_maker(is_seller_maker: Option<bool>) -> Option<Self> {
        is_seller_maker.map(|maker| if maker { TradeSide::Sell } else { TradeSide::Buy })
    }

    /// Wire name of the side
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

/// A single executed trade
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    /// Trade ID
    pub id: Option<String>,
    /// Unified symbol
    pub symbol: Symbol,
    /// Execution time (Unix ms)
    pub timestamp: Option<TimestampMs>,
    /// ISO-8601 form of `timestamp`
    pub datetime: Option<String>,
    /// Execution price
    pub price: Option<Decimal>,
    /// Executed quantity in base currency
    pub amount: Option<Decimal>,
    /// `price * amount`
    pub cost: Option<Decimal>,
    /// Aggressor side, `None` when the exchange did not say
    pub side: Option<TradeSide>,
    /// Raw `data` payload
    pub info: Value,
}

impl Trade {
    /// Build a trade from a `TRADE` frame's `data` object
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if `price` or `qty` is present but
    /// not a decimal, or `timestamp` is not an integer.
    pub fn from_data(symbol: Symbol, data: &Map<String, Value>) -> Result<Self, Error> {
        let timestamp = integer_field(data, "timestamp")?;
        let price = decimal_field(data, "price")?;
        let amount = decimal_field(data, "qty")?;
        let cost = match (price, amount) {
            (Some(price), Some(amount)) => price.checked_mul(amount),
            _ => None,
        };
        let is_seller_maker = data.get("is_seller_maker").and_then(Value::as_bool);

        Ok(Self {
            id: string_field(data, "id"),
            symbol,
            timestamp,
            datetime: timestamp.and_then(iso8601),
            price,
            amount,
            cost,
            side: TradeSide::from_seller_maker(is_seller_maker),
            info: Value::Object(data.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_side_derivation() {
        assert_eq!(TradeSide::from_seller_maker(Some(true)), Some(TradeSide::Sell));
        assert_eq!(TradeSide::from_seller_maker(Some(false)), Some(TradeSide::Buy));
        assert_eq!(TradeSide::from_seller_maker(None), None);
    }

    #[test]
    fn test_from_data() {
        let data = json!({
            "quote_currency": "KRW",
            "target_currency": "BTC",
            "id": "1705303667916001",
            "timestamp": 1705303667916_i64,
            "price": "58490000",
            "qty": "0.0008",
            "is_seller_maker": true
        });
        let trade = Trade::from_data("BTC/KRW".into(), data.as_object().unwrap()).unwrap();

        assert_eq!(trade.id.as_deref(), Some("1705303667916001"));
        assert_eq!(trade.side, Some(TradeSide::Sell));
        assert_eq!(trade.price, Some(dec!(58490000)));
        assert_eq!(trade.amount, Some(dec!(0.0008)));
        assert_eq!(trade.cost, Some(dec!(46792)));
        assert_eq!(trade.datetime.as_deref(), Some("2024-01-15T07:27:47.916Z"));
        assert_eq!(trade.info, data);
    }

    #[test]
    fn test_missing_maker_flag_leaves_side_unknown() {
        let data = json!({"id": "7", "price": "1", "qty": "2"});
        let trade = Trade::from_data("BTC/KRW".into(), data.as_object().unwrap()).unwrap();
        assert_eq!(trade.side, None);
        assert_eq!(trade.cost, Some(dec!(2)));
    }

    #[test]
    fn test_bad_price_is_malformed() {
        let data = json!({"price": "one", "qty": "2"});
        let err = Trade::from_data("BTC/KRW".into(), data.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage(_)));
    }
}
