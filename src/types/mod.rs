//! Market data types for Coinone streams.
//!
//! This module contains the Rust types that correspond to Coinone's
//! WebSocket payloads and the unified structures built from them.
//!
//! - [`market`] - Unified symbols, markets and currency pair resolution
//! - [`messages`] - Inbound frame classification and outbound requests
//! - [`ticker`] - Ticker snapshots
//! - [`trade`] - Trade records

pub mod market;
pub mod messages;
pub mod ticker;
pub mod trade;

use std::fmt;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

pub use market::{Market, MarketResolver, Markets};
pub use messages::{Channel, ResponseKind};
pub use ticker::Ticker;
pub use trade::{Trade, TradeSide};

/// Timestamp in milliseconds since Unix epoch
///
/// Signed so that the value round-trips through JSON integers unchanged.
pub type TimestampMs = i64;

/// Unified market symbol, e.g. `"BTC/KRW"`
///
/// Built once from a payload's base/quote currency codes and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Build a symbol from unified base and quote currency codes
    pub fn from_codes(base: &str, quote: &str) -> Self {
        Self(format!("{}/{}", base, quote))
    }

    /// Get the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Render a millisecond timestamp as ISO-8601 in UTC with millisecond precision
///
/// Returns `None` for timestamps chrono cannot represent.
pub fn iso8601(timestamp: TimestampMs) -> Option<String> {
    DateTime::from_timestamp_millis(timestamp)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Current wall-clock time in milliseconds
pub fn now_ms() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_from_codes() {
        let symbol = Symbol::from_codes("BTC", "KRW");
        assert_eq!(symbol.as_str(), "BTC/KRW");
        assert_eq!(symbol.to_string(), "BTC/KRW");
        assert_eq!(symbol, Symbol::from("BTC/KRW"));
    }

    #[test]
    fn test_iso8601() {
        assert_eq!(
            iso8601(1705288918649).as_deref(),
            Some("2024-01-15T03:21:58.649Z")
        );
        assert_eq!(iso8601(0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
    }
}
