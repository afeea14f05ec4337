//! Rolling caches for tickers and trades.
//!
//! - [`ticker`] - Latest ticker per symbol, replaced wholesale
//! - [`trades`] - Bounded, insertion-ordered trade history per symbol

pub mod ticker;
pub mod trades;

pub use ticker::TickerCache;
pub use trades::{filter_by_since_limit, TradeCache, TradeHistory};
