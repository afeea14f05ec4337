//! Order book state.
//!
//! This module keeps one order book per symbol, rebuilt from each full
//! snapshot the exchange pushes:
//!
//! - [`side`] - Price-indexed levels of one side, best first
//! - [`delta`] - Parsing raw `{price, qty}` entries and applying them
//! - [`book`] - The per-symbol book and its depth-limited view
//! - [`manager`] - The thread-safe symbol -> book store
//!
//! # Example
//!
//! ```rust
//! use coinone_stream::orderbook::{delta, BookSide, SideKind};
//! use coinone_stream::types::messages::RawLevel;
//!
//! let mut bids = BookSide::new(SideKind::Bids);
//! delta::apply_raw(&mut bids, &[RawLevel::new("100", "1"), RawLevel::new("101", "2")]).unwrap();
//!
//! // Size 0 removes the level
//! delta::apply_raw(&mut bids, &[RawLevel::new("101", "0")]).unwrap();
//! assert_eq!(bids.len(), 1);
//! ```

pub mod book;
pub mod delta;
pub mod manager;
pub mod side;

pub use book::{OrderBook, OrderBookView};
pub use manager::OrderBookStore;
pub use side::{BookSide, PriceLevel, SideKind};
