//! # coinone-stream
//!
//! A Rust client that keeps [Coinone](https://coinone.co.kr) public market
//! data in sync over WebSocket.
//!
//! ## Features
//!
//! - **Order Books** - Full snapshots applied atomically, exact decimal levels
//! - **Tickers** - Latest ticker per symbol with derived change and VWAP
//! - **Trades** - Bounded per-symbol trade history (1000 by default)
//! - **Watch API** - `watch_*` calls that wait for the next update, plus
//!   streaming subscriptions
//! - **Keepalive** - `PING` every 20 s, reconnect when pongs stop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use coinone_stream::{CoinoneClient, Config};
//! use coinone_stream::types::Markets;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), coinone_stream::Error> {
//!     let markets = Markets::from_pairs(&[("BTC", "KRW")]);
//!     let client = CoinoneClient::connect(Config::new(), Arc::new(markets))?;
//!
//!     loop {
//!         let book = client.watch_order_book("BTC/KRW", Some(5)).await?;
//!         println!("{:?} / {:?}", book.bids.first(), book.asks.first());
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! This crate is organized into several modules:
//!
//! - [`client`] - The watch API, the transport seam and the WebSocket transport
//! - [`router`] - Frame classification, dispatch, topics and keepalive
//! - [`orderbook`] - Order book sides, the delta codec and the per-symbol store
//! - [`cache`] - Ticker cache and bounded trade histories
//! - [`types`] - Symbols, markets, wire messages, tickers and trades
//! - [`config`] - Configuration
//! - [`error`] - Error types for the crate
//!
//! ## Consistency
//!
//! Readers only ever see whole snapshots behind an `Arc`. Each symbol's
//! state is behind its own `parking_lot` mutex, and publication goes through
//! `tokio::sync::watch`, so routing never blocks on slow consumers.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod orderbook;
pub mod router;
pub mod types;

// Re-export main types at crate root for convenience
pub use client::{CoinoneClient, Transport};
pub use config::Config;
pub use error::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
