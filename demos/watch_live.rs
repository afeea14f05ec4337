//! Watch a Coinone market and print every update.
//!
//! ```bash
//! RUST_LOG=coinone_stream=debug cargo run --example watch_live -- BTC/KRW
//! ```

use std::sync::Arc;

use coinone_stream::types::Markets;
use coinone_stream::{CoinoneClient, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), coinone_stream::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let symbol = std::env::args().nth(1).unwrap_or_else(|| "BTC/KRW".to_string());
    let (base, quote) = symbol
        .split_once('/')
        .ok_or_else(|| coinone_stream::Error::BadSymbol(symbol.clone()))?;

    let markets = Markets::from_pairs(&[(base, quote)]);
    let client = Arc::new(CoinoneClient::connect(Config::new(), Arc::new(markets))?);

    let books = {
        let client = Arc::clone(&client);
        let symbol = symbol.clone();
        tokio::spawn(async move {
            loop {
                match client.watch_order_book(&symbol, Some(3)).await {
                    Ok(book) => println!(
                        "[book]   {} bid {:?} ask {:?}",
                        book.symbol,
                        book.bids.first(),
                        book.asks.first()
                    ),
                    Err(e) => {
                        eprintln!("order book watch failed: {}", e);
                        break;
                    }
                }
            }
        })
    };

    let mut tickers = client.subscribe_ticker(&symbol).await?;

    loop {
        tokio::select! {
            ticker = tickers.next() => {
                let ticker = ticker?;
                println!(
                    "[ticker] {} last {:?} change {:?}%",
                    ticker.symbol, ticker.last, ticker.percentage
                );
            }
            trades = client.watch_trades(&symbol, None, None) => {
                for trade in trades? {
                    println!(
                        "[trade]  {} {} {:?} @ {:?}",
                        trade.symbol,
                        trade.side.map_or("?", |s| s.as_str()),
                        trade.amount,
                        trade.price
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    books.abort();
    client.close();
    Ok(())
}
