//! Configuration for the Coinone market data client.
//!
//! This module provides the [`Config`] struct for the stream endpoint, the
//! cache bounds and the keepalive cadence, plus [`ReconnectConfig`] for the
//! bundled WebSocket transport.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Public market data stream endpoint
pub const DEFAULT_WS_URL: &str = "wss://stream.coinone.co.kr";

/// Default cap for each symbol's trade history
pub const DEFAULT_TRADES_LIMIT: usize = 1000;

/// Default interval between `PING` frames
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_millis(20_000);

/// Configuration for the Coinone market data client
///
/// # Example
///
/// ```rust
/// use coinone_stream::Config;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .with_trades_limit(500)
///     .with_keep_alive(Duration::from_secs(15));
///
/// assert_eq!(config.trades_limit(), 500);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket endpoint
    ws_url: String,

    /// Maximum trades kept per symbol
    trades_limit: usize,

    /// Interval between keepalive pings
    keep_alive: Duration,

    /// Missed pongs tolerated before the connection is declared dead
    max_ping_pong_misses: u32,

    /// Connect timeout
    timeout: Duration,

    /// Return only trades that are new since the previous `watch_trades`
    new_updates: bool,

    /// Reconnection behavior of the bundled transport
    reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            trades_limit: DEFAULT_TRADES_LIMIT,
            keep_alive: DEFAULT_KEEP_ALIVE,
            max_ping_pong_misses: 2,
            timeout: Duration::from_secs(10),
            new_updates: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Config {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the WebSocket endpoint
    #[must_use]
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    /// Set the per-symbol trade history cap
    #[must_use]
    pub fn with_trades_limit(mut self, limit: usize) -> Self {
        self.trades_limit = limit;
        self
    }

    /// Set the keepalive ping interval
    #[must_use]
    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    /// Set how many keepalive intervals may pass without a pong
    #[must_use]
    pub fn with_max_ping_pong_misses(mut self, misses: u32) -> Self {
        self.max_ping_pong_misses = misses;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable new-updates mode for `watch_trades`
    #[must_use]
    pub fn with_new_updates(mut self, enabled: bool) -> Self {
        self.new_updates = enabled;
        self
    }

    /// Set the reconnection behavior
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Get the WebSocket endpoint
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Get the per-symbol trade history cap
    pub fn trades_limit(&self) -> usize {
        self.trades_limit
    }

    /// Get the keepalive ping interval
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Get the number of tolerated missed pongs
    pub fn max_ping_pong_misses(&self) -> u32 {
        self.max_ping_pong_misses
    }

    /// Time without a pong after which the connection counts as dead
    pub fn staleness_window(&self) -> Duration {
        self.keep_alive * self.max_ping_pong_misses.max(1)
    }

    /// Get the connect timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check whether new-updates mode is enabled
    pub fn new_updates(&self) -> bool {
        self.new_updates
    }

    /// Get the reconnection behavior
    pub fn reconnect(&self) -> &ReconnectConfig {
        &self.reconnect
    }

    /// Check the configuration for values the client cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unparseable or non-WebSocket URL, a
    /// zero trade history cap, or a zero keepalive interval.
    pub fn validate(&self) -> Result<(), Error> {
        let url = Url::parse(&self.ws_url)
            .map_err(|e| Error::Config(format!("invalid ws_url {:?}: {}", self.ws_url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::Config(format!(
                "ws_url must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        if self.trades_limit == 0 {
            return Err(Error::Config("trades_limit must be at least 1".into()));
        }
        if self.keep_alive.is_zero() {
            return Err(Error::Config("keep_alive must be non-zero".into()));
        }
        Ok(())
    }
}

/// Configuration for reconnection behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts (0 = infinite)
    pub max_retries: u32,
    /// Initial delay between reconnection attempts
    pub initial_delay_ms: u64,
    /// Maximum delay between reconnection attempts
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Create a new reconnect config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum retries (0 = infinite)
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set initial delay in milliseconds
    #[must_use]
    pub fn initial_delay_ms(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    /// Set maximum delay in milliseconds
    #[must_use]
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Check whether `attempt` is past the retry budget
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_retries > 0 && attempt >= self.max_retries
    }

    /// Calculate delay for a given retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}
