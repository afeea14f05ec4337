//! Error types for the coinone-stream crate.
//!
//! This module defines the errors that can occur while keeping market data
//! in sync: exchange-side rejections, frames that cannot be interpreted,
//! currency pairs that do not resolve to a known market, and the transport
//! failures underneath.

/// Error code Coinone sends when a request requires (re)authentication.
pub const AUTHENTICATION_ERROR_CODE: i64 = 4009;

/// The main error type for this crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration (bad URL, zero limits)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The exchange rejected a request with error code 4009
    #[error("Authentication error ({code}): {message}")]
    Authentication {
        /// Error code reported by the exchange
        code: i64,
        /// Error message reported by the exchange
        message: String,
    },

    /// The exchange answered with any other error code
    #[error("Protocol error ({code}): {message}")]
    Protocol {
        /// Error code reported by the exchange
        code: i64,
        /// Error message reported by the exchange
        message: String,
    },

    /// A data frame named a currency pair that is not a known market
    #[error("Unknown market for pair {base}/{quote}")]
    MarketResolution {
        /// Base currency id as sent by the exchange
        base: String,
        /// Quote currency id as sent by the exchange
        quote: String,
    },

    /// A frame was missing required fields or carried invalid values
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A unified symbol was requested that no market is registered for
    #[error("Bad symbol: {0}")]
    BadSymbol(String),

    /// WebSocket connection closed unexpectedly
    #[error("WebSocket connection closed")]
    ConnectionClosed,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,
}

impl Error {
    /// Build the error for an exchange `ERROR` frame
    ///
    /// Code 4009 maps to [`Error::Authentication`], everything else to
    /// [`Error::Protocol`].
    pub fn from_exchange(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == AUTHENTICATION_ERROR_CODE {
            Error::Authentication { code, message }
        } else {
            Error::Protocol { code, message }
        }
    }

    /// Shorthand for a [`Error::MalformedMessage`]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedMessage(reason.into())
    }

    /// Check if the exchange reported an error for this request
    pub fn is_exchange_error(&self) -> bool {
        matches!(self, Error::Authentication { .. } | Error::Protocol { .. })
    }

    /// Check if this error only drops the current frame
    ///
    /// Routing continues after these; they never close the connection.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Error::MarketResolution { .. } | Error::MalformedMessage(_) | Error::Json(_)
        )
    }
}
