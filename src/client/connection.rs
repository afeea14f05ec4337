//! WebSocket transport for the Coinone public stream.
//!
//! [`Connection`] owns one socket inside a spawned task and feeds every
//! text frame to a shared [`Router`]. The task:
//!
//! - sends the keepalive `PING` every `keep_alive`
//! - answers WebSocket-level pings
//! - records subscribe frames and replays them after each reconnect,
//!   forgetting the ones the exchange rejected
//! - reconnects with exponential backoff when the socket closes, errors, or
//!   goes without a pong for the staleness window
//!
//! Callers talk to the task through a [`ConnectionHandle`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use coinone_stream::client::connection::Connection;
//! use coinone_stream::router::Router;
//! use coinone_stream::types::Markets;
//! use coinone_stream::Config;
//!
//! # async fn example() -> coinone_stream::Result<()> {
//! let config = Config::new();
//! let markets = Markets::from_pairs(&[("BTC", "KRW")]);
//! let router = Arc::new(Router::new(&config, Arc::new(markets)));
//!
//! let handle = Connection::spawn(config, router);
//! handle.wait_connected().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::Transport;
use crate::config::Config;
use crate::error::Error;
use crate::router::{Dispatch, Router};
use crate::types::now_ms;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of the connection task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// First connect in progress
    Connecting,
    /// Socket is open
    Connected,
    /// Waiting to retry after a lost connection
    Reconnecting {
        /// Attempt number, starting at 0
        attempt: u32,
    },
    /// Task has stopped; no more frames are routed
    Closed,
}

#[derive(Debug)]
enum Command {
    Send(String),
    Subscribe { topic: String, message: String },
    Close,
}

/// Why a connected session ended
enum Exit {
    Closed,
    Lost(Error),
}

/// Handle to a running [`Connection`]
///
/// Cloning is cheap; every clone talks to the same task. The task keeps
/// running until [`close`](ConnectionHandle::close) is called, every handle
/// is dropped, or reconnect attempts run out.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Current state of the connection task
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Check if the socket is currently open
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Wait until the socket is open
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the task stops first.
    pub async fn wait_connected(&self) -> Result<(), Error> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Closed))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        match *reached {
            ConnectionState::Connected => Ok(()),
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Ask the task to close the socket and stop
    pub fn close(&self) {
        // Already stopped if the send fails
        let _ = self.commands.send(Command::Close);
    }

    fn command(&self, command: Command) -> Result<(), Error> {
        self.commands
            .send(command)
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl Transport for ConnectionHandle {
    async fn send(&self, message: String) -> Result<(), Error> {
        self.command(Command::Send(message))
    }

    async fn subscribe(&self, topic: &str, message: String) -> Result<(), Error> {
        self.command(Command::Subscribe {
            topic: topic.to_string(),
            message,
        })
    }
}

/// One reconnecting WebSocket session feeding a [`Router`]
pub struct Connection {
    config: Config,
    router: Arc<Router>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    /// Subscribe frames in first-subscribed order, replayed on reconnect
    subscriptions: Vec<(String, String)>,
    reconnect_attempt: u32,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.config.ws_url())
            .field("state", &*self.state.borrow())
            .field("reconnect_attempt", &self.reconnect_attempt)
            .field("subscription_count", &self.subscriptions.len())
            .finish()
    }
}

impl Connection {
    /// Spawn the connection task on the current Tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(config: Config, router: Arc<Router>) -> ConnectionHandle {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(ConnectionState::Connecting);

        let connection = Self {
            config,
            router,
            commands,
            state,
            subscriptions: Vec::new(),
            reconnect_attempt: 0,
        };
        tokio::spawn(connection.run());

        ConnectionHandle {
            commands: commands_tx,
            state: state_rx,
        }
    }

    async fn run(mut self) {
        let mut retry = false;
        while let Some(stream) = self.establish(retry).await {
            retry = true;
            self.set_state(ConnectionState::Connected);
            match self.session(stream).await {
                Exit::Closed => break,
                Exit::Lost(e) => {
                    warn!(error = %e, "Connection lost");
                }
            }
            self.set_state(ConnectionState::Reconnecting {
                attempt: self.reconnect_attempt,
            });
        }
        self.set_state(ConnectionState::Closed);
        info!(url = self.config.ws_url(), "Connection task stopped");
    }

    /// Connect, retrying with backoff; `None` means stop
    async fn establish(&mut self, mut retry: bool) -> Option<WsStream> {
        loop {
            if retry {
                let reconnect = self.config.reconnect();
                if reconnect.exhausted(self.reconnect_attempt) {
                    error!(
                        attempts = self.reconnect_attempt,
                        "Reconnect attempts exhausted"
                    );
                    return None;
                }
                let delay = reconnect.delay_for_attempt(self.reconnect_attempt);
                self.reconnect_attempt += 1;
                if !self.idle(delay).await {
                    return None;
                }
            }
            retry = true;

            match self.connect().await {
                Ok(stream) => {
                    info!(
                        url = self.config.ws_url(),
                        attempt = self.reconnect_attempt,
                        "Connected"
                    );
                    return Some(stream);
                }
                Err(e) => {
                    warn!(error = %e, attempt = self.reconnect_attempt, "Connect failed");
                }
            }
        }
    }

    async fn connect(&self) -> Result<WsStream, Error> {
        let connecting = tokio_tungstenite::connect_async(self.config.ws_url());
        let (stream, _response) = tokio::time::timeout(self.config.timeout(), connecting)
            .await
            .map_err(|_| Error::Timeout)??;
        Ok(stream)
    }

    /// Sleep for `delay` while serving commands; `false` means stop
    async fn idle(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Subscribe { topic, message }) => self.remember(topic, message),
                    Some(Command::Send(_)) => debug!("Dropping frame while disconnected"),
                    Some(Command::Close) | None => return false,
                },
            }
        }
    }

    async fn session(&mut self, stream: WsStream) -> Exit {
        let (mut write, mut read) = stream.split();

        self.router
            .pending()
            .replay(self.subscriptions.iter().map(|(topic, _)| topic.as_str()));
        for (topic, message) in &self.subscriptions {
            debug!(topic = %topic, "Replaying subscription");
            if let Err(e) = write.send(Message::Text(message.clone())).await {
                return Exit::Lost(e.into());
            }
        }

        let keep_alive = self.config.keep_alive();
        let staleness = i64::try_from(self.config.staleness_window().as_millis()).unwrap_or(i64::MAX);
        let mut keepalive = tokio::time::interval_at(Instant::now() + keep_alive, keep_alive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let connected_at = now_ms();

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let outbound = match command {
                        Some(Command::Send(message)) => message,
                        Some(Command::Subscribe { topic, message }) => {
                            info!(topic = %topic, "Subscribing");
                            self.remember(topic, message.clone());
                            message
                        }
                        Some(Command::Close) | None => {
                            let _ = write.close().await;
                            return Exit::Closed;
                        }
                    };
                    if let Err(e) = write.send(Message::Text(outbound)).await {
                        return Exit::Lost(e.into());
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.reconnect_attempt = 0;
                        self.route(&text);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            return Exit::Lost(e.into());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Server closed the connection");
                        return Exit::Lost(Error::ConnectionClosed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Exit::Lost(e.into()),
                    None => return Exit::Lost(Error::ConnectionClosed),
                },
                _ = keepalive.tick() => {
                    let since = self.router.last_pong().map_or(connected_at, |pong| pong.max(connected_at));
                    if now_ms() - since > staleness {
                        warn!(silent_ms = now_ms() - since, "No pong within the staleness window");
                        return Exit::Lost(Error::Timeout);
                    }
                    let ping = match serde_json::to_string(&self.router.ping()) {
                        Ok(ping) => ping,
                        Err(e) => return Exit::Lost(e.into()),
                    };
                    trace!("Sending ping");
                    if let Err(e) = write.send(Message::Text(ping)).await {
                        return Exit::Lost(e.into());
                    }
                }
            }
        }
    }

    fn route(&mut self, text: &str) {
        match self.router.route_text(text) {
            Ok(Dispatch::Rejected {
                topic: Some(topic), ..
            }) => {
                debug!(topic = %topic, "Forgetting rejected subscription");
                self.subscriptions.retain(|(t, _)| *t != topic);
            }
            Ok(dispatch) => trace!(?dispatch, "Frame routed"),
            Err(e @ Error::MarketResolution { .. }) => warn!(error = %e, "Dropping frame"),
            Err(e) => debug!(error = %e, "Dropping malformed frame"),
        }
    }

    fn remember(&mut self, topic: String, message: String) {
        match self.subscriptions.iter_mut().find(|(t, _)| *t == topic) {
            Some(entry) => entry.1 = message,
            None => self.subscriptions.push((topic, message)),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;
    use crate::types::Markets;

    fn router(config: &Config) -> Arc<Router> {
        Arc::new(Router::new(config, Arc::new(Markets::from_pairs(&[("BTC", "KRW")]))))
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_stops_after_retries() {
        let config = Config::new()
            .with_ws_url("ws://127.0.0.1:1")
            .with_timeout(Duration::from_millis(200))
            .with_reconnect(
                ReconnectConfig::new()
                    .max_retries(1)
                    .initial_delay_ms(1)
                    .max_delay_ms(1),
            );
        let handle = Connection::spawn(config.clone(), router(&config));

        assert!(matches!(
            handle.wait_connected().await,
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(handle.state(), ConnectionState::Closed);
        assert!(matches!(
            handle.send("{}".into()).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_while_reconnecting() {
        let config = Config::new()
            .with_ws_url("ws://127.0.0.1:1")
            .with_timeout(Duration::from_millis(200))
            .with_reconnect(ReconnectConfig::new().max_retries(0).initial_delay_ms(50));
        let handle = Connection::spawn(config.clone(), router(&config));

        // Recorded even though the socket is down
        handle
            .subscribe("ticker:BTC/KRW", r#"{"request_type":"SUBSCRIBE"}"#.into())
            .await
            .unwrap();
        handle.close();

        assert!(handle.wait_connected().await.is_err());
        assert!(!handle.is_connected());
    }

    fn idle_connection() -> Connection {
        let config = Config::new();
        let (_tx, commands) = mpsc::unbounded_channel();
        let (state, _rx) = watch::channel(ConnectionState::Connecting);
        Connection {
            router: router(&config),
            config,
            commands,
            state,
            subscriptions: Vec::new(),
            reconnect_attempt: 0,
        }
    }

    #[test]
    fn test_remember_replaces_by_topic() {
        let mut connection = idle_connection();

        connection.remember("ticker:BTC/KRW".into(), "a".into());
        connection.remember("trade:BTC/KRW".into(), "b".into());
        connection.remember("ticker:BTC/KRW".into(), "c".into());

        assert_eq!(
            connection.subscriptions,
            vec![
                ("ticker:BTC/KRW".to_string(), "c".to_string()),
                ("trade:BTC/KRW".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejected_subscription_is_not_replayed() {
        let mut connection = idle_connection();
        let pending = Arc::clone(connection.router.pending());
        for topic in ["ticker:BTC/KRW", "trade:BTC/KRW"] {
            connection.remember(topic.into(), format!("subscribe {}", topic));
            pending.claim(topic).unwrap().sent();
        }

        connection.route(r#"{"response_type":"ERROR","error_code":160012,"message":"Invalid Topic"}"#);

        assert_eq!(
            connection.subscriptions,
            vec![("trade:BTC/KRW".to_string(), "subscribe trade:BTC/KRW".to_string())]
        );
        assert!(!pending.is_subscribed("ticker:BTC/KRW"));
    }

    #[test]
    fn test_replayed_subscription_absorbs_its_rejection() {
        let mut connection = idle_connection();
        let pending = Arc::clone(connection.router.pending());
        connection.remember("ticker:BTC/KRW".into(), "a".into());
        pending.claim("ticker:BTC/KRW").unwrap().sent();
        connection.route(
            r#"{"response_type":"DATA","channel":"TICKER","data":{"quote_currency":"KRW","target_currency":"BTC","last":"1"}}"#,
        );
        assert!(pending.is_empty());

        // What a fresh socket queues before replaying
        pending.replay(connection.subscriptions.iter().map(|(t, _)| t.as_str()));
        assert_eq!(pending.len(), 1);

        connection.route(r#"{"response_type":"ERROR","error_code":160012,"message":"Invalid Topic"}"#);
        assert!(connection.subscriptions.is_empty());
        assert!(pending.is_empty());
    }
}
