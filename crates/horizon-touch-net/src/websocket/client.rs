//! WebSocket client with signal-based event delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use horizon_touch_core::Signal;
use horizon_touch_core::logging::targets;
use parking_lot::Mutex;
use rand::Rng;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as TungsteniteCloseCode;

use super::message::{CloseCode, CloseReason, WebSocketState};
use crate::error::{NetworkError, Result};

/// Configuration for WebSocket connection.
#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// The WebSocket URL (ws:// or wss://).
    pub url: String,
    /// Custom headers to send during the handshake.
    pub headers: HashMap<String, String>,
    /// Auto-reconnect configuration. If `None`, auto-reconnect is disabled.
    pub reconnect: Option<ReconnectConfig>,
}

impl WebSocketConfig {
    /// Create a new WebSocket configuration with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            reconnect: None,
        }
    }

    /// Build a `ws://host:port` configuration.
    pub fn for_host(host: &str, port: u16) -> Result<Self> {
        let url = url::Url::parse(&format!("ws://{host}:{port}"))?;
        Ok(Self::new(url.as_str()))
    }

    /// Add a custom header for the WebSocket handshake.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Enable auto-reconnect with default settings.
    pub fn auto_reconnect(mut self) -> Self {
        self.reconnect = Some(ReconnectConfig::default());
        self
    }

    /// Enable auto-reconnect with custom configuration.
    pub fn reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = Some(config);
        self
    }
}

/// Configuration for automatic reconnection.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts. `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Initial delay between reconnection attempts.
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Create a new reconnect configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of reconnection attempts.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the initial delay between reconnection attempts.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between reconnection attempts.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier for exponential backoff.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed), with ±10% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_delay_ms * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64) as i64;

        let jitter_range = (delay_ms as f64 * 0.1) as i64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0
        };

        Duration::from_millis((delay_ms + jitter).max(0) as u64)
    }
}

/// One connect/disconnect cycle of the client.
struct Session {
    cancelled: AtomicBool,
    command_tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl Session {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            command_tx: Mutex::new(None),
        })
    }

    fn cancel(&self, reason: Option<CloseReason>) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(tx) = self.command_tx.lock().as_ref() {
            let _ = tx.send(Command::Close(reason));
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Internal state for the WebSocket connection.
struct WebSocketInner {
    state: WebSocketState,
    reconnect_attempt: u32,
    session: Option<Arc<Session>>,
}

impl WebSocketInner {
    fn is_current(&self, session: &Arc<Session>) -> bool {
        self.session.as_ref().is_some_and(|s| Arc::ptr_eq(s, session))
    }

    /// Update the state only while `session` is the live one.
    fn set_state(&mut self, session: &Arc<Session>, state: WebSocketState) {
        if self.is_current(session) {
            self.state = state;
        }
    }

    /// Retire `session`, leaving a newer session untouched.
    fn retire(&mut self, session: &Arc<Session>) {
        if self.is_current(session) {
            self.session = None;
        }
        if self.session.is_none() {
            self.state = WebSocketState::Disconnected;
        }
    }
}

/// Command sent to the WebSocket task.
enum Command {
    SendBinary(Vec<u8>),
    Close(Option<CloseReason>),
}

#[derive(Default)]
struct WebSocketSignals {
    connected: Signal<()>,
    disconnected: Signal<Option<CloseReason>>,
    binary_message_received: Signal<Vec<u8>>,
    error: Signal<NetworkError>,
}

/// A WebSocket client with signal-based event delivery.
///
/// # Signals
///
/// - [`connected`](Self::connected): Emitted when the connection is established
/// - [`disconnected`](Self::disconnected): Emitted when the connection is closed
/// - [`binary_message_received`](Self::binary_message_received): Emitted when a binary message is received
/// - [`error`](Self::error): Emitted when an error occurs
pub struct WebSocketClient {
    config: WebSocketConfig,
    runtime: Option<Handle>,
    inner: Arc<Mutex<WebSocketInner>>,
    signals: Arc<WebSocketSignals>,
}

impl WebSocketClient {
    /// Create a new WebSocket client with the given configuration.
    ///
    /// If called from within a Tokio runtime, that runtime drives the client.
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            runtime: Handle::try_current().ok(),
            inner: Arc::new(Mutex::new(WebSocketInner {
                state: WebSocketState::Disconnected,
                reconnect_attempt: 0,
                session: None,
            })),
            signals: Arc::new(WebSocketSignals::default()),
        }
    }

    /// Drive the client on the given runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Signal emitted when the connection is established.
    pub fn connected(&self) -> &Signal<()> {
        &self.signals.connected
    }

    /// Signal emitted when the connection is closed, with the peer's reason if any.
    pub fn disconnected(&self) -> &Signal<Option<CloseReason>> {
        &self.signals.disconnected
    }

    /// Signal emitted when a binary message is received.
    pub fn binary_message_received(&self) -> &Signal<Vec<u8>> {
        &self.signals.binary_message_received
    }

    /// Signal emitted when an error occurs.
    pub fn error(&self) -> &Signal<NetworkError> {
        &self.signals.error
    }

    /// Get the current connection state.
    pub fn state(&self) -> WebSocketState {
        self.inner.lock().state
    }

    /// Check if the client is connected.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().state == WebSocketState::Connected
    }

    /// Check if a connection was requested and not yet closed.
    pub fn is_active(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    /// Number of the reconnection attempt in progress, 0 when none.
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.lock().reconnect_attempt
    }

    /// Connect to the WebSocket server.
    ///
    /// If the client is already connected or connecting, this is a no-op.
    pub fn connect(&self) {
        let Some(runtime) = self.runtime.clone() else {
            tracing::warn!(target: targets::WEBSOCKET, "connect requested without a runtime");
            self.signals.error.emit(NetworkError::NoRuntime);
            return;
        };

        let session = {
            let mut inner = self.inner.lock();
            if inner.session.is_some() {
                return;
            }
            let session = Session::new();
            inner.session = Some(session.clone());
            inner.state = WebSocketState::Connecting;
            inner.reconnect_attempt = 0;
            session
        };

        runtime.spawn(run_client(
            self.config.clone(),
            self.inner.clone(),
            self.signals.clone(),
            session,
        ));
    }

    /// Disconnect from the WebSocket server.
    ///
    /// Disconnecting an idle client is a no-op.
    pub fn disconnect(&self) {
        self.close(Some(CloseReason::normal()));
    }

    /// Close the connection with an optional close reason.
    pub fn close(&self, reason: Option<CloseReason>) {
        let mut inner = self.inner.lock();
        let Some(session) = inner.session.take() else {
            return;
        };
        session.cancel(reason);
        inner.state = WebSocketState::Disconnected;
        inner.reconnect_attempt = 0;
        tracing::debug!(target: targets::WEBSOCKET, url = %self.config.url, "closing connection");
    }

    /// Send a binary message.
    ///
    /// Returns `Ok(())` if the message was queued for sending, or an error if not connected.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(Command::SendBinary(data.into()))
    }

    fn send(&self, command: Command) -> Result<()> {
        let inner = self.inner.lock();
        let tx = inner
            .session
            .as_ref()
            .and_then(|session| session.command_tx.lock().clone());
        match tx {
            Some(tx) => tx
                .send(command)
                .map_err(|_| NetworkError::Connection("Not connected".into())),
            None => Err(NetworkError::Connection("Not connected".into())),
        }
    }

    /// Get the URL this client is configured to connect to.
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        self.close(None);
    }
}

impl std::fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish()
    }
}

/// Build the WebSocket request with custom headers.
fn build_request(config: &WebSocketConfig) -> Result<Request> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| NetworkError::WebSocket(e.to_string()))?;

    let headers = request.headers_mut();
    for (name, value) in &config.headers {
        let header_name = http::header::HeaderName::try_from(name.as_str())?;
        let header_value = http::header::HeaderValue::try_from(value.as_str())?;
        headers.insert(header_name, header_value);
    }

    Ok(request)
}

fn to_tungstenite_close_code(code: CloseCode) -> TungsteniteCloseCode {
    TungsteniteCloseCode::from(code.as_u16())
}

fn from_close_frame(frame: &CloseFrame) -> CloseReason {
    let code = CloseCode::from_u16(u16::from(frame.code));
    if frame.reason.is_empty() {
        CloseReason::new(code)
    } else {
        CloseReason::with_reason(code, frame.reason.as_str())
    }
}

async fn run_client(
    config: WebSocketConfig,
    inner: Arc<Mutex<WebSocketInner>>,
    signals: Arc<WebSocketSignals>,
    session: Arc<Session>,
) {
    let mut reconnect_attempt: u32 = 0;

    loop {
        let request = match build_request(&config) {
            Ok(req) => req,
            Err(e) => {
                signals.error.emit(e);
                inner.lock().retire(&session);
                return;
            }
        };

        {
            let mut guard = inner.lock();
            let state = if reconnect_attempt > 0 {
                WebSocketState::Reconnecting
            } else {
                WebSocketState::Connecting
            };
            guard.set_state(&session, state);
            if guard.is_current(&session) {
                guard.reconnect_attempt = reconnect_attempt;
            }
        }

        match tokio_tungstenite::connect_async(request).await {
            Ok((ws_stream, _response)) => {
                let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
                *session.command_tx.lock() = Some(tx);

                let (mut write, mut read) = ws_stream.split();

                // Close may have raced with the handshake.
                if session.is_cancelled() {
                    let _ = write.send(Message::Close(None)).await;
                    *session.command_tx.lock() = None;
                    inner.lock().retire(&session);
                    return;
                }

                reconnect_attempt = 0;
                {
                    let mut guard = inner.lock();
                    guard.set_state(&session, WebSocketState::Connected);
                    if guard.is_current(&session) {
                        guard.reconnect_attempt = 0;
                    }
                }
                tracing::debug!(target: targets::WEBSOCKET, url = %config.url, "connected");
                signals.connected.emit(());

                let mut closed_locally = false;
                let mut peer_reason = None;
                loop {
                    tokio::select! {
                        cmd = rx.recv() => {
                            match cmd {
                                Some(Command::SendBinary(data)) => {
                                    if let Err(e) = write.send(Message::Binary(data.into())).await {
                                        signals.error.emit(NetworkError::WebSocket(e.to_string()));
                                        break;
                                    }
                                }
                                Some(Command::Close(reason)) => {
                                    let close_frame = reason.map(|r| CloseFrame {
                                        code: to_tungstenite_close_code(r.code),
                                        reason: r.reason.unwrap_or_default().into(),
                                    });
                                    let _ = write.send(Message::Close(close_frame)).await;
                                    closed_locally = true;
                                    break;
                                }
                                None => {
                                    closed_locally = true;
                                    break;
                                }
                            }
                        }

                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    // OSC is binary; trackers never send TUIO as text.
                                    tracing::trace!(target: targets::WEBSOCKET, len = text.len(), "ignoring text frame");
                                }
                                Some(Ok(Message::Binary(data))) => {
                                    signals.binary_message_received.emit(data.to_vec());
                                }
                                Some(Ok(Message::Close(frame))) => {
                                    peer_reason = frame.as_ref().map(from_close_frame);
                                    break;
                                }
                                Some(Ok(_)) => {
                                    // Ping, pong and raw frames are handled by tungstenite.
                                }
                                Some(Err(e)) => {
                                    signals.error.emit(NetworkError::WebSocket(e.to_string()));
                                    break;
                                }
                                None => break,
                            }
                        }
                    }
                }

                *session.command_tx.lock() = None;
                tracing::debug!(target: targets::WEBSOCKET, url = %config.url, "disconnected");
                signals.disconnected.emit(peer_reason);

                if closed_locally || session.is_cancelled() {
                    inner.lock().retire(&session);
                    return;
                }
            }
            Err(e) => {
                tracing::debug!(target: targets::WEBSOCKET, url = %config.url, error = %e, "connect failed");
                signals.error.emit(NetworkError::WebSocket(e.to_string()));
            }
        }

        let Some(reconnect_config) = config.reconnect.as_ref() else {
            inner.lock().retire(&session);
            return;
        };

        if let Some(max) = reconnect_config.max_attempts
            && reconnect_attempt >= max
        {
            signals.error.emit(NetworkError::Connection(format!(
                "Max reconnection attempts ({}) reached",
                max
            )));
            inner.lock().retire(&session);
            return;
        }

        let delay = reconnect_config.delay_for_attempt(reconnect_attempt);
        inner.lock().set_state(&session, WebSocketState::Reconnecting);
        tokio::time::sleep(delay).await;

        if session.is_cancelled() {
            inner.lock().retire(&session);
            return;
        }

        reconnect_attempt += 1;
    }
}

static_assertions::assert_impl_all!(WebSocketClient: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let config = ReconnectConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(1000))
            .backoff_multiplier(2.0);

        let first = config.delay_for_attempt(0).as_millis();
        assert!((90..=110).contains(&first), "first delay {first}");

        let third = config.delay_for_attempt(2).as_millis();
        assert!((360..=440).contains(&third), "third delay {third}");

        let capped = config.delay_for_attempt(20).as_millis();
        assert!((900..=1100).contains(&capped), "capped delay {capped}");
    }

    #[test]
    fn test_zero_delay_has_no_jitter() {
        let config = ReconnectConfig::new().initial_delay(Duration::ZERO);
        assert_eq!(config.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn test_build_request_with_headers() {
        let config = WebSocketConfig::new("ws://127.0.0.1:3333").header("X-Tracker", "table-1");
        let request = build_request(&config).unwrap();
        assert_eq!(request.headers()["X-Tracker"], "table-1");
    }

    #[test]
    fn test_build_request_rejects_bad_header() {
        let config = WebSocketConfig::new("ws://127.0.0.1:3333").header("bad header", "x");
        assert!(matches!(
            build_request(&config),
            Err(NetworkError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_for_host() {
        let config = WebSocketConfig::for_host("127.0.0.1", 3343).unwrap();
        assert_eq!(config.url, "ws://127.0.0.1:3343/");
    }

    #[test]
    fn test_connect_without_runtime() {
        let client = WebSocketClient::new(WebSocketConfig::new("ws://127.0.0.1:1"));
        client.connect();
        assert_eq!(client.state(), WebSocketState::Disconnected);
        assert!(!client.is_active());
    }
}
