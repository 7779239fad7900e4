//! UDP socket with signal-based event delivery.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use horizon_touch_core::Signal;
use horizon_touch_core::logging::targets;
use parking_lot::Mutex;
use tokio::net::UdpSocket as TokioUdpSocket;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::config::{Datagram, UdpSocketConfig};
use super::state::UdpSocketState;
use crate::Result;
use crate::error::NetworkError;

/// One bind/close cycle of the socket.
///
/// A new session is created on every `bind()`. A receive task only touches
/// shared state while its own session is still the current one, so a stale
/// task from an earlier cycle cannot clobber a newer one.
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

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(tx) = self.command_tx.lock().as_ref() {
            let _ = tx.send(Command::Close);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Internal state for the UDP socket.
struct UdpSocketInner {
    state: UdpSocketState,
    local_addr: Option<SocketAddr>,
    session: Option<Arc<Session>>,
}

impl UdpSocketInner {
    fn is_current(&self, session: &Arc<Session>) -> bool {
        self.session.as_ref().is_some_and(|s| Arc::ptr_eq(s, session))
    }
}

/// Command sent to the UDP socket's async task.
enum Command {
    SendTo(Vec<u8>, SocketAddr),
    Close,
}

/// Signals published by a [`UdpSocket`].
#[derive(Default)]
struct UdpSocketSignals {
    bound: Signal<SocketAddr>,
    datagram_received: Signal<Datagram>,
    datagram_sent: Signal<usize>,
    closed: Signal<()>,
    error: Signal<NetworkError>,
}

/// A UDP socket with signal-based event delivery.
///
/// # Signals
///
/// - [`bound`](Self::bound): Emitted when the socket is bound successfully
/// - [`datagram_received`](Self::datagram_received): Emitted when a datagram is received
/// - [`datagram_sent`](Self::datagram_sent): Emitted after a datagram is sent
/// - [`closed`](Self::closed): Emitted when the socket is closed
/// - [`error`](Self::error): Emitted when an error occurs
///
/// Signals are emitted from the runtime thread.
///
/// # Example
///
/// ```ignore
/// let socket = UdpSocket::new(UdpSocketConfig::new("0.0.0.0", 3333))
///     .with_runtime(runtime.handle().clone());
///
/// socket.datagram_received().connect(|datagram| {
///     println!("Received {} bytes from {}", datagram.data.len(), datagram.source);
/// });
///
/// socket.bind();
/// ```
pub struct UdpSocket {
    config: UdpSocketConfig,
    runtime: Option<Handle>,
    inner: Arc<Mutex<UdpSocketInner>>,
    signals: Arc<UdpSocketSignals>,
}

impl UdpSocket {
    /// Create a new UDP socket with the given configuration.
    ///
    /// If called from within a Tokio runtime, that runtime drives the socket.
    /// Otherwise supply one with [`with_runtime`](Self::with_runtime).
    pub fn new(config: UdpSocketConfig) -> Self {
        Self {
            config,
            runtime: Handle::try_current().ok(),
            inner: Arc::new(Mutex::new(UdpSocketInner {
                state: UdpSocketState::Unbound,
                local_addr: None,
                session: None,
            })),
            signals: Arc::new(UdpSocketSignals::default()),
        }
    }

    /// Drive the socket on the given runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Signal emitted when the socket is bound successfully.
    pub fn bound(&self) -> &Signal<SocketAddr> {
        &self.signals.bound
    }

    /// Signal emitted when a datagram is received.
    pub fn datagram_received(&self) -> &Signal<Datagram> {
        &self.signals.datagram_received
    }

    /// Signal emitted after a datagram is successfully sent.
    pub fn datagram_sent(&self) -> &Signal<usize> {
        &self.signals.datagram_sent
    }

    /// Signal emitted when the socket is closed.
    pub fn closed(&self) -> &Signal<()> {
        &self.signals.closed
    }

    /// Signal emitted when an error occurs.
    pub fn error(&self) -> &Signal<NetworkError> {
        &self.signals.error
    }

    /// Get the current socket state.
    pub fn state(&self) -> UdpSocketState {
        self.inner.lock().state
    }

    /// Check if the socket is bound.
    pub fn is_bound(&self) -> bool {
        self.inner.lock().state == UdpSocketState::Bound
    }

    /// Check if a bind was requested and not yet closed.
    pub fn is_active(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    /// Get the local address after binding.
    /// Returns `None` if the socket is not bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().local_addr
    }

    /// Bind the socket to the configured address.
    ///
    /// If the socket is already bound or binding, this is a no-op.
    pub fn bind(&self) {
        let Some(runtime) = self.runtime.clone() else {
            tracing::warn!(target: targets::UDP, "bind requested without a runtime");
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
            inner.state = UdpSocketState::Binding;
            inner.local_addr = None;
            session
        };

        let config = self.config.clone();
        let inner = self.inner.clone();
        let signals = self.signals.clone();

        runtime.spawn(run_socket(config, inner, signals, session));
    }

    /// Send a datagram to the specified address.
    ///
    /// Returns `Ok(())` if the datagram was queued for sending, or an error if not bound.
    pub fn send_to(&self, data: impl Into<Vec<u8>>, target: SocketAddr) -> Result<()> {
        let inner = self.inner.lock();
        let tx = inner
            .session
            .as_ref()
            .and_then(|session| session.command_tx.lock().clone());
        match tx {
            Some(tx) => tx
                .send(Command::SendTo(data.into(), target))
                .map_err(|_| NetworkError::UdpSocket("Socket not bound".into())),
            None => Err(NetworkError::UdpSocket("Socket not bound".into())),
        }
    }

    /// Close the socket.
    ///
    /// Closing an unbound or already closed socket is a no-op.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        let Some(session) = inner.session.take() else {
            return;
        };
        session.cancel();
        inner.state = UdpSocketState::Closing;
        tracing::debug!(target: targets::UDP, addr = %self.config.bind_addr(), "closing socket");
    }

    /// Get the configured bind address.
    pub fn bind_addr(&self) -> String {
        self.config.bind_addr()
    }
}

impl Drop for UdpSocket {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for UdpSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpSocket")
            .field("bind_addr", &self.config.bind_addr())
            .field("state", &self.state())
            .finish()
    }
}

/// Finish a session: clear its state and notify listeners.
fn finish(inner: &Mutex<UdpSocketInner>, signals: &UdpSocketSignals, session: &Arc<Session>) {
    *session.command_tx.lock() = None;
    {
        let mut guard = inner.lock();
        if guard.is_current(session) {
            guard.session = None;
        }
        if guard.session.is_none() {
            guard.state = UdpSocketState::Closed;
            guard.local_addr = None;
        }
    }
    signals.closed.emit(());
}

/// Drop a session whose bind failed.
fn abandon(inner: &Mutex<UdpSocketInner>, session: &Arc<Session>) {
    let mut guard = inner.lock();
    if guard.is_current(session) {
        guard.session = None;
        guard.state = UdpSocketState::Unbound;
    } else if guard.session.is_none() {
        guard.state = UdpSocketState::Closed;
    }
}

async fn run_socket(
    config: UdpSocketConfig,
    inner: Arc<Mutex<UdpSocketInner>>,
    signals: Arc<UdpSocketSignals>,
    session: Arc<Session>,
) {
    let socket = match TokioUdpSocket::bind(config.bind_addr()).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(target: targets::UDP, addr = %config.bind_addr(), error = %e, "bind failed");
            signals
                .error
                .emit(NetworkError::UdpSocket(format!("Failed to bind: {}", e)));
            abandon(&inner, &session);
            return;
        }
    };

    let local_addr = match socket.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            signals.error.emit(NetworkError::UdpSocket(format!(
                "Failed to get local address: {}",
                e
            )));
            abandon(&inner, &session);
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    *session.command_tx.lock() = Some(tx);

    // Close may have raced with the bind before the command channel existed.
    if session.is_cancelled() {
        finish(&inner, &signals, &session);
        return;
    }

    {
        let mut guard = inner.lock();
        if guard.is_current(&session) {
            guard.state = UdpSocketState::Bound;
            guard.local_addr = Some(local_addr);
        }
    }
    tracing::debug!(target: targets::UDP, %local_addr, "socket bound");
    signals.bound.emit(local_addr);

    let mut buffer = vec![0u8; config.recv_buffer_size];

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                match cmd {
                    Some(Command::SendTo(data, target)) => {
                        match socket.send_to(&data, target).await {
                            Ok(n) => signals.datagram_sent.emit(n),
                            Err(e) => {
                                signals.error.emit(NetworkError::UdpSocket(format!(
                                    "Send error: {}", e
                                )));
                            }
                        }
                    }
                    Some(Command::Close) | None => {
                        break;
                    }
                }
            }

            result = socket.recv_from(&mut buffer) => {
                match result {
                    Ok((n, source)) => {
                        let datagram = Datagram::new(buffer[..n].to_vec(), source);
                        signals.datagram_received.emit(datagram);
                    }
                    Err(e) => {
                        tracing::trace!(target: targets::UDP, error = %e, "receive error");
                        signals.error.emit(NetworkError::UdpSocket(format!(
                            "Receive error: {}", e
                        )));
                    }
                }
            }
        }
    }

    finish(&inner, &signals, &session);
    tracing::debug!(target: targets::UDP, %local_addr, "socket closed");
}

static_assertions::assert_impl_all!(UdpSocket: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_without_runtime_reports_error() {
        let socket = UdpSocket::new(UdpSocketConfig::new("127.0.0.1", 0));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();
        socket.error().connect(move |e| errors_clone.lock().push(e.clone()));

        socket.bind();

        assert_eq!(*errors.lock(), vec![NetworkError::NoRuntime]);
        assert_eq!(socket.state(), UdpSocketState::Unbound);
        assert!(!socket.is_active());
    }

    #[test]
    fn test_close_unbound_is_noop() {
        let socket = UdpSocket::new(UdpSocketConfig::default());
        socket.close();
        socket.close();
        assert_eq!(socket.state(), UdpSocketState::Unbound);
    }
}
