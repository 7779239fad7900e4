//! Packet transports behind a single interface.
//!
//! A TUIO client does not care whether OSC packets arrive as UDP datagrams
//! or WebSocket binary frames. [`Transport`] abstracts the difference: the
//! client asks the transport to forward every packet into a channel, and
//! drains that channel from its frame loop.
//!
//! `connect()` and `disconnect()` are idempotent on every implementation.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Sender, TrySendError};
use horizon_touch_core::logging::targets;
use horizon_touch_core::{ConnectionId, Signal};

use crate::udp::UdpSocket;
use crate::websocket::WebSocketClient;

/// The wire carrying OSC packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Datagrams received on a bound UDP socket.
    Udp,
    /// Binary frames received from a WebSocket server.
    WebSocket,
    /// Packets injected in-process.
    Loopback,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Udp => write!(f, "UDP"),
            Self::WebSocket => write!(f, "WebSocket"),
            Self::Loopback => write!(f, "Loopback"),
        }
    }
}

/// A source of raw OSC packets.
pub trait Transport: Send + Sync {
    /// Which wire this transport uses.
    fn kind(&self) -> TransportKind;

    /// Start receiving. A no-op when already started.
    fn connect(&self);

    /// Stop receiving. A no-op when already stopped.
    fn disconnect(&self);

    /// Whether a connection was requested and not yet torn down.
    fn is_connected(&self) -> bool;

    /// Forward every received packet into `sink`.
    ///
    /// Packets are dropped rather than blocking when the sink is full, so a
    /// stalled consumer never stalls the network thread.
    fn forward_to(&self, sink: Sender<Vec<u8>>) -> ConnectionId;

    /// Stop a forwarding registered with [`forward_to`](Self::forward_to).
    fn stop_forwarding(&self, id: ConnectionId) -> bool;
}

fn forward(sink: &Sender<Vec<u8>>, packet: Vec<u8>) {
    match sink.try_send(packet) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            tracing::trace!(target: targets::TUIO, "packet queue full, dropping packet");
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

impl Transport for UdpSocket {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn connect(&self) {
        self.bind();
    }

    fn disconnect(&self) {
        self.close();
    }

    fn is_connected(&self) -> bool {
        self.is_active()
    }

    fn forward_to(&self, sink: Sender<Vec<u8>>) -> ConnectionId {
        self.datagram_received()
            .connect(move |datagram| forward(&sink, datagram.data.clone()))
    }

    fn stop_forwarding(&self, id: ConnectionId) -> bool {
        self.datagram_received().disconnect(id)
    }
}

impl Transport for WebSocketClient {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn connect(&self) {
        WebSocketClient::connect(self);
    }

    fn disconnect(&self) {
        WebSocketClient::disconnect(self);
    }

    fn is_connected(&self) -> bool {
        self.is_active()
    }

    fn forward_to(&self, sink: Sender<Vec<u8>>) -> ConnectionId {
        self.binary_message_received()
            .connect(move |frame| forward(&sink, frame.clone()))
    }

    fn stop_forwarding(&self, id: ConnectionId) -> bool {
        self.binary_message_received().disconnect(id)
    }
}

/// An in-process transport fed by [`inject`](Self::inject).
///
/// Useful for replaying recorded sessions and for driving the touch pipeline
/// from tests or simulators without opening sockets.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    connected: AtomicBool,
    packet_received: Signal<Vec<u8>>,
}

impl LoopbackTransport {
    /// Create a disconnected loopback transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a packet as if it came off the wire.
    ///
    /// Packets injected while disconnected are discarded, like datagrams sent
    /// to a closed port. Returns whether the packet was delivered.
    pub fn inject(&self, packet: impl Into<Vec<u8>>) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        self.packet_received.emit(packet.into());
        true
    }
}

impl Transport for LoopbackTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Loopback
    }

    fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn forward_to(&self, sink: Sender<Vec<u8>>) -> ConnectionId {
        self.packet_received
            .connect(move |packet| forward(&sink, packet.clone()))
    }

    fn stop_forwarding(&self, id: ConnectionId) -> bool {
        self.packet_received.disconnect(id)
    }
}

static_assertions::assert_impl_all!(LoopbackTransport: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_connect_idempotent() {
        let transport = LoopbackTransport::new();
        transport.connect();
        transport.connect();
        assert!(transport.is_connected());
        transport.disconnect();
        transport.disconnect();
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_loopback_forwarding() {
        let transport = LoopbackTransport::new();
        let (tx, rx) = crossbeam_channel::bounded(4);
        let id = transport.forward_to(tx);

        assert!(!transport.inject(vec![1]));
        transport.connect();
        assert!(transport.inject(vec![2, 3]));
        assert_eq!(rx.try_recv().unwrap(), vec![2, 3]);
        assert!(rx.try_recv().is_err());

        assert!(transport.stop_forwarding(id));
        transport.inject(vec![4]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_sink_drops_packets() {
        let transport = LoopbackTransport::new();
        let (tx, rx) = crossbeam_channel::bounded(1);
        transport.forward_to(tx);
        transport.connect();

        transport.inject(vec![1]);
        transport.inject(vec![2]);

        assert_eq!(rx.try_recv().unwrap(), vec![1]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_transport_kind_display() {
        assert_eq!(TransportKind::Udp.to_string(), "UDP");
        assert_eq!(TransportKind::WebSocket.to_string(), "WebSocket");
    }
}
