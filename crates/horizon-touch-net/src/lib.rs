//! Networking module for Horizon Touch.
//!
//! This crate provides the transports that carry TUIO traffic:
//!
//! - **UDP**: [`udp::UdpSocket`] binds a port and emits received datagrams
//! - **WebSocket**: [`websocket::WebSocketClient`] connects to a tracker and
//!   emits binary frames, with optional auto-reconnect
//! - **Loopback**: [`LoopbackTransport`] for in-process packet injection
//!
//! All of them implement [`Transport`], which forwards raw packets into a
//! `crossbeam-channel` sender for the frame loop to drain.
//!
//! Sockets run on a Tokio runtime. Either construct them inside a runtime or
//! pass a handle explicitly:
//!
//! ```ignore
//! use horizon_touch_core::{IoRuntime, IoRuntimeConfig};
//! use horizon_touch_net::udp::{UdpSocket, UdpSocketConfig};
//! use horizon_touch_net::Transport;
//!
//! let runtime = IoRuntime::new(IoRuntimeConfig::default())?;
//! let socket = UdpSocket::new(UdpSocketConfig::any_address(3333))
//!     .with_runtime(runtime.handle().clone());
//!
//! let (tx, rx) = crossbeam_channel::bounded(256);
//! socket.forward_to(tx);
//! socket.connect();
//! ```

mod error;
mod transport;
pub mod udp;
pub mod websocket;

pub use error::{NetworkError, Result};
pub use transport::{LoopbackTransport, Transport, TransportKind};
pub use udp::{Datagram, UdpSocket, UdpSocketConfig, UdpSocketState};
pub use websocket::{
    CloseCode, CloseReason, ReconnectConfig, WebSocketClient, WebSocketConfig, WebSocketState,
};
