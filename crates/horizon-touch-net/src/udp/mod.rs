//! UDP socket with signal-based event delivery.
//!
//! TUIO trackers usually push OSC bundles to UDP port 3333. The socket binds,
//! runs its receive loop on a Tokio runtime, and emits every datagram through
//! a signal.
//!
//! # Example
//!
//! ```ignore
//! use horizon_touch_net::udp::{UdpSocket, UdpSocketConfig};
//!
//! let socket = UdpSocket::new(UdpSocketConfig::any_address(3333));
//!
//! socket.datagram_received().connect(|datagram| {
//!     println!("Received {} bytes from {}", datagram.data.len(), datagram.source);
//! });
//!
//! socket.bind();
//! ```

mod config;
mod socket;
mod state;

pub use config::{Datagram, MAX_DATAGRAM_SIZE, UdpSocketConfig};
pub use socket::UdpSocket;
pub use state::UdpSocketState;
