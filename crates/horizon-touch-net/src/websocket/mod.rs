//! WebSocket client for TUIO-over-WebSocket trackers.
//!
//! TUIO trackers that publish over WebSocket send each OSC packet as one
//! binary frame. The client supports:
//! - Plain and secure connections (ws:// and wss://)
//! - Custom handshake headers
//! - Optional auto-reconnect with exponential backoff
//! - Signal-based event delivery
//!
//! # Example
//!
//! ```ignore
//! use horizon_touch_net::websocket::{WebSocketClient, WebSocketConfig};
//!
//! let client = WebSocketClient::new(WebSocketConfig::new("ws://127.0.0.1:3333").auto_reconnect());
//!
//! client.binary_message_received().connect(|frame| {
//!     println!("Received {} bytes", frame.len());
//! });
//!
//! client.connect();
//! ```

mod client;
mod message;

pub use client::{ReconnectConfig, WebSocketClient, WebSocketConfig};
pub use message::{CloseCode, CloseReason, WebSocketState};
