//! The TUIO client: a transport, a packet queue and a protocol dispatcher.
//!
//! Transports run on the I/O runtime and push raw packets into a bounded
//! `crossbeam-channel` queue. The client drains that queue on the frame
//! thread, so all decoding and session bookkeeping happens synchronously
//! inside the frame that consumes it.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use horizon_touch_core::logging::targets;
use horizon_touch_core::{ConnectionId, Signal};
use horizon_touch_net::Transport;
use parking_lot::Mutex;

use super::dispatcher::{ProtocolDispatcher, TuioEvent};
use super::osc::{self, OscMessage};
use crate::config::TuioVersion;

/// Default capacity of the packet queue between transport and frame loop.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Subscribers to raw OSC messages, keyed by address profile.
///
/// Listeners see every decoded message for their profile before TUIO
/// interpretation, including messages of profiles the dispatcher ignores.
#[derive(Debug, Default)]
pub struct MessageListeners {
    profiles: Mutex<HashMap<String, Arc<Signal<OscMessage>>>>,
}

impl MessageListeners {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `listener` for every message addressed to `profile`.
    pub fn add<F>(&self, profile: impl Into<String>, listener: F) -> ConnectionId
    where
        F: Fn(&OscMessage) + Send + Sync + 'static,
    {
        self.profiles
            .lock()
            .entry(profile.into())
            .or_default()
            .connect(listener)
    }

    /// Remove every listener for `profile`. Returns whether any existed.
    pub fn remove_profile(&self, profile: &str) -> bool {
        self.profiles.lock().remove(profile).is_some()
    }

    /// Remove a single listener.
    pub fn remove(&self, profile: &str, id: ConnectionId) -> bool {
        let mut profiles = self.profiles.lock();
        let Some(signal) = profiles.get(profile) else {
            return false;
        };
        let removed = signal.disconnect(id);
        if signal.connection_count() == 0 {
            profiles.remove(profile);
        }
        removed
    }

    /// Number of profiles with at least one listener.
    pub fn profile_count(&self) -> usize {
        self.profiles.lock().len()
    }

    /// Deliver `message` to the listeners of its profile.
    pub fn notify(&self, message: &OscMessage) {
        let signal = self.profiles.lock().get(&message.addr).cloned();
        if let Some(signal) = signal {
            signal.emit(message.clone());
        }
    }
}

/// Receives and decodes TUIO traffic from one transport.
pub struct TuioClient {
    transport: Arc<dyn Transport>,
    packets: Receiver<Vec<u8>>,
    forwarding: ConnectionId,
    dispatcher: ProtocolDispatcher,
    listeners: Arc<MessageListeners>,
}

impl TuioClient {
    /// Create a client reading from `transport` and decoding `version`.
    pub fn new(transport: Arc<dyn Transport>, version: TuioVersion) -> Self {
        Self::with_listeners(transport, version, Arc::new(MessageListeners::new()))
    }

    /// Create a client sharing an existing listener registry.
    pub fn with_listeners(
        transport: Arc<dyn Transport>,
        version: TuioVersion,
        listeners: Arc<MessageListeners>,
    ) -> Self {
        let (sender, packets) = crossbeam_channel::bounded(DEFAULT_QUEUE_CAPACITY);
        let forwarding = transport.forward_to(sender);
        Self {
            transport,
            packets,
            forwarding,
            dispatcher: ProtocolDispatcher::new(version),
            listeners,
        }
    }

    /// The transport this client reads from.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// The protocol version being decoded.
    pub fn version(&self) -> TuioVersion {
        self.dispatcher.version()
    }

    /// The raw message listener registry.
    pub fn listeners(&self) -> &Arc<MessageListeners> {
        &self.listeners
    }

    /// Start receiving. Safe to call when already connected.
    pub fn connect(&self) {
        tracing::debug!(target: targets::TUIO, transport = %self.transport.kind(), version = %self.version(), "connecting");
        self.transport.connect();
    }

    /// Stop receiving and forget all session state.
    ///
    /// Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        tracing::debug!(target: targets::TUIO, transport = %self.transport.kind(), "disconnecting");
        self.transport.disconnect();
        self.packets.try_iter().for_each(drop);
        self.dispatcher.reset();
    }

    /// Whether the transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Decode every queued packet into `messages`, bundles flattened.
    ///
    /// Packets that fail to decode are dropped.
    pub fn receive_messages(&mut self, messages: &mut Vec<OscMessage>) -> usize {
        let before = messages.len();
        for packet in self.packets.try_iter() {
            match osc::decode(&packet) {
                Ok(packet) => packet.into_messages(messages),
                Err(error) => {
                    tracing::trace!(target: targets::TUIO, %error, len = packet.len(), "dropping malformed packet");
                }
            }
        }
        messages.len() - before
    }

    /// Interpret one message, appending committed changes to `events`.
    pub fn dispatch(&mut self, message: &OscMessage, events: &mut Vec<TuioEvent>) {
        self.dispatcher.dispatch(message, events);
    }

    /// Receive, notify listeners and dispatch in one step.
    pub fn process_messages(&mut self, events: &mut Vec<TuioEvent>) {
        let mut messages = Vec::new();
        self.receive_messages(&mut messages);
        for message in &messages {
            self.listeners.notify(message);
            self.dispatch(message, events);
        }
    }
}

impl Drop for TuioClient {
    fn drop(&mut self) {
        self.transport.stop_forwarding(self.forwarding);
    }
}

impl std::fmt::Debug for TuioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuioClient")
            .field("transport", &self.transport.kind())
            .field("version", &self.version())
            .field("queued", &self.packets.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(TuioClient: Send, Sync);
static_assertions::assert_impl_all!(MessageListeners: Send, Sync);
