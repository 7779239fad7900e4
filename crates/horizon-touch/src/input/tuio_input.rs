//! TUIO input source.
//!
//! Maps TUIO session ids to pointers. Cursors become [`PointerType::Touch`]
//! pointers and tracked objects become [`PointerType::Object`] pointers, each
//! drawn from its own pool.
//!
//! Protocol noise is tolerated without complaint: a duplicate add is ignored
//! so no pointer leaks, and updates or removals for unknown session ids do
//! nothing.

use std::collections::HashMap;
use std::sync::Arc;

use horizon_touch_core::logging::targets;
use horizon_touch_core::{ConnectionId, Point, Size};
use horizon_touch_net::udp::{UdpSocket, UdpSocketConfig};
use horizon_touch_net::websocket::{WebSocketClient, WebSocketConfig};
use horizon_touch_net::{NetworkError, Transport};
use parking_lot::Mutex;
use tokio::runtime::Handle;

use super::remap::{CoordinatesRemapper, IdentityRemapper, normalized_to_screen};
use super::{InputSource, InputSourceId, PointerEvent, PointerEvents};
use crate::config::{ConnectionType, TuioConfig, TuioVersion};
use crate::error::Result;
use crate::pointer::{Pointer, PointerFlags, PointerId, PointerType};
use crate::pool::{ObjectPool, PoolStats};
use crate::tuio::{MessageListeners, OscMessage, TuioClient, TuioEvent};

/// Where transports come from when the source is (re)configured.
enum TransportSource {
    /// Build a UDP socket or WebSocket client from the config.
    Network(Handle),
    /// Always use this transport.
    Fixed(Arc<dyn Transport>),
}

impl TransportSource {
    fn build(&self, config: &TuioConfig) -> Result<Arc<dyn Transport>> {
        let runtime = match self {
            Self::Fixed(transport) => return Ok(transport.clone()),
            Self::Network(runtime) => runtime,
        };

        let port = config.effective_port();
        let transport: Arc<dyn Transport> = match config.connection {
            ConnectionType::Udp => {
                let socket = UdpSocket::new(UdpSocketConfig::new(&config.ip_address, port))
                    .with_runtime(runtime.clone());
                Arc::new(socket)
            }
            ConnectionType::WebSocket => {
                let client = WebSocketClient::new(
                    WebSocketConfig::for_host(&config.ip_address, port)?.auto_reconnect(),
                )
                .with_runtime(runtime.clone());
                Arc::new(client)
            }
        };
        Ok(transport)
    }
}

fn pointer_pool(capacity: usize, kind: PointerType, source: InputSourceId) -> ObjectPool<Pointer> {
    ObjectPool::new(capacity, move || Pointer::idle(kind, source))
        .with_on_get(Pointer::assign_id)
        .with_on_release(Pointer::reset)
}

struct TuioState {
    config: TuioConfig,
    client: TuioClient,
    touches: HashMap<u32, Pointer>,
    objects: HashMap<u32, Pointer>,
    touch_pool: ObjectPool<Pointer>,
    object_pool: ObjectPool<Pointer>,
    screen: Size,
    enabled: bool,
    remapper: Arc<dyn CoordinatesRemapper>,
    events: PointerEvents,
}

impl TuioState {
    fn to_screen(&self, normalized: Point) -> Point {
        self.remapper
            .remap(normalized_to_screen(normalized, self.screen))
    }

    fn apply(&mut self, event: TuioEvent) {
        match event {
            TuioEvent::CursorAdded {
                session_id,
                position,
            } => self.add_touch(session_id, position),
            TuioEvent::CursorUpdated {
                session_id,
                position,
            } => self.update_touch(session_id, position),
            TuioEvent::CursorRemoved { session_id } => self.remove_touch(session_id),
            TuioEvent::ObjectAdded {
                session_id,
                symbol_id,
                position,
                angle,
            } => self.add_object(session_id, symbol_id, position, angle),
            TuioEvent::ObjectUpdated {
                session_id,
                symbol_id,
                position,
                angle,
            } => self.update_object(session_id, symbol_id, position, angle),
            TuioEvent::ObjectRemoved { session_id } => self.remove_object(session_id),
        }
    }

    fn add_touch(&mut self, session_id: u32, normalized: Point) {
        if self.touches.contains_key(&session_id) {
            tracing::trace!(target: targets::INPUT, session_id, "ignoring duplicate cursor");
            return;
        }
        let mut pointer = self.touch_pool.get();
        pointer.set_position(self.to_screen(normalized));
        pointer.buttons_mut().press(0);
        self.events.added(&pointer);
        self.events.pressed(&pointer);
        self.touches.insert(session_id, pointer);
    }

    fn update_touch(&mut self, session_id: u32, normalized: Point) {
        let position = self.to_screen(normalized);
        let Some(pointer) = self.touches.get_mut(&session_id) else {
            return;
        };
        pointer.set_position(position);
        self.events.updated(pointer);
    }

    fn remove_touch(&mut self, session_id: u32) {
        let Some(mut pointer) = self.touches.remove(&session_id) else {
            return;
        };
        pointer.buttons_mut().release(0);
        self.events.released(&pointer);
        self.events.removed(pointer);
    }

    fn add_object(&mut self, session_id: u32, symbol_id: i32, normalized: Point, angle: f32) {
        if self.objects.contains_key(&session_id) {
            tracing::trace!(target: targets::INPUT, session_id, "ignoring duplicate object");
            return;
        }
        let mut pointer = self.object_pool.get();
        pointer.set_position(self.to_screen(normalized));
        pointer.set_object(symbol_id, angle);
        pointer.buttons_mut().press(0);
        self.events.added(&pointer);
        self.events.pressed(&pointer);
        self.objects.insert(session_id, pointer);
    }

    fn update_object(&mut self, session_id: u32, symbol_id: i32, normalized: Point, angle: f32) {
        let position = self.to_screen(normalized);
        let Some(pointer) = self.objects.get_mut(&session_id) else {
            return;
        };
        pointer.set_position(position);
        pointer.set_object(symbol_id, angle);
        self.events.updated(pointer);
    }

    fn remove_object(&mut self, session_id: u32) {
        let Some(mut pointer) = self.objects.remove(&session_id) else {
            return;
        };
        pointer.buttons_mut().release(0);
        self.events.released(&pointer);
        self.events.removed(pointer);
    }

    fn cancel(&mut self, id: PointerId, should_return: bool) -> bool {
        let (session_id, sessions, pool) =
            if let Some(session_id) = find_session(&self.touches, id) {
                (session_id, &mut self.touches, &mut self.touch_pool)
            } else if let Some(session_id) = find_session(&self.objects, id) {
                (session_id, &mut self.objects, &mut self.object_pool)
            } else {
                return false;
            };
        let Some(old) = sessions.remove(&session_id) else {
            return false;
        };

        if should_return {
            let mut returned = pool.get();
            returned.copy_from(&old);
            returned.insert_flags(PointerFlags::RETURNED);
            returned.buttons_mut().press(0);
            tracing::debug!(target: targets::INPUT, old = %old.id(), new = %returned.id(), session_id, "returning cancelled pointer");
            self.events.cancelled(old);
            self.events.added(&returned);
            self.events.pressed(&returned);
            sessions.insert(session_id, returned);
        } else {
            tracing::debug!(target: targets::INPUT, pointer = %old.id(), session_id, "cancelling pointer");
            self.events.cancelled(old);
        }
        true
    }

    fn cancel_all(&mut self) {
        let mut cancelled: Vec<Pointer> = self
            .touches
            .drain()
            .chain(self.objects.drain())
            .map(|(_, pointer)| pointer)
            .collect();
        cancelled.sort_by_key(Pointer::id);
        for pointer in cancelled {
            self.events.cancelled(pointer);
        }
    }
}

fn find_session(sessions: &HashMap<u32, Pointer>, id: PointerId) -> Option<u32> {
    sessions
        .iter()
        .find(|(_, pointer)| pointer.id() == id)
        .map(|(&session_id, _)| session_id)
}

/// Input source fed by a TUIO tracker.
///
/// # Example
///
/// ```ignore
/// use horizon_touch::{TuioConfig, TuioInput};
/// use horizon_touch_core::{IoRuntime, IoRuntimeConfig};
///
/// let runtime = IoRuntime::new(IoRuntimeConfig::default())?;
/// let input = TuioInput::with_runtime(TuioConfig::default(), runtime.handle().clone())?;
/// ```
pub struct TuioInput {
    id: InputSourceId,
    transports: TransportSource,
    listeners: Arc<MessageListeners>,
    state: Mutex<TuioState>,
}

impl TuioInput {
    /// Create a source whose transport runs on the current Tokio runtime.
    ///
    /// Fails with [`NetworkError::NoRuntime`] when called outside one; use
    /// [`with_runtime`](Self::with_runtime) there.
    pub fn new(config: TuioConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| NetworkError::NoRuntime)?;
        Self::build(config, TransportSource::Network(runtime))
    }

    /// Create a source whose transport runs on `runtime`.
    pub fn with_runtime(config: TuioConfig, runtime: Handle) -> Result<Self> {
        Self::build(config, TransportSource::Network(runtime))
    }

    /// Create a source reading from a caller-provided transport.
    ///
    /// The connection settings in `config` are ignored; the version and pool
    /// capacity still apply.
    pub fn with_transport(config: TuioConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::build(config, TransportSource::Fixed(transport))
    }

    fn build(config: TuioConfig, transports: TransportSource) -> Result<Self> {
        if matches!(transports, TransportSource::Network(_)) {
            config.validate()?;
        }
        let id = InputSourceId::next();
        let listeners = Arc::new(MessageListeners::new());
        let transport = transports.build(&config)?;
        let client = TuioClient::with_listeners(transport, config.version, listeners.clone());

        let state = TuioState {
            touch_pool: pointer_pool(config.pool_capacity, PointerType::Touch, id),
            object_pool: pointer_pool(config.pool_capacity, PointerType::Object, id),
            config,
            client,
            touches: HashMap::new(),
            objects: HashMap::new(),
            screen: Size::ZERO,
            enabled: false,
            remapper: Arc::new(IdentityRemapper),
            events: PointerEvents::default(),
        };

        Ok(Self {
            id,
            transports,
            listeners,
            state: Mutex::new(state),
        })
    }

    /// The active configuration.
    pub fn config(&self) -> TuioConfig {
        self.state.lock().config.clone()
    }

    /// The protocol version being decoded.
    pub fn version(&self) -> TuioVersion {
        self.state.lock().client.version()
    }

    /// The screen size given to [`enable`](InputSource::enable).
    pub fn resolution(&self) -> Size {
        self.state.lock().screen
    }

    /// Whether the source is enabled.
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Whether the transport is connected.
    pub fn is_connected(&self) -> bool {
        self.state.lock().client.is_connected()
    }

    /// Number of live touch pointers.
    pub fn touch_count(&self) -> usize {
        self.state.lock().touches.len()
    }

    /// Number of live object pointers.
    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Statistics of the touch pointer pool.
    pub fn touch_pool_stats(&self) -> PoolStats {
        self.state.lock().touch_pool.stats()
    }

    /// Statistics of the object pointer pool.
    pub fn object_pool_stats(&self) -> PoolStats {
        self.state.lock().object_pool.stats()
    }

    /// Snapshot of the pointer mapped to a cursor session, if any.
    pub fn touch_for_session(&self, session_id: u32) -> Option<Pointer> {
        self.state.lock().touches.get(&session_id).cloned()
    }

    /// Snapshot of the pointer mapped to an object session, if any.
    pub fn object_for_session(&self, session_id: u32) -> Option<Pointer> {
        self.state.lock().objects.get(&session_id).cloned()
    }

    /// Listen to raw OSC messages of one address profile.
    pub fn add_message_listener<F>(&self, profile: impl Into<String>, listener: F) -> ConnectionId
    where
        F: Fn(&OscMessage) + Send + Sync + 'static,
    {
        self.listeners.add(profile, listener)
    }

    /// Remove every listener of `profile`.
    pub fn remove_message_listener(&self, profile: &str) -> bool {
        self.listeners.remove_profile(profile)
    }

    /// Remove one listener of `profile`.
    pub fn disconnect_message_listener(&self, profile: &str, id: ConnectionId) -> bool {
        self.listeners.remove(profile, id)
    }

    /// Switch to a new configuration.
    ///
    /// Every live pointer is cancelled and the connection is rebuilt. The
    /// source reconnects right away if it was enabled. Message listeners are
    /// kept.
    pub fn reconfigure(&self, config: TuioConfig) -> Result<()> {
        if matches!(self.transports, TransportSource::Network(_)) {
            config.validate()?;
        }
        let transport = self.transports.build(&config)?;

        let mut state = self.state.lock();
        state.cancel_all();
        state.client.disconnect();
        state.client = TuioClient::with_listeners(transport, config.version, self.listeners.clone());
        tracing::info!(target: targets::INPUT, version = %config.version, connection = %config.connection, port = config.effective_port(), "reconfigured TUIO input");
        state.config = config;
        if state.enabled {
            state.client.connect();
        }
        Ok(())
    }
}

impl InputSource for TuioInput {
    fn id(&self) -> InputSourceId {
        self.id
    }

    fn update_input(&self) -> bool {
        let mut messages = Vec::new();
        {
            let mut state = self.state.lock();
            if !state.enabled {
                return false;
            }
            state.client.receive_messages(&mut messages);
        }
        if messages.is_empty() {
            return true;
        }

        // Listeners run unlocked so they may call back into this source.
        for message in &messages {
            self.listeners.notify(message);
        }

        let mut tuio_events = Vec::new();
        let mut state = self.state.lock();
        if !state.enabled {
            return false;
        }
        for message in &messages {
            state.client.dispatch(message, &mut tuio_events);
        }
        for event in tuio_events {
            state.apply(event);
        }
        true
    }

    fn drain_events(&self, events: &mut Vec<PointerEvent>) {
        self.state.lock().events.drain_into(events);
    }

    fn cancel_pointer(&self, id: PointerId, should_return: bool) -> bool {
        self.state.lock().cancel(id, should_return)
    }

    fn discard_pointer(&self, pointer: Pointer) {
        let mut state = self.state.lock();
        match pointer.pointer_type() {
            PointerType::Touch => state.touch_pool.release(pointer),
            PointerType::Object => state.object_pool.release(pointer),
            PointerType::Mouse | PointerType::Pen => {}
        }
    }

    fn end_frame(&self) {
        let mut state = self.state.lock();
        let TuioState {
            touches, objects, ..
        } = &mut *state;
        for pointer in touches.values_mut().chain(objects.values_mut()) {
            pointer.buttons_mut().clear_transitions();
        }
    }

    fn enable(&self, screen: Size) {
        let mut state = self.state.lock();
        state.screen = screen;
        if state.enabled {
            return;
        }
        state.enabled = true;
        state.client.connect();
        tracing::debug!(target: targets::INPUT, source = %self.id, width = screen.width, height = screen.height, "TUIO input enabled");
    }

    fn disable(&self) {
        let mut state = self.state.lock();
        if !state.enabled {
            return;
        }
        state.cancel_all();
        state.client.disconnect();
        state.enabled = false;
        tracing::debug!(target: targets::INPUT, source = %self.id, "TUIO input disabled");
    }

    fn set_remapper(&self, remapper: Arc<dyn CoordinatesRemapper>) {
        self.state.lock().remapper = remapper;
    }
}

impl std::fmt::Debug for TuioInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TuioInput")
            .field("id", &self.id)
            .field("version", &state.config.version)
            .field("connection", &state.config.connection)
            .field("touches", &state.touches.len())
            .field("objects", &state.objects.len())
            .field("enabled", &state.enabled)
            .finish()
    }
}

static_assertions::assert_impl_all!(TuioInput: Send, Sync);
