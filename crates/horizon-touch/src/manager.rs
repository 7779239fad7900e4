//! The touch session context.
//!
//! [`TouchManager`] owns everything one input session needs: the input
//! sources, the gestures, a clock and the screen density. Nothing is global;
//! the caller creates the manager, enables it, and calls
//! [`update`](TouchManager::update) once per frame.
//!
//! # Frame order
//!
//! 1. every source polls its device or transport
//! 2. the sources' events are collected into one [`FrameBatch`]
//! 3. the batched `pointers_*` signals are emitted
//! 4. gestures process the batch
//! 5. single-frame button transitions are cleared
//! 6. removed and cancelled pointers go back to their sources for reuse

use std::collections::HashMap;
use std::sync::Arc;

use horizon_touch_core::logging::{span_names, targets};
use horizon_touch_core::{Clock, MonotonicClock, PerfSpan, Signal, Size};

use crate::config::{TouchConfig, check_density};
use crate::error::Result;
use crate::gesture::{FrameContext, Gesture, GestureId, GestureManager, GestureStateChange};
use crate::input::{InputSource, InputSourceId, PointerEvent};
use crate::pointer::{Pointer, PointerId};

/// Screen density assumed when nothing else is known: 96 DPI.
pub const DEFAULT_DOTS_PER_CENTIMETER: f32 = 96.0 / 2.54;

/// The pointer changes of one frame, grouped by kind.
///
/// `removed` and `cancelled` own their pointers; everything else is a
/// snapshot. A pointer updated several times in one frame appears once in
/// `updated`, with its latest state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameBatch {
    pub added: Vec<Pointer>,
    pub pressed: Vec<Pointer>,
    pub updated: Vec<Pointer>,
    pub released: Vec<Pointer>,
    pub removed: Vec<Pointer>,
    pub cancelled: Vec<Pointer>,
}

impl FrameBatch {
    /// Group `events`, keeping their order within each kind.
    pub fn from_events(events: impl IntoIterator<Item = PointerEvent>) -> Self {
        let mut batch = Self::default();
        for event in events {
            batch.push(event);
        }
        batch
    }

    /// Add one event to the batch.
    pub fn push(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Added(p) => self.added.push(p),
            PointerEvent::Pressed(p) => self.pressed.push(p),
            PointerEvent::Updated(p) => match self.updated.iter_mut().find(|u| u.id() == p.id()) {
                Some(existing) => *existing = p,
                None => self.updated.push(p),
            },
            PointerEvent::Released(p) => self.released.push(p),
            PointerEvent::Removed(p) => self.removed.push(p),
            PointerEvent::Cancelled(p) => self.cancelled.push(p),
        }
    }

    /// Whether nothing happened this frame.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.pressed.is_empty()
            && self.updated.is_empty()
            && self.released.is_empty()
            && self.removed.is_empty()
            && self.cancelled.is_empty()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.added.len()
            + self.pressed.len()
            + self.updated.len()
            + self.released.len()
            + self.removed.len()
            + self.cancelled.len()
    }
}

/// One explicitly owned touch input session.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use horizon_touch::{MouseInput, TapGesture, TouchManager, RectTarget};
/// use horizon_touch_core::{Rect, Size};
///
/// let mut touch = TouchManager::new();
/// touch.add_input(Arc::new(MouseInput::mouse()));
/// let tap = touch.add_gesture(TapGesture::new(Arc::new(RectTarget(Rect::new(0.0, 0.0, 200.0, 100.0)))));
/// touch.enable(Size::new(1920.0, 1080.0));
///
/// loop {
///     touch.update();
/// }
/// ```
pub struct TouchManager {
    sources: Vec<Arc<dyn InputSource>>,
    gestures: GestureManager,
    clock: Arc<dyn Clock>,
    dots_per_centimeter: f32,
    screen: Size,
    enabled: bool,
    frame: u64,
    live: HashMap<PointerId, Pointer>,
    pointers_added: Signal<Vec<Pointer>>,
    pointers_pressed: Signal<Vec<Pointer>>,
    pointers_updated: Signal<Vec<Pointer>>,
    pointers_released: Signal<Vec<Pointer>>,
    pointers_removed: Signal<Vec<Pointer>>,
    pointers_cancelled: Signal<Vec<Pointer>>,
}

impl Default for TouchManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchManager {
    /// Create a disabled session timed by the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    /// Create a disabled session timed by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sources: Vec::new(),
            gestures: GestureManager::new(),
            clock,
            dots_per_centimeter: DEFAULT_DOTS_PER_CENTIMETER,
            screen: Size::ZERO,
            enabled: false,
            frame: 0,
            live: HashMap::new(),
            pointers_added: Signal::new(),
            pointers_pressed: Signal::new(),
            pointers_updated: Signal::new(),
            pointers_released: Signal::new(),
            pointers_removed: Signal::new(),
            pointers_cancelled: Signal::new(),
        }
    }

    /// Create a session using the screen density from `config`.
    ///
    /// The config is validated first, since it may have been built in code
    /// rather than loaded.
    pub fn from_config(config: &TouchConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let mut manager = Self::with_clock(clock);
        manager.dots_per_centimeter = config.dots_per_centimeter();
        Ok(manager)
    }

    /// Pixels per centimeter used to normalize gesture distances.
    pub fn dots_per_centimeter(&self) -> f32 {
        self.dots_per_centimeter
    }

    /// Change the screen density. Zero, negative and non-finite values are
    /// refused and leave the current density in place.
    pub fn set_dots_per_centimeter(&mut self, dots_per_centimeter: f32) -> Result<()> {
        check_density(dots_per_centimeter)?;
        self.dots_per_centimeter = dots_per_centimeter;
        Ok(())
    }

    /// Whether the session is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Screen size given to [`enable`](Self::enable).
    pub fn screen_size(&self) -> Size {
        self.screen
    }

    /// Number of frames processed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Add an input source. It is enabled right away if the session is.
    pub fn add_input(&mut self, source: Arc<dyn InputSource>) -> InputSourceId {
        let id = source.id();
        if self.enabled {
            source.enable(self.screen);
        }
        self.sources.push(source);
        tracing::debug!(target: targets::MANAGER, source = %id, "input source added");
        id
    }

    /// Remove an input source.
    ///
    /// The source is disabled first and its cancellations are dispatched
    /// before it is handed back.
    pub fn remove_input(&mut self, id: InputSourceId) -> Option<Arc<dyn InputSource>> {
        let index = self.sources.iter().position(|s| s.id() == id)?;
        let source = self.sources[index].clone();
        source.disable();
        let mut events = Vec::new();
        source.drain_events(&mut events);
        self.dispatch(events);
        tracing::debug!(target: targets::MANAGER, source = %id, "input source removed");
        Some(self.sources.remove(index))
    }

    /// Registered input sources.
    pub fn inputs(&self) -> &[Arc<dyn InputSource>] {
        &self.sources
    }

    /// Register a gesture.
    pub fn add_gesture<G: Gesture>(&mut self, gesture: G) -> GestureId {
        self.gestures.add(gesture)
    }

    /// Unregister a gesture.
    pub fn remove_gesture(&mut self, id: GestureId) -> Option<Box<dyn Gesture>> {
        self.gestures.remove(id)
    }

    /// Borrow a gesture as its concrete type.
    pub fn gesture<G: Gesture>(&self, id: GestureId) -> Option<&G> {
        self.gestures.get(id)
    }

    /// Mutably borrow a gesture as its concrete type.
    pub fn gesture_mut<G: Gesture>(&mut self, id: GestureId) -> Option<&mut G> {
        self.gestures.get_mut(id)
    }

    /// The gesture set.
    pub fn gestures(&self) -> &GestureManager {
        &self.gestures
    }

    /// Start every input source for a screen of `screen` pixels.
    pub fn enable(&mut self, screen: Size) {
        self.screen = screen;
        self.enabled = true;
        for source in &self.sources {
            source.enable(screen);
        }
        tracing::info!(target: targets::MANAGER, width = screen.width, height = screen.height, sources = self.sources.len(), "touch session enabled");
    }

    /// Stop every input source.
    ///
    /// The cancellations this causes are dispatched to listeners and
    /// gestures before returning.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        let mut events = Vec::new();
        for source in &self.sources {
            source.disable();
            source.drain_events(&mut events);
        }
        self.dispatch(events);
        tracing::info!(target: targets::MANAGER, "touch session disabled");
    }

    /// Run one frame.
    pub fn update(&mut self) {
        let _perf = PerfSpan::new(span_names::FRAME);
        let mut events = Vec::new();
        for source in &self.sources {
            source.update_input();
            source.drain_events(&mut events);
        }
        self.dispatch(events);
    }

    /// Cancel a pointer wherever it lives.
    ///
    /// See [`InputSource::cancel_pointer`]. The resulting events are
    /// delivered with the next frame.
    pub fn cancel_pointer(&self, id: PointerId, should_return: bool) -> bool {
        self.sources
            .iter()
            .any(|source| source.cancel_pointer(id, should_return))
    }

    /// Latest snapshot of a live pointer.
    pub fn pointer(&self, id: PointerId) -> Option<&Pointer> {
        self.live.get(&id)
    }

    /// Snapshots of every live pointer, ordered by id.
    pub fn pointers(&self) -> Vec<Pointer> {
        let mut pointers: Vec<Pointer> = self.live.values().cloned().collect();
        pointers.sort_by_key(Pointer::id);
        pointers
    }

    /// Number of live pointers.
    pub fn pointer_count(&self) -> usize {
        self.live.len()
    }

    pub fn pointers_added(&self) -> &Signal<Vec<Pointer>> {
        &self.pointers_added
    }

    pub fn pointers_pressed(&self) -> &Signal<Vec<Pointer>> {
        &self.pointers_pressed
    }

    pub fn pointers_updated(&self) -> &Signal<Vec<Pointer>> {
        &self.pointers_updated
    }

    pub fn pointers_released(&self) -> &Signal<Vec<Pointer>> {
        &self.pointers_released
    }

    pub fn pointers_removed(&self) -> &Signal<Vec<Pointer>> {
        &self.pointers_removed
    }

    pub fn pointers_cancelled(&self) -> &Signal<Vec<Pointer>> {
        &self.pointers_cancelled
    }

    /// Emitted for every state transition of any registered gesture.
    pub fn gesture_state_changed(&self) -> &Signal<(GestureId, GestureStateChange)> {
        self.gestures.state_changed()
    }

    fn dispatch(&mut self, events: Vec<PointerEvent>) {
        self.frame += 1;
        let mut batch = FrameBatch::from_events(events);
        if !batch.is_empty() {
            tracing::trace!(
                target: targets::MANAGER,
                frame = self.frame,
                added = batch.added.len(),
                updated = batch.updated.len(),
                removed = batch.removed.len(),
                cancelled = batch.cancelled.len(),
                "dispatching frame"
            );
        }

        self.track_live(&batch);
        emit_nonempty(&self.pointers_added, &batch.added);
        emit_nonempty(&self.pointers_pressed, &batch.pressed);
        emit_nonempty(&self.pointers_updated, &batch.updated);
        emit_nonempty(&self.pointers_released, &batch.released);
        emit_nonempty(&self.pointers_removed, &batch.removed);
        emit_nonempty(&self.pointers_cancelled, &batch.cancelled);

        let frame = FrameContext {
            now: self.clock.now(),
            dots_per_centimeter: self.dots_per_centimeter,
        };
        self.gestures.process(&batch, &frame);

        for source in &self.sources {
            source.end_frame();
        }

        for pointer in batch.removed.drain(..).chain(batch.cancelled.drain(..)) {
            match self
                .sources
                .iter()
                .find(|source| source.id() == pointer.input_source())
            {
                Some(source) => source.discard_pointer(pointer),
                None => {
                    tracing::trace!(target: targets::MANAGER, pointer = %pointer.id(), "dropping pointer of a removed source");
                }
            }
        }
    }

    fn track_live(&mut self, batch: &FrameBatch) {
        for pointer in batch
            .added
            .iter()
            .chain(&batch.pressed)
            .chain(&batch.updated)
            .chain(&batch.released)
        {
            self.live.insert(pointer.id(), pointer.clone());
        }
        for pointer in batch.removed.iter().chain(&batch.cancelled) {
            self.live.remove(&pointer.id());
        }
    }
}

fn emit_nonempty(signal: &Signal<Vec<Pointer>>, pointers: &[Pointer]) {
    if !pointers.is_empty() {
        signal.emit(pointers.to_vec());
    }
}

impl std::fmt::Debug for TouchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TouchManager")
            .field("sources", &self.sources.len())
            .field("gestures", &self.gestures.len())
            .field("pointers", &self.live.len())
            .field("enabled", &self.enabled)
            .field("screen", &self.screen)
            .field("frame", &self.frame)
            .finish()
    }
}

static_assertions::assert_impl_all!(TouchManager: Send);
