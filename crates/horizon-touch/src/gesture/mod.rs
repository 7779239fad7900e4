//! Gesture recognition over the unified pointer stream.
//!
//! A gesture watches one target. Pointers that are pressed over the target
//! join the gesture and are tracked by id until they are released or
//! cancelled. Once per frame the [`GestureManager`] hands every gesture the
//! pointers that changed, through the callbacks of the [`Gesture`] trait:
//!
//! 1. `touches_began` for pointers that joined this frame
//! 2. `touches_moved` for tracked pointers that moved
//! 3. `touches_ended` for tracked pointers that were released
//! 4. `touches_cancelled` for tracked pointers that were cancelled
//!
//! # State machine
//!
//! ```text
//! Possible ──> Began ──> Changed* ──> Ended | Recognized | Failed
//!     │
//!     ├──> Recognized | Failed           (discrete gestures)
//!     └──> Cancelled                     (also from Began/Changed)
//! ```
//!
//! `Recognized`, `Failed`, `Ended` and `Cancelled` are terminal. A terminal
//! gesture keeps tracking its pointers but receives no callbacks. It is reset
//! to `Possible` at the start of the first frame in which it has no active
//! pointers left, so results stay readable for the rest of the frame that
//! produced them.

mod tap;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use horizon_touch_core::logging::{span_names, targets};
use horizon_touch_core::{Point, Rect, Signal};
use slotmap::{SlotMap, new_key_type};

use crate::manager::FrameBatch;
use crate::pointer::{Pointer, PointerId};

pub use tap::TapGesture;

/// Recognition state of a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GestureState {
    /// Waiting for input. The state after every reset.
    #[default]
    Possible,
    /// A continuous gesture started.
    Began,
    /// A continuous gesture changed.
    Changed,
    /// A discrete gesture was recognized.
    Recognized,
    /// The input did not match.
    Failed,
    /// A continuous gesture finished.
    Ended,
    /// The gesture was interrupted.
    Cancelled,
}

impl GestureState {
    /// Whether this state ends a recognition attempt.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Recognized | Self::Failed | Self::Ended | Self::Cancelled
        )
    }

    /// Whether a gesture may move from `self` to `next`.
    ///
    /// Leaving a terminal state is only possible through a reset.
    pub fn can_transition_to(self, next: GestureState) -> bool {
        use GestureState::*;
        match self {
            Possible => matches!(next, Began | Recognized | Failed | Cancelled),
            Began | Changed => matches!(next, Changed | Ended | Recognized | Failed | Cancelled),
            Recognized | Failed | Ended | Cancelled => false,
        }
    }
}

impl fmt::Display for GestureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Possible => "possible",
            Self::Began => "began",
            Self::Changed => "changed",
            Self::Recognized => "recognized",
            Self::Failed => "failed",
            Self::Ended => "ended",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One accepted state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureStateChange {
    pub previous: GestureState,
    pub current: GestureState,
}

/// Where a position hit a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    /// The screen position that was tested.
    pub position: Point,
    /// The same position relative to the target's origin.
    pub local: Point,
}

/// The region a gesture listens on.
pub trait HitTarget: Send + Sync {
    /// Test a screen position, returning where it hit.
    fn hit_test(&self, position: Point) -> Option<HitResult>;
}

/// A rectangular target in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectTarget(pub Rect);

impl HitTarget for RectTarget {
    fn hit_test(&self, position: Point) -> Option<HitResult> {
        self.0.contains(position).then(|| HitResult {
            position,
            local: position - self.0.origin,
        })
    }
}

impl<F> HitTarget for F
where
    F: Fn(Point) -> bool + Send + Sync,
{
    fn hit_test(&self, position: Point) -> Option<HitResult> {
        self(position).then_some(HitResult {
            position,
            local: position,
        })
    }
}

/// Per-frame values shared by every gesture callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Frame timestamp in seconds.
    pub now: f64,
    /// Screen density used to turn pixel distances into centimeters.
    pub dots_per_centimeter: f32,
}

/// State shared by every gesture implementation.
pub struct GestureCore {
    name: String,
    state: GestureState,
    target: Arc<dyn HitTarget>,
    active: Vec<Pointer>,
    state_changed: Signal<GestureStateChange>,
    transitions: Vec<GestureStateChange>,
}

impl GestureCore {
    /// Create a core in the `Possible` state.
    pub fn new(name: impl Into<String>, target: Arc<dyn HitTarget>) -> Self {
        Self {
            name: name.into(),
            state: GestureState::Possible,
            target,
            active: Vec::new(),
            state_changed: Signal::new(),
            transitions: Vec::new(),
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> GestureState {
        self.state
    }

    /// The target this gesture listens on.
    pub fn target(&self) -> &Arc<dyn HitTarget> {
        &self.target
    }

    /// Test a screen position against the target.
    pub fn hit_test(&self, position: Point) -> Option<HitResult> {
        self.target.hit_test(position)
    }

    /// Snapshots of the pointers currently interacting with the target.
    pub fn active_pointers(&self) -> &[Pointer] {
        &self.active
    }

    /// Number of active pointers.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Whether `id` is one of the active pointers.
    pub fn is_tracking(&self, id: PointerId) -> bool {
        self.active.iter().any(|p| p.id() == id)
    }

    /// Centroid of the active pointers, or [`Point::INVALID`] without any.
    pub fn screen_position(&self) -> Point {
        Point::centroid(self.active.iter().map(Pointer::position)).unwrap_or(Point::INVALID)
    }

    /// Centroid of the active pointers' previous positions.
    pub fn previous_screen_position(&self) -> Point {
        Point::centroid(self.active.iter().map(Pointer::previous_position))
            .unwrap_or(Point::INVALID)
    }

    /// Emitted after every accepted state transition.
    pub fn state_changed(&self) -> &Signal<GestureStateChange> {
        &self.state_changed
    }

    /// Move to `next`, returning whether the transition was allowed.
    pub fn set_state(&mut self, next: GestureState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(target: targets::GESTURE, gesture = %self.name, from = %self.state, to = %next, "refusing invalid state transition");
            return false;
        }
        self.transition(next);
        true
    }

    fn transition(&mut self, next: GestureState) {
        let change = GestureStateChange {
            previous: self.state,
            current: next,
        };
        self.state = next;
        tracing::debug!(target: targets::GESTURE, gesture = %self.name, from = %change.previous, to = %change.current, "state changed");
        self.transitions.push(change);
        self.state_changed.emit(change);
    }

    fn reset_state(&mut self) {
        if self.state != GestureState::Possible {
            self.transition(GestureState::Possible);
        }
    }

    fn track(&mut self, pointer: &Pointer) {
        self.active.push(pointer.clone());
    }

    /// Refresh the snapshot of a tracked pointer.
    fn refresh(&mut self, pointer: &Pointer) -> bool {
        match self.active.iter_mut().find(|p| p.id() == pointer.id()) {
            Some(slot) => {
                *slot = pointer.clone();
                true
            }
            None => false,
        }
    }

    fn untrack(&mut self, id: PointerId) -> bool {
        let before = self.active.len();
        self.active.retain(|p| p.id() != id);
        self.active.len() != before
    }
}

impl fmt::Debug for GestureCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureCore")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("active", &self.active.len())
            .finish()
    }
}

/// A recognizer driven by pointer changes over its target.
///
/// Implementations embed a [`GestureCore`] and override the callbacks they
/// care about. The callbacks run only while the gesture is not terminal.
pub trait Gesture: Any + Send {
    fn core(&self) -> &GestureCore;
    fn core_mut(&mut self) -> &mut GestureCore;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Pointers were pressed over the target. They are already active.
    fn touches_began(&mut self, _pointers: &[Pointer], _frame: &FrameContext) {}

    /// Active pointers moved. Snapshots are already refreshed.
    fn touches_moved(&mut self, _pointers: &[Pointer], _frame: &FrameContext) {}

    /// Active pointers were released. They are no longer active.
    fn touches_ended(&mut self, _pointers: &[Pointer], _frame: &FrameContext) {}

    /// Active pointers were cancelled. They are no longer active.
    fn touches_cancelled(&mut self, _pointers: &[Pointer], _frame: &FrameContext) {}

    /// Clear per-attempt accumulators before the gesture returns to
    /// `Possible`.
    fn reset(&mut self) {}

    /// Representative screen position of the gesture.
    fn screen_position(&self) -> Point {
        self.core().screen_position()
    }

    /// Representative screen position one update earlier.
    fn previous_screen_position(&self) -> Point {
        self.core().previous_screen_position()
    }

    /// Current state.
    fn state(&self) -> GestureState {
        self.core().state()
    }
}

new_key_type! {
    /// Handle of a gesture registered with a [`GestureManager`].
    pub struct GestureId;
}

/// Owns gestures and feeds them each frame's pointer changes.
pub struct GestureManager {
    gestures: SlotMap<GestureId, Box<dyn Gesture>>,
    state_changed: Signal<(GestureId, GestureStateChange)>,
}

impl Default for GestureManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureManager {
    /// Create a manager without gestures.
    pub fn new() -> Self {
        Self {
            gestures: SlotMap::with_key(),
            state_changed: Signal::new(),
        }
    }

    /// Register a gesture.
    pub fn add<G: Gesture>(&mut self, gesture: G) -> GestureId {
        let id = self.gestures.insert(Box::new(gesture));
        tracing::debug!(target: targets::GESTURE, ?id, "gesture added");
        id
    }

    /// Unregister a gesture, handing it back.
    pub fn remove(&mut self, id: GestureId) -> Option<Box<dyn Gesture>> {
        self.gestures.remove(id)
    }

    /// Borrow a gesture as its concrete type.
    pub fn get<G: Gesture>(&self, id: GestureId) -> Option<&G> {
        self.gestures.get(id)?.as_any().downcast_ref()
    }

    /// Mutably borrow a gesture as its concrete type.
    pub fn get_mut<G: Gesture>(&mut self, id: GestureId) -> Option<&mut G> {
        self.gestures.get_mut(id)?.as_any_mut().downcast_mut()
    }

    /// Borrow a gesture through the trait.
    pub fn gesture(&self, id: GestureId) -> Option<&dyn Gesture> {
        self.gestures.get(id).map(|g| g.as_ref())
    }

    /// Number of registered gestures.
    pub fn len(&self) -> usize {
        self.gestures.len()
    }

    /// Whether no gesture is registered.
    pub fn is_empty(&self) -> bool {
        self.gestures.is_empty()
    }

    /// Emitted for every accepted transition of any gesture.
    pub fn state_changed(&self) -> &Signal<(GestureId, GestureStateChange)> {
        &self.state_changed
    }

    /// Dispatch one frame of pointer changes.
    pub fn process(&mut self, batch: &FrameBatch, frame: &FrameContext) {
        let _span = tracing::trace_span!(target: targets::GESTURE, span_names::GESTURES).entered();
        for (id, gesture) in &mut self.gestures {
            process_gesture(gesture.as_mut(), batch, frame);
            for change in gesture.core_mut().transitions.drain(..) {
                self.state_changed.emit((id, change));
            }
        }
    }
}

impl fmt::Debug for GestureManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureManager")
            .field("gestures", &self.gestures.len())
            .finish()
    }
}

fn process_gesture(gesture: &mut dyn Gesture, batch: &FrameBatch, frame: &FrameContext) {
    let core = gesture.core_mut();
    if core.state().is_terminal() && core.active.is_empty() {
        gesture.reset();
        gesture.core_mut().reset_state();
    }

    let core = gesture.core_mut();
    let began: Vec<Pointer> = batch
        .pressed
        .iter()
        .filter(|p| !core.is_tracking(p.id()) && core.hit_test(p.position()).is_some())
        .cloned()
        .collect();
    for pointer in &began {
        core.track(pointer);
    }
    if !began.is_empty() && !gesture.state().is_terminal() {
        gesture.touches_began(&began, frame);
    }

    let core = gesture.core_mut();
    let moved: Vec<Pointer> = batch
        .updated
        .iter()
        .filter(|p| core.refresh(p))
        .cloned()
        .collect();
    if !moved.is_empty() && !gesture.state().is_terminal() {
        gesture.touches_moved(&moved, frame);
    }

    // A pointer ends on its last button release, or on removal if the
    // source never released it.
    let core = gesture.core_mut();
    let ended: Vec<Pointer> = batch
        .released
        .iter()
        .filter(|p| !p.buttons().any_pressed())
        .chain(batch.removed.iter())
        .filter(|p| core.untrack(p.id()))
        .cloned()
        .collect();
    if !ended.is_empty() && !gesture.state().is_terminal() {
        gesture.touches_ended(&ended, frame);
    }

    let core = gesture.core_mut();
    let cancelled: Vec<Pointer> = batch
        .cancelled
        .iter()
        .filter(|p| core.untrack(p.id()))
        .cloned()
        .collect();
    if !cancelled.is_empty() && !gesture.state().is_terminal() {
        gesture.touches_cancelled(&cancelled, frame);
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::input::InputSourceId;
    use crate::pointer::PointerType;

    /// Records callbacks and turns the first `touches_ended` into a result.
    struct Probe {
        core: GestureCore,
        calls: Vec<(&'static str, usize)>,
        outcome: GestureState,
        resets: usize,
    }

    impl Probe {
        fn new(outcome: GestureState) -> Self {
            Self {
                core: GestureCore::new(
                    "probe",
                    Arc::new(RectTarget(Rect::new(0.0, 0.0, 100.0, 100.0))),
                ),
                calls: Vec::new(),
                outcome,
                resets: 0,
            }
        }
    }

    impl Gesture for Probe {
        fn core(&self) -> &GestureCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut GestureCore {
            &mut self.core
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn touches_began(&mut self, pointers: &[Pointer], _frame: &FrameContext) {
            self.calls.push(("began", pointers.len()));
        }
        fn touches_moved(&mut self, pointers: &[Pointer], _frame: &FrameContext) {
            self.calls.push(("moved", pointers.len()));
        }
        fn touches_ended(&mut self, pointers: &[Pointer], _frame: &FrameContext) {
            self.calls.push(("ended", pointers.len()));
            if self.core.active_count() == 0 {
                self.core.set_state(self.outcome);
            }
        }
        fn touches_cancelled(&mut self, pointers: &[Pointer], _frame: &FrameContext) {
            self.calls.push(("cancelled", pointers.len()));
            self.core.set_state(GestureState::Cancelled);
        }
        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    const FRAME: FrameContext = FrameContext {
        now: 0.0,
        dots_per_centimeter: 10.0,
    };

    fn touch(x: f32, y: f32) -> Pointer {
        let mut pointer = Pointer::new(PointerType::Touch, InputSourceId::next());
        pointer.set_position(Point::new(x, y));
        pointer.buttons_mut().press(0);
        pointer
    }

    fn moved(pointer: &Pointer, x: f32, y: f32) -> Pointer {
        let mut pointer = pointer.clone();
        pointer.set_position(Point::new(x, y));
        pointer
    }

    fn released(pointer: &Pointer) -> Pointer {
        let mut pointer = pointer.clone();
        pointer.buttons_mut().release(0);
        pointer
    }

    #[test]
    fn test_transition_rules() {
        use GestureState::*;
        assert!(Possible.can_transition_to(Recognized));
        assert!(Possible.can_transition_to(Began));
        assert!(!Possible.can_transition_to(Changed));
        assert!(!Possible.can_transition_to(Ended));
        assert!(Began.can_transition_to(Changed));
        assert!(Changed.can_transition_to(Ended));
        assert!(!Recognized.can_transition_to(Possible));
        assert!(!Failed.can_transition_to(Began));
        assert!(Cancelled.is_terminal());
        assert!(!Changed.is_terminal());
    }

    #[test]
    fn test_invalid_transition_refused() {
        let mut core = GestureCore::new("core", Arc::new(|_: Point| true));
        assert!(!core.set_state(GestureState::Ended));
        assert_eq!(core.state(), GestureState::Possible);
        assert!(core.set_state(GestureState::Began));
        assert!(core.set_state(GestureState::Changed));
        assert!(core.set_state(GestureState::Ended));
        assert!(!core.set_state(GestureState::Changed));
    }

    #[test]
    fn test_state_changed_signal() {
        let mut core = GestureCore::new("core", Arc::new(|_: Point| true));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        core.state_changed().connect(move |change| {
            seen_clone.lock().push(*change);
        });
        core.set_state(GestureState::Failed);
        assert_eq!(
            *seen.lock(),
            vec![GestureStateChange {
                previous: GestureState::Possible,
                current: GestureState::Failed,
            }]
        );
    }

    #[test]
    fn test_rect_target() {
        let target = RectTarget(Rect::new(10.0, 10.0, 20.0, 20.0));
        let hit = target.hit_test(Point::new(15.0, 25.0)).unwrap();
        assert_eq!(hit.local, Point::new(5.0, 15.0));
        assert!(target.hit_test(Point::new(31.0, 15.0)).is_none());
    }

    #[test]
    fn test_join_only_over_target() {
        let mut manager = GestureManager::new();
        let id = manager.add(Probe::new(GestureState::Recognized));
        let inside = touch(50.0, 50.0);
        let outside = touch(150.0, 50.0);

        let batch = FrameBatch {
            pressed: vec![inside.clone(), outside.clone()],
            ..FrameBatch::default()
        };
        manager.process(&batch, &FRAME);

        let probe = manager.get::<Probe>(id).unwrap();
        assert_eq!(probe.calls, vec![("began", 1)]);
        assert!(probe.core.is_tracking(inside.id()));
        assert!(!probe.core.is_tracking(outside.id()));
        assert_eq!(probe.screen_position(), Point::new(50.0, 50.0));
    }

    #[test]
    fn test_callback_order_within_frame() {
        let mut manager = GestureManager::new();
        let id = manager.add(Probe::new(GestureState::Recognized));
        let a = touch(10.0, 10.0);

        let batch = FrameBatch {
            pressed: vec![a.clone()],
            updated: vec![moved(&a, 20.0, 10.0)],
            released: vec![released(&moved(&a, 20.0, 10.0))],
            ..FrameBatch::default()
        };
        manager.process(&batch, &FRAME);

        let probe = manager.get::<Probe>(id).unwrap();
        assert_eq!(probe.calls, vec![("began", 1), ("moved", 1), ("ended", 1)]);
        assert_eq!(probe.state(), GestureState::Recognized);
    }

    #[test]
    fn test_terminal_gesture_tracks_silently_then_resets() {
        let mut manager = GestureManager::new();
        let id = manager.add(Probe::new(GestureState::Recognized));
        let a = touch(10.0, 10.0);
        let b = touch(20.0, 20.0);

        manager.process(
            &FrameBatch {
                pressed: vec![a.clone()],
                ..FrameBatch::default()
            },
            &FRAME,
        );
        manager.process(
            &FrameBatch {
                cancelled: vec![a.clone()],
                ..FrameBatch::default()
            },
            &FRAME,
        );
        assert_eq!(manager.get::<Probe>(id).unwrap().state(), GestureState::Cancelled);

        // Next frame resets because nothing is active any more.
        manager.process(
            &FrameBatch {
                pressed: vec![b.clone()],
                ..FrameBatch::default()
            },
            &FRAME,
        );
        let probe = manager.get::<Probe>(id).unwrap();
        assert_eq!(probe.resets, 1);
        assert_eq!(probe.state(), GestureState::Possible);
        assert_eq!(probe.calls.last(), Some(&("began", 1)));
    }

    #[test]
    fn test_no_callbacks_while_terminal() {
        let mut manager = GestureManager::new();
        let id = manager.add(Probe::new(GestureState::Failed));
        let a = touch(10.0, 10.0);
        let b = touch(20.0, 20.0);

        manager.process(
            &FrameBatch {
                pressed: vec![a.clone()],
                released: vec![released(&a)],
                ..FrameBatch::default()
            },
            &FRAME,
        );
        manager.process(
            &FrameBatch {
                pressed: vec![b.clone()],
                ..FrameBatch::default()
            },
            &FRAME,
        );
        // Reset happened at the start of the second frame, so b is seen.
        assert_eq!(manager.get::<Probe>(id).unwrap().calls.len(), 3);

        let c = touch(30.0, 30.0);
        manager.process(
            &FrameBatch {
                pressed: vec![c.clone()],
                cancelled: vec![b.clone()],
                ..FrameBatch::default()
            },
            &FRAME,
        );
        manager.process(
            &FrameBatch {
                updated: vec![moved(&c, 40.0, 40.0)],
                ..FrameBatch::default()
            },
            &FRAME,
        );
        let probe = manager.get::<Probe>(id).unwrap();
        // c is still active, so the gesture stays cancelled and its move is
        // not reported.
        assert_eq!(probe.state(), GestureState::Cancelled);
        assert!(probe.core.is_tracking(c.id()));
        assert_eq!(probe.calls.last(), Some(&("cancelled", 1)));
    }

    #[test]
    fn test_manager_state_signal() {
        let mut manager = GestureManager::new();
        let id = manager.add(Probe::new(GestureState::Recognized));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        manager.state_changed().connect(move |(gesture, change)| {
            seen_clone.lock().push((*gesture, change.current));
        });

        let a = touch(10.0, 10.0);
        manager.process(
            &FrameBatch {
                pressed: vec![a.clone()],
                released: vec![released(&a)],
                ..FrameBatch::default()
            },
            &FRAME,
        );
        manager.process(&FrameBatch::default(), &FRAME);

        assert_eq!(
            *seen.lock(),
            vec![
                (id, GestureState::Recognized),
                (id, GestureState::Possible)
            ]
        );
        assert!(manager.remove(id).is_some());
        assert!(manager.is_empty());
    }
}
