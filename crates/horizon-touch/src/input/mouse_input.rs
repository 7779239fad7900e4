//! Mouse and pen input source.
//!
//! The host window forwards its mouse (or stylus) events here. A single
//! pointer represents the device while it is over the window; leaving the
//! window removes it.

use std::sync::Arc;

use horizon_touch_core::logging::targets;
use horizon_touch_core::{Point, Size};
use parking_lot::Mutex;

use super::remap::{CoordinatesRemapper, IdentityRemapper};
use super::{InputSource, InputSourceId, PointerEvent, PointerEvents};
use crate::pointer::{Pointer, PointerButtons, PointerFlags, PointerId, PointerType};
use crate::pool::{ObjectPool, PoolStats};

const POOL_CAPACITY: usize = 2;

struct MouseState {
    pointer: Option<Pointer>,
    pool: ObjectPool<Pointer>,
    enabled: bool,
    screen: Size,
    remapper: Arc<dyn CoordinatesRemapper>,
    events: PointerEvents,
}

impl MouseState {
    fn release_all(pointer: &mut Pointer, events: &mut PointerEvents) {
        let pressed: Vec<usize> = pointer.buttons().pressed_buttons().collect();
        if pressed.is_empty() {
            return;
        }
        for index in pressed {
            pointer.buttons_mut().release(index);
        }
        events.released(pointer);
    }
}

/// Input source for the host's mouse or pen.
pub struct MouseInput {
    id: InputSourceId,
    kind: PointerType,
    state: Mutex<MouseState>,
}

impl MouseInput {
    /// A source producing [`PointerType::Mouse`] pointers.
    pub fn mouse() -> Self {
        Self::new(PointerType::Mouse)
    }

    /// A source producing [`PointerType::Pen`] pointers.
    pub fn pen() -> Self {
        Self::new(PointerType::Pen)
    }

    fn new(kind: PointerType) -> Self {
        let id = InputSourceId::next();
        let pool = ObjectPool::new(POOL_CAPACITY, move || Pointer::idle(kind, id))
            .with_on_get(Pointer::assign_id)
            .with_on_release(Pointer::reset);
        Self {
            id,
            kind,
            state: Mutex::new(MouseState {
                pointer: None,
                pool,
                enabled: false,
                screen: Size::ZERO,
                remapper: Arc::new(IdentityRemapper),
                events: PointerEvents::default(),
            }),
        }
    }

    /// The pointer type this source produces.
    pub fn pointer_type(&self) -> PointerType {
        self.kind
    }

    /// Snapshot of the device pointer, if it is over the window.
    pub fn pointer(&self) -> Option<Pointer> {
        self.state.lock().pointer.clone()
    }

    /// Statistics of the pointer pool.
    pub fn pool_stats(&self) -> PoolStats {
        self.state.lock().pool.stats()
    }

    /// The device moved to `position`, in screen pixels.
    ///
    /// The first move after enabling or leaving creates the pointer.
    pub fn move_to(&self, position: Point) {
        let mut state = self.state.lock();
        if !state.enabled {
            return;
        }
        let position = state.remapper.remap(position);
        let MouseState {
            pointer,
            pool,
            events,
            ..
        } = &mut *state;

        match pointer {
            Some(pointer) => {
                if pointer.position() != position {
                    pointer.set_position(position);
                    events.updated(pointer);
                }
            }
            None => {
                let mut created = pool.get();
                created.set_position(position);
                events.added(&created);
                *pointer = Some(created);
            }
        }
    }

    /// Button `index` went down.
    ///
    /// Ignored while the device is outside the window, when `index` is out
    /// of range, or when the button is already held.
    pub fn press(&self, index: usize) {
        if index >= PointerButtons::MAX_BUTTONS {
            return;
        }
        let mut state = self.state.lock();
        let MouseState {
            pointer, events, ..
        } = &mut *state;
        let Some(pointer) = pointer else {
            return;
        };
        if pointer.buttons().is_pressed(index) {
            return;
        }
        pointer.buttons_mut().press(index);
        events.pressed(pointer);
    }

    /// Button `index` went up.
    pub fn release(&self, index: usize) {
        if index >= PointerButtons::MAX_BUTTONS {
            return;
        }
        let mut state = self.state.lock();
        let MouseState {
            pointer, events, ..
        } = &mut *state;
        let Some(pointer) = pointer else {
            return;
        };
        if !pointer.buttons().is_pressed(index) {
            return;
        }
        pointer.buttons_mut().release(index);
        events.released(pointer);
    }

    /// The device left the window. Held buttons are released first.
    pub fn leave(&self) {
        let mut state = self.state.lock();
        let MouseState {
            pointer, events, ..
        } = &mut *state;
        let Some(mut pointer) = pointer.take() else {
            return;
        };
        MouseState::release_all(&mut pointer, events);
        events.removed(pointer);
    }
}

impl InputSource for MouseInput {
    fn id(&self) -> InputSourceId {
        self.id
    }

    fn update_input(&self) -> bool {
        self.state.lock().enabled
    }

    fn drain_events(&self, events: &mut Vec<PointerEvent>) {
        self.state.lock().events.drain_into(events);
    }

    fn cancel_pointer(&self, id: PointerId, should_return: bool) -> bool {
        let mut state = self.state.lock();
        let MouseState {
            pointer,
            pool,
            events,
            ..
        } = &mut *state;
        if pointer.as_ref().map(Pointer::id) != Some(id) {
            return false;
        }
        let Some(old) = pointer.take() else {
            return false;
        };

        if should_return {
            let mut returned = pool.get();
            returned.copy_from(&old);
            returned.insert_flags(PointerFlags::RETURNED);
            let held: Vec<usize> = returned.buttons().pressed_buttons().collect();
            tracing::debug!(target: targets::INPUT, old = %old.id(), new = %returned.id(), "returning cancelled pointer");
            events.cancelled(old);
            events.added(&returned);
            for index in held {
                returned.buttons_mut().press(index);
            }
            if returned.buttons().any_pressed() {
                events.pressed(&returned);
            }
            *pointer = Some(returned);
        } else {
            tracing::debug!(target: targets::INPUT, pointer = %old.id(), "cancelling pointer");
            events.cancelled(old);
        }
        true
    }

    fn discard_pointer(&self, pointer: Pointer) {
        if pointer.pointer_type() == self.kind {
            self.state.lock().pool.release(pointer);
        }
    }

    fn end_frame(&self) {
        if let Some(pointer) = self.state.lock().pointer.as_mut() {
            pointer.buttons_mut().clear_transitions();
        }
    }

    fn enable(&self, screen: Size) {
        let mut state = self.state.lock();
        state.screen = screen;
        state.enabled = true;
        tracing::debug!(target: targets::INPUT, source = %self.id, kind = %self.kind, "pointer device enabled");
    }

    fn disable(&self) {
        let mut state = self.state.lock();
        if !state.enabled {
            return;
        }
        state.enabled = false;
        if let Some(pointer) = state.pointer.take() {
            state.events.cancelled(pointer);
        }
        tracing::debug!(target: targets::INPUT, source = %self.id, kind = %self.kind, "pointer device disabled");
    }

    fn set_remapper(&self, remapper: Arc<dyn CoordinatesRemapper>) {
        self.state.lock().remapper = remapper;
    }
}

impl std::fmt::Debug for MouseInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MouseInput")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("pointer", &state.pointer.as_ref().map(Pointer::id))
            .field("enabled", &state.enabled)
            .field("screen", &state.screen)
            .finish()
    }
}

static_assertions::assert_impl_all!(MouseInput: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_mouse() -> MouseInput {
        let mouse = MouseInput::mouse();
        mouse.enable(Size::new(800.0, 600.0));
        mouse
    }

    fn drain(mouse: &MouseInput) -> Vec<PointerEvent> {
        let mut events = Vec::new();
        mouse.drain_events(&mut events);
        events
    }

    #[test]
    fn test_ignored_while_disabled() {
        let mouse = MouseInput::mouse();
        mouse.move_to(Point::new(1.0, 1.0));
        assert!(mouse.pointer().is_none());
        assert!(!mouse.update_input());
    }

    #[test]
    fn test_move_press_release_leave() {
        let mouse = enabled_mouse();
        mouse.move_to(Point::new(10.0, 20.0));
        mouse.move_to(Point::new(15.0, 20.0));
        mouse.press(0);
        mouse.release(0);
        mouse.leave();

        let events = drain(&mouse);
        assert!(matches!(
            events.as_slice(),
            [
                PointerEvent::Added(_),
                PointerEvent::Updated(_),
                PointerEvent::Pressed(_),
                PointerEvent::Released(_),
                PointerEvent::Removed(_),
            ]
        ));
        let id = events[0].pointer().id();
        assert!(events.iter().all(|e| e.pointer().id() == id));
        assert_eq!(events[0].pointer().pointer_type(), PointerType::Mouse);
        assert_eq!(events[1].pointer().previous_position(), Point::new(10.0, 20.0));
    }

    #[test]
    fn test_leave_releases_held_buttons() {
        let mouse = enabled_mouse();
        mouse.move_to(Point::new(1.0, 1.0));
        mouse.press(0);
        mouse.press(2);
        drain(&mouse);

        mouse.leave();
        let events = drain(&mouse);
        assert!(matches!(
            events.as_slice(),
            [PointerEvent::Released(p), PointerEvent::Removed(_)]
                if p.buttons().is_up(0) && p.buttons().is_up(2) && !p.buttons().any_pressed()
        ));
    }

    #[test]
    fn test_repeated_press_is_ignored() {
        let mouse = enabled_mouse();
        mouse.move_to(Point::new(1.0, 1.0));
        mouse.press(1);
        mouse.press(1);
        mouse.press(PointerButtons::MAX_BUTTONS);
        let pressed = drain(&mouse)
            .iter()
            .filter(|e| matches!(e, PointerEvent::Pressed(_)))
            .count();
        assert_eq!(pressed, 1);
    }

    #[test]
    fn test_pen_and_returned_pointer_keeps_buttons() {
        let pen = MouseInput::pen();
        pen.enable(Size::new(800.0, 600.0));
        pen.move_to(Point::new(5.0, 5.0));
        pen.press(0);
        let old = pen.pointer().unwrap();
        assert_eq!(old.pointer_type(), PointerType::Pen);
        drain(&pen);

        assert!(pen.cancel_pointer(old.id(), true));
        let events = drain(&pen);
        assert!(matches!(
            events.as_slice(),
            [PointerEvent::Cancelled(_), PointerEvent::Added(_), PointerEvent::Pressed(p)]
                if p.is_returned() && p.buttons().is_down(0)
        ));
        let returned = pen.pointer().unwrap();
        assert_ne!(returned.id(), old.id());
        assert_eq!(returned.position(), old.position());
    }

    #[test]
    fn test_disable_cancels_pointer() {
        let mouse = enabled_mouse();
        mouse.move_to(Point::new(1.0, 1.0));
        drain(&mouse);

        mouse.disable();
        let events = drain(&mouse);
        assert!(matches!(events.as_slice(), [PointerEvent::Cancelled(_)]));
        assert!(mouse.pointer().is_none());

        mouse.discard_pointer(events.into_iter().next().unwrap().into_pointer());
        assert_eq!(mouse.pool_stats().active, 0);
    }
}
