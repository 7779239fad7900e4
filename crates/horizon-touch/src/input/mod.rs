//! Input sources: where pointers come from.
//!
//! An [`InputSource`] owns the pointers of one device or protocol connection
//! and reports their lifecycle as [`PointerEvent`]s. The touch manager polls
//! every source once per frame, drains the events, dispatches them, and
//! hands removed and cancelled pointers back for recycling.
//!
//! # Ownership
//!
//! A source owns every pointer it currently tracks. `Removed` and `Cancelled`
//! events move the pointer out of the source; the consumer returns it with
//! [`InputSource::discard_pointer`] once every recognizer has seen it. All
//! other events carry snapshots.
//!
//! # Locking
//!
//! Each source guards its state with its own mutex, so protocol callbacks and
//! the frame loop may call into it from different threads and two sources
//! never contend with each other.

mod mouse_input;
mod remap;
mod tuio_input;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use horizon_touch_core::Size;

use crate::pointer::{Pointer, PointerId};

pub use mouse_input::MouseInput;
pub use remap::{CoordinatesRemapper, IdentityRemapper, normalized_to_screen};
pub use tuio_input::TuioInput;

static NEXT_SOURCE_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies one input source instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputSourceId(u32);

impl InputSourceId {
    /// Allocate the next unused id.
    pub fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InputSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A change in one pointer's lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    /// A new pointer appeared.
    Added(Pointer),
    /// A button went down.
    Pressed(Pointer),
    /// The pointer moved or changed.
    Updated(Pointer),
    /// A button went up.
    Released(Pointer),
    /// The pointer is gone. Ownership moves to the consumer.
    Removed(Pointer),
    /// The pointer was cancelled. Ownership moves to the consumer.
    Cancelled(Pointer),
}

impl PointerEvent {
    /// The pointer this event is about.
    pub fn pointer(&self) -> &Pointer {
        match self {
            Self::Added(p)
            | Self::Pressed(p)
            | Self::Updated(p)
            | Self::Released(p)
            | Self::Removed(p)
            | Self::Cancelled(p) => p,
        }
    }

    /// Take the pointer out of the event.
    pub fn into_pointer(self) -> Pointer {
        match self {
            Self::Added(p)
            | Self::Pressed(p)
            | Self::Updated(p)
            | Self::Released(p)
            | Self::Removed(p)
            | Self::Cancelled(p) => p,
        }
    }

    /// Whether this event ends the pointer's life.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Removed(_) | Self::Cancelled(_))
    }
}

/// A producer of pointers.
pub trait InputSource: Send + Sync {
    /// This source's id, stamped on every pointer it creates.
    fn id(&self) -> InputSourceId;

    /// Poll the underlying device or transport. Called once per frame.
    ///
    /// Returns whether the source is able to produce input.
    fn update_input(&self) -> bool;

    /// Move every event produced since the last call into `events`.
    fn drain_events(&self, events: &mut Vec<PointerEvent>);

    /// Cancel a pointer this source owns.
    ///
    /// With `should_return`, a new pointer carrying the old one's state and
    /// the `RETURNED` flag takes its place. Returns `false` when the pointer
    /// is not owned by this source.
    fn cancel_pointer(&self, id: PointerId, should_return: bool) -> bool;

    /// Return a removed or cancelled pointer for reuse.
    fn discard_pointer(&self, pointer: Pointer);

    /// Clear single-frame button transitions after a frame's dispatch.
    fn end_frame(&self);

    /// Start producing input for a screen of `screen` pixels.
    fn enable(&self, screen: Size);

    /// Stop producing input, cancelling every live pointer.
    fn disable(&self);

    /// Install the transform applied to every screen position.
    fn set_remapper(&self, remapper: Arc<dyn CoordinatesRemapper>);
}

/// Event queue shared by the source implementations.
#[derive(Debug, Default)]
pub(crate) struct PointerEvents {
    events: Vec<PointerEvent>,
}

impl PointerEvents {
    pub(crate) fn added(&mut self, pointer: &Pointer) {
        self.events.push(PointerEvent::Added(pointer.clone()));
    }

    pub(crate) fn pressed(&mut self, pointer: &Pointer) {
        self.events.push(PointerEvent::Pressed(pointer.clone()));
    }

    pub(crate) fn updated(&mut self, pointer: &Pointer) {
        self.events.push(PointerEvent::Updated(pointer.clone()));
    }

    pub(crate) fn released(&mut self, pointer: &Pointer) {
        self.events.push(PointerEvent::Released(pointer.clone()));
    }

    pub(crate) fn removed(&mut self, pointer: Pointer) {
        self.events.push(PointerEvent::Removed(pointer));
    }

    pub(crate) fn cancelled(&mut self, pointer: Pointer) {
        self.events.push(PointerEvent::Cancelled(pointer));
    }

    pub(crate) fn drain_into(&mut self, out: &mut Vec<PointerEvent>) {
        out.append(&mut self.events);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}
