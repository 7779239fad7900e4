//! Prelude module for Horizon Touch.
//!
//! ```ignore
//! use horizon_touch::prelude::*;
//! ```
//!
//! This provides access to:
//! - The session context (`TouchManager`) and its configuration
//! - Input sources (`TuioInput`, `MouseInput`)
//! - Pointers and their events
//! - Gestures (`TapGesture`, `RectTarget`, `GestureState`)
//! - Geometry, clocks and signals from the core crate

// ============================================================================
// Session
// ============================================================================

pub use crate::{TouchConfig, TouchError, TouchManager, TuioConfig, TuioVersion};

// ============================================================================
// Input
// ============================================================================

pub use crate::input::{InputSource, MouseInput, PointerEvent, TuioInput};
pub use crate::{Pointer, PointerButtons, PointerFlags, PointerId, PointerType};

// ============================================================================
// Gestures
// ============================================================================

pub use crate::gesture::{Gesture, GestureId, GestureState, HitTarget, RectTarget, TapGesture};
pub use crate::{Token, TokenTracker};

// ============================================================================
// Core
// ============================================================================

pub use horizon_touch_core::{
    Clock, ConnectionId, ManualClock, MonotonicClock, Point, Rect, Signal, Size,
};
