//! Logging facilities for Horizon Touch.
//!
//! Horizon Touch uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_touch=debug")
//!     .init();
//! ```
//!
//! Protocol noise (malformed packets, duplicate session ids, late frames) is
//! reported at `trace` or `debug` level only.

/// Span names used throughout Horizon Touch for tracing.
pub mod span_names {
    /// One frame of the touch session.
    pub const FRAME: &str = "horizon_touch::frame";
    /// Gesture dispatch within a frame.
    pub const GESTURES: &str = "horizon_touch::gestures";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_touch_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_touch_core::signal";
    /// I/O runtime target.
    pub const RUNTIME: &str = "horizon_touch_core::runtime";
    /// Input sources and session mapping.
    pub const INPUT: &str = "horizon_touch::input";
    /// OSC and TUIO decoding.
    pub const TUIO: &str = "horizon_touch::tuio";
    /// Gesture recognition.
    pub const GESTURE: &str = "horizon_touch::gesture";
    /// Touch session context.
    pub const MANAGER: &str = "horizon_touch::manager";
    /// UDP transport.
    pub const UDP: &str = "horizon_touch_net::udp";
    /// WebSocket transport.
    pub const WEBSOCKET: &str = "horizon_touch_net::websocket";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_touch::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Trace-level event on the core target.
#[macro_export]
macro_rules! touch_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "horizon_touch_core", $($arg)*)
    };
}

/// Debug-level event on the core target.
#[macro_export]
macro_rules! touch_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "horizon_touch_core", $($arg)*)
    };
}

/// Warn-level event on the core target.
#[macro_export]
macro_rules! touch_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "horizon_touch_core", $($arg)*)
    };
}
