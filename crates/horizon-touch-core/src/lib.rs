//! Core systems for Horizon Touch.
//!
//! This crate provides the building blocks shared by the transport and touch
//! processing crates:
//!
//! - [`Signal`]: observer-style event delivery
//! - [`geometry`]: points, sizes and rectangles in screen space
//! - [`clock`]: frame clocks, including a manually driven clock for tests
//! - [`runtime`]: a dedicated Tokio runtime for network I/O
//! - [`logging`]: tracing targets and helpers

pub mod clock;
mod error;
pub mod geometry;
pub mod logging;
pub mod runtime;
pub mod signal;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{CoreError, Result};
pub use geometry::{Point, Rect, Size};
pub use logging::PerfSpan;
pub use runtime::{IoRuntime, IoRuntimeConfig};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
