//! TUIO protocol support.
//!
//! TUIO carries tracked touches and fiducial objects as OSC messages over UDP
//! or WebSocket. This module decodes that traffic into session-level
//! [`TuioEvent`]s:
//!
//! - [`osc`]: OSC 1.0 packet codec
//! - [`Tuio11Processor`]: TUIO 1.1 `/tuio/2Dcur` and `/tuio/2Dobj`
//! - [`Tuio20Processor`]: TUIO 2.0 frames with pointer and token components
//! - [`ProtocolDispatcher`]: the version chosen at construction
//! - [`TuioClient`]: a transport plus a dispatcher, drained once per frame
//!
//! Malformed packets and messages are dropped silently. Unreliable networks
//! corrupt frames routinely, so decoding never fails loudly.

mod client;
mod dispatcher;
pub mod osc;
mod tuio11;
mod tuio20;

pub use client::{DEFAULT_QUEUE_CAPACITY, MessageListeners, TuioClient};
pub use dispatcher::{ProtocolDispatcher, TuioEvent};
pub use osc::{OscBundle, OscError, OscMessage, OscPacket, OscTime, OscType};
pub use tuio11::{Tuio11Cursor, Tuio11Object, Tuio11Processor};
pub use tuio20::{Tuio20Entity, Tuio20Frame, Tuio20Pointer, Tuio20Processor, Tuio20Token};
