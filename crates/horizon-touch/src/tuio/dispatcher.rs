//! Version-specific TUIO decoding behind one type.
//!
//! The protocol version is chosen once, when the dispatcher is built. Both
//! versions turn OSC messages into the same [`TuioEvent`] stream keyed by
//! session id, so input sources never see which version is on the wire.

use horizon_touch_core::Point;
use horizon_touch_core::logging::targets;

use super::osc::OscMessage;
use super::tuio11::Tuio11Processor;
use super::tuio20::Tuio20Processor;
use crate::config::TuioVersion;

/// A session-level change decoded from a committed TUIO frame.
///
/// Positions are normalized to `0..1` with the TUIO origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TuioEvent {
    /// A cursor (touch) appeared.
    CursorAdded { session_id: u32, position: Point },
    /// A known cursor moved.
    CursorUpdated { session_id: u32, position: Point },
    /// A cursor disappeared.
    CursorRemoved { session_id: u32 },
    /// A tracked object appeared.
    ObjectAdded {
        session_id: u32,
        symbol_id: i32,
        position: Point,
        angle: f32,
    },
    /// A known object moved or rotated.
    ObjectUpdated {
        session_id: u32,
        symbol_id: i32,
        position: Point,
        angle: f32,
    },
    /// A tracked object disappeared.
    ObjectRemoved { session_id: u32 },
}

impl TuioEvent {
    /// The session id the event refers to.
    pub fn session_id(&self) -> u32 {
        match *self {
            Self::CursorAdded { session_id, .. }
            | Self::CursorUpdated { session_id, .. }
            | Self::CursorRemoved { session_id }
            | Self::ObjectAdded { session_id, .. }
            | Self::ObjectUpdated { session_id, .. }
            | Self::ObjectRemoved { session_id } => session_id,
        }
    }
}

/// Drops frames that arrive out of order.
///
/// A frame older than the current one is late, unless it is so much older
/// that the sender has most likely restarted its counter.
#[derive(Debug, Clone)]
pub(crate) struct FrameGate {
    current: i64,
    always_accepted: i64,
}

impl FrameGate {
    const LATE_WINDOW: i64 = 100;

    pub(crate) fn new(always_accepted: i64) -> Self {
        Self {
            current: 0,
            always_accepted,
        }
    }

    /// Whether `frame` should be processed. Accepting a frame makes it current.
    pub(crate) fn accept(&mut self, frame: i64) -> bool {
        if frame == self.always_accepted {
            return true;
        }
        if frame >= self.current || self.current - frame > Self::LATE_WINDOW {
            self.current = frame;
            return true;
        }
        tracing::trace!(target: targets::TUIO, frame, current = self.current, "dropping late frame");
        false
    }

    pub(crate) fn reset(&mut self) {
        self.current = 0;
    }
}

/// Decodes TUIO messages for one protocol version.
#[derive(Debug)]
pub enum ProtocolDispatcher {
    /// TUIO 1.1: `/tuio/2Dcur` and `/tuio/2Dobj`.
    Tuio11(Tuio11Processor),
    /// TUIO 2.0: `/tuio2/frm`, `/tuio2/ptr`, `/tuio2/tok`, `/tuio2/alv`.
    Tuio20(Tuio20Processor),
}

impl ProtocolDispatcher {
    /// Create a dispatcher for `version`.
    pub fn new(version: TuioVersion) -> Self {
        match version {
            TuioVersion::Tuio11 => Self::Tuio11(Tuio11Processor::new()),
            TuioVersion::Tuio20 => Self::Tuio20(Tuio20Processor::new()),
        }
    }

    /// The protocol version this dispatcher decodes.
    pub fn version(&self) -> TuioVersion {
        match self {
            Self::Tuio11(_) => TuioVersion::Tuio11,
            Self::Tuio20(_) => TuioVersion::Tuio20,
        }
    }

    /// OSC address profiles this dispatcher understands.
    pub fn profiles(&self) -> &'static [&'static str] {
        match self {
            Self::Tuio11(_) => Tuio11Processor::PROFILES,
            Self::Tuio20(_) => Tuio20Processor::PROFILES,
        }
    }

    /// Feed one message. Committed changes are appended to `events`.
    ///
    /// Messages for other profiles and malformed messages are ignored.
    pub fn dispatch(&mut self, message: &OscMessage, events: &mut Vec<TuioEvent>) {
        match self {
            Self::Tuio11(processor) => processor.process(message, events),
            Self::Tuio20(processor) => processor.process(message, events),
        }
    }

    /// Forget every known session and the frame counter.
    pub fn reset(&mut self) {
        match self {
            Self::Tuio11(processor) => processor.reset(),
            Self::Tuio20(processor) => processor.reset(),
        }
    }
}
