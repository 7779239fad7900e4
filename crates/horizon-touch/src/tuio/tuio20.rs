//! TUIO 2.0 entity-component frames.
//!
//! A TUIO 2.0 frame opens with `/tuio2/frm`, carries component messages such
//! as `/tuio2/ptr` (pointer) and `/tuio2/tok` (token), and is committed by
//! `/tuio2/alv` listing every live session id.
//!
//! One session id names an entity that may carry a pointer and a token at the
//! same time. Pointer components surface as cursor events and token
//! components as object events, each tracked independently: when an entity
//! disappears, every component it carried is removed exactly once.

use std::collections::{HashMap, HashSet};

use horizon_touch_core::Point;
use horizon_touch_core::logging::targets;

use super::dispatcher::{FrameGate, TuioEvent};
use super::osc::{OscMessage, OscTime, OscType};

/// A `/tuio2/ptr` component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuio20Pointer {
    pub session_id: u32,
    pub type_user_id: u32,
    pub component_id: u32,
    pub position: Point,
    pub angle: f32,
    pub shear: f32,
    pub radius: f32,
    pub pressure: f32,
}

/// A `/tuio2/tok` component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuio20Token {
    pub session_id: u32,
    pub type_user_id: u32,
    pub component_id: u32,
    pub position: Point,
    pub angle: f32,
}

impl Tuio20Token {
    fn event(&self, added: bool) -> TuioEvent {
        let (session_id, symbol_id) = (self.session_id, self.component_id as i32);
        if added {
            TuioEvent::ObjectAdded {
                session_id,
                symbol_id,
                position: self.position,
                angle: self.angle,
            }
        } else {
            TuioEvent::ObjectUpdated {
                session_id,
                symbol_id,
                position: self.position,
                angle: self.angle,
            }
        }
    }
}

/// The components currently attached to one session id.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tuio20Entity {
    pub pointer: Option<Tuio20Pointer>,
    pub token: Option<Tuio20Token>,
}

/// Metadata from the most recent accepted `/tuio2/frm`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuio20Frame {
    pub frame_id: u32,
    pub time: OscTime,
    /// Sensor width and height in pixels.
    pub dimension: (u16, u16),
    pub source: String,
}

#[derive(Debug, Clone)]
struct PendingFrame {
    accepted: bool,
    pointers: HashMap<u32, Tuio20Pointer>,
    tokens: HashMap<u32, Tuio20Token>,
}

impl Default for PendingFrame {
    fn default() -> Self {
        Self {
            accepted: true,
            pointers: HashMap::new(),
            tokens: HashMap::new(),
        }
    }
}

fn f32_at(args: &[OscType], index: usize) -> Option<f32> {
    args.get(index).and_then(OscType::as_f32)
}

fn u32_at(args: &[OscType], index: usize) -> Option<u32> {
    args.get(index).and_then(OscType::as_i32).map(|v| v as u32)
}

// s_id tu_id c_id x_pos y_pos angle shear radius press [...]
fn parse_pointer(args: &[OscType]) -> Option<Tuio20Pointer> {
    Some(Tuio20Pointer {
        session_id: u32_at(args, 0)?,
        type_user_id: u32_at(args, 1)?,
        component_id: u32_at(args, 2)?,
        position: Point::new(f32_at(args, 3)?, f32_at(args, 4)?),
        angle: f32_at(args, 5)?,
        shear: f32_at(args, 6)?,
        radius: f32_at(args, 7)?,
        pressure: f32_at(args, 8)?,
    })
}

// s_id tu_id c_id x_pos y_pos angle [...]
fn parse_token(args: &[OscType]) -> Option<Tuio20Token> {
    Some(Tuio20Token {
        session_id: u32_at(args, 0)?,
        type_user_id: u32_at(args, 1)?,
        component_id: u32_at(args, 2)?,
        position: Point::new(f32_at(args, 3)?, f32_at(args, 4)?),
        angle: f32_at(args, 5)?,
    })
}

/// Decoder for TUIO 2.0 frames.
#[derive(Debug, Clone)]
pub struct Tuio20Processor {
    entities: HashMap<u32, Tuio20Entity>,
    pending: PendingFrame,
    frame: Tuio20Frame,
    gate: FrameGate,
}

impl Default for Tuio20Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Tuio20Processor {
    /// Frame header address.
    pub const FRAME_PROFILE: &'static str = "/tuio2/frm";
    /// Pointer component address.
    pub const POINTER_PROFILE: &'static str = "/tuio2/ptr";
    /// Token component address.
    pub const TOKEN_PROFILE: &'static str = "/tuio2/tok";
    /// Alive list address, which commits the frame.
    pub const ALIVE_PROFILE: &'static str = "/tuio2/alv";
    /// Every profile this processor handles.
    pub const PROFILES: &'static [&'static str] = &[
        Self::FRAME_PROFILE,
        Self::POINTER_PROFILE,
        Self::TOKEN_PROFILE,
        Self::ALIVE_PROFILE,
    ];

    /// Create a processor with no known entities.
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            pending: PendingFrame::default(),
            frame: Tuio20Frame::default(),
            gate: FrameGate::new(0),
        }
    }

    /// Feed one message.
    pub fn process(&mut self, message: &OscMessage, events: &mut Vec<TuioEvent>) {
        let args = message.args.as_slice();
        match message.addr.as_str() {
            Self::FRAME_PROFILE => self.begin_frame(args),
            Self::POINTER_PROFILE if self.pending.accepted => match parse_pointer(args) {
                Some(pointer) => {
                    self.pending.pointers.insert(pointer.session_id, pointer);
                }
                None => tracing::trace!(target: targets::TUIO, "malformed /tuio2/ptr message"),
            },
            Self::TOKEN_PROFILE if self.pending.accepted => match parse_token(args) {
                Some(token) => {
                    self.pending.tokens.insert(token.session_id, token);
                }
                None => tracing::trace!(target: targets::TUIO, "malformed /tuio2/tok message"),
            },
            Self::ALIVE_PROFILE => {
                let alive: Vec<u32> = args
                    .iter()
                    .filter_map(OscType::as_i32)
                    .map(|v| v as u32)
                    .collect();
                self.commit(alive, events);
            }
            _ => {}
        }
    }

    fn begin_frame(&mut self, args: &[OscType]) {
        let Some(frame_id) = u32_at(args, 0) else {
            tracing::trace!(target: targets::TUIO, "malformed /tuio2/frm message");
            self.pending = PendingFrame {
                accepted: false,
                ..PendingFrame::default()
            };
            return;
        };

        let accepted = self.gate.accept(i64::from(frame_id));
        self.pending = PendingFrame {
            accepted,
            ..PendingFrame::default()
        };
        if accepted {
            let dim = u32_at(args, 2).unwrap_or(0);
            self.frame = Tuio20Frame {
                frame_id,
                time: args.get(1).and_then(OscType::as_time).unwrap_or_default(),
                dimension: ((dim >> 16) as u16, (dim & 0xffff) as u16),
                source: args
                    .get(3)
                    .and_then(OscType::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            };
        }
    }

    fn commit(&mut self, alive: Vec<u32>, events: &mut Vec<TuioEvent>) {
        let mut pending = std::mem::take(&mut self.pending);
        if !pending.accepted {
            return;
        }

        let alive_ids: HashSet<u32> = alive.iter().copied().collect();
        let mut vanished: Vec<u32> = self
            .entities
            .keys()
            .filter(|id| !alive_ids.contains(id))
            .copied()
            .collect();
        vanished.sort_unstable();
        for session_id in vanished {
            let Some(entity) = self.entities.remove(&session_id) else {
                continue;
            };
            if entity.pointer.is_some() {
                events.push(TuioEvent::CursorRemoved { session_id });
            }
            if entity.token.is_some() {
                events.push(TuioEvent::ObjectRemoved { session_id });
            }
        }

        let mut seen = HashSet::with_capacity(alive.len());
        for session_id in alive {
            if !seen.insert(session_id) {
                continue;
            }
            let entity = self.entities.entry(session_id).or_default();

            if let Some(pointer) = pending.pointers.remove(&session_id) {
                let event = if entity.pointer.is_some() {
                    TuioEvent::CursorUpdated {
                        session_id,
                        position: pointer.position,
                    }
                } else {
                    TuioEvent::CursorAdded {
                        session_id,
                        position: pointer.position,
                    }
                };
                entity.pointer = Some(pointer);
                events.push(event);
            }

            if let Some(token) = pending.tokens.remove(&session_id) {
                events.push(token.event(entity.token.is_none()));
                entity.token = Some(token);
            }
        }
    }

    /// Forget all entities and the frame counter.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Entities alive as of the last committed frame.
    pub fn entities(&self) -> impl Iterator<Item = (u32, &Tuio20Entity)> {
        self.entities.iter().map(|(&id, entity)| (id, entity))
    }

    /// Header of the most recent accepted frame.
    pub fn frame(&self) -> &Tuio20Frame {
        &self.frame
    }
}
