//! TUIO 1.1 cursor and object profiles.
//!
//! A TUIO 1.1 frame on one profile is a `source` (optional), an `alive` list
//! of session ids, any number of `set` messages and a closing `fseq`. Changes
//! only take effect when `fseq` arrives:
//!
//! - ids in `alive` that were unknown and have a `set` are added
//! - known ids with a `set` are updated
//! - known ids missing from `alive` are removed
//!
//! Profiles other than `/tuio/2Dcur` and `/tuio/2Dobj` are ignored.

use std::collections::{HashMap, HashSet};

use horizon_touch_core::Point;
use horizon_touch_core::logging::targets;

use super::dispatcher::{FrameGate, TuioEvent};
use super::osc::{OscMessage, OscType};

/// A `/tuio/2Dcur` cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuio11Cursor {
    pub session_id: u32,
    pub position: Point,
    pub velocity: Point,
    pub acceleration: f32,
}

/// A `/tuio/2Dobj` object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuio11Object {
    pub session_id: u32,
    pub symbol_id: i32,
    pub position: Point,
    pub angle: f32,
    pub velocity: Point,
    pub rotation_speed: f32,
    pub acceleration: f32,
    pub rotation_acceleration: f32,
}

trait Entity: Copy {
    fn parse_set(args: &[OscType]) -> Option<Self>;
    fn session_id(&self) -> u32;
    fn added(&self) -> TuioEvent;
    fn updated(&self) -> TuioEvent;
    fn removed(session_id: u32) -> TuioEvent;
}

fn f32_at(args: &[OscType], index: usize) -> Option<f32> {
    args.get(index).and_then(OscType::as_f32)
}

fn u32_at(args: &[OscType], index: usize) -> Option<u32> {
    args.get(index).and_then(OscType::as_i32).map(|v| v as u32)
}

impl Entity for Tuio11Cursor {
    // set s x y X Y m
    fn parse_set(args: &[OscType]) -> Option<Self> {
        Some(Self {
            session_id: u32_at(args, 1)?,
            position: Point::new(f32_at(args, 2)?, f32_at(args, 3)?),
            velocity: Point::new(f32_at(args, 4)?, f32_at(args, 5)?),
            acceleration: f32_at(args, 6)?,
        })
    }

    fn session_id(&self) -> u32 {
        self.session_id
    }

    fn added(&self) -> TuioEvent {
        TuioEvent::CursorAdded {
            session_id: self.session_id,
            position: self.position,
        }
    }

    fn updated(&self) -> TuioEvent {
        TuioEvent::CursorUpdated {
            session_id: self.session_id,
            position: self.position,
        }
    }

    fn removed(session_id: u32) -> TuioEvent {
        TuioEvent::CursorRemoved { session_id }
    }
}

impl Entity for Tuio11Object {
    // set s i x y a X Y A m r
    fn parse_set(args: &[OscType]) -> Option<Self> {
        Some(Self {
            session_id: u32_at(args, 1)?,
            symbol_id: args.get(2).and_then(OscType::as_i32)?,
            position: Point::new(f32_at(args, 3)?, f32_at(args, 4)?),
            angle: f32_at(args, 5)?,
            velocity: Point::new(f32_at(args, 6)?, f32_at(args, 7)?),
            rotation_speed: f32_at(args, 8)?,
            acceleration: f32_at(args, 9)?,
            rotation_acceleration: f32_at(args, 10)?,
        })
    }

    fn session_id(&self) -> u32 {
        self.session_id
    }

    fn added(&self) -> TuioEvent {
        TuioEvent::ObjectAdded {
            session_id: self.session_id,
            symbol_id: self.symbol_id,
            position: self.position,
            angle: self.angle,
        }
    }

    fn updated(&self) -> TuioEvent {
        TuioEvent::ObjectUpdated {
            session_id: self.session_id,
            symbol_id: self.symbol_id,
            position: self.position,
            angle: self.angle,
        }
    }

    fn removed(session_id: u32) -> TuioEvent {
        TuioEvent::ObjectRemoved { session_id }
    }
}

/// Frame assembly for one profile.
#[derive(Debug, Clone)]
struct Profile<T> {
    committed: HashMap<u32, T>,
    frame_alive: Option<Vec<u32>>,
    frame_set: HashMap<u32, T>,
    source: Option<String>,
    gate: FrameGate,
}

impl<T: Entity> Profile<T> {
    fn new() -> Self {
        Self {
            committed: HashMap::new(),
            frame_alive: None,
            frame_set: HashMap::new(),
            source: None,
            gate: FrameGate::new(-1),
        }
    }

    fn process(&mut self, message: &OscMessage, events: &mut Vec<TuioEvent>) {
        let args = message.args.as_slice();
        match message.command() {
            Some("source") => {
                self.source = args.get(1).and_then(OscType::as_str).map(str::to_owned);
            }
            Some("alive") => {
                self.frame_alive = Some(
                    args[1..]
                        .iter()
                        .filter_map(OscType::as_i32)
                        .map(|v| v as u32)
                        .collect(),
                );
            }
            Some("set") => match T::parse_set(args) {
                Some(entity) => {
                    self.frame_set.insert(entity.session_id(), entity);
                }
                None => {
                    tracing::trace!(target: targets::TUIO, addr = %message.addr, "malformed set message");
                }
            },
            Some("fseq") => match args.get(1).and_then(OscType::as_i32) {
                Some(frame) => self.end_frame(i64::from(frame), events),
                None => {
                    tracing::trace!(target: targets::TUIO, addr = %message.addr, "malformed fseq message");
                }
            },
            _ => {
                tracing::trace!(target: targets::TUIO, addr = %message.addr, "ignoring unknown command");
            }
        }
    }

    fn end_frame(&mut self, frame: i64, events: &mut Vec<TuioEvent>) {
        let alive = self.frame_alive.take();
        let mut set = std::mem::take(&mut self.frame_set);
        if !self.gate.accept(frame) {
            return;
        }

        let alive = alive.unwrap_or_else(|| self.committed.keys().copied().collect());
        let alive_ids: HashSet<u32> = alive.iter().copied().collect();

        let mut removed: Vec<u32> = self
            .committed
            .keys()
            .filter(|id| !alive_ids.contains(id))
            .copied()
            .collect();
        removed.sort_unstable();
        for id in removed {
            self.committed.remove(&id);
            events.push(T::removed(id));
        }

        let mut seen = HashSet::with_capacity(alive.len());
        for id in alive {
            if !seen.insert(id) {
                continue;
            }
            // Alive ids without data yet stay pending until a set arrives.
            let Some(entity) = set.remove(&id) else {
                continue;
            };
            if self.committed.insert(id, entity).is_some() {
                events.push(entity.updated());
            } else {
                events.push(entity.added());
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Decoder for the TUIO 1.1 cursor and object profiles.
#[derive(Debug, Clone)]
pub struct Tuio11Processor {
    cursors: Profile<Tuio11Cursor>,
    objects: Profile<Tuio11Object>,
}

impl Default for Tuio11Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Tuio11Processor {
    /// The cursor profile address.
    pub const CURSOR_PROFILE: &'static str = "/tuio/2Dcur";
    /// The object profile address.
    pub const OBJECT_PROFILE: &'static str = "/tuio/2Dobj";
    /// Every profile this processor handles.
    pub const PROFILES: &'static [&'static str] = &[Self::CURSOR_PROFILE, Self::OBJECT_PROFILE];

    /// Create a processor with no known sessions.
    pub fn new() -> Self {
        Self {
            cursors: Profile::new(),
            objects: Profile::new(),
        }
    }

    /// Feed one message.
    pub fn process(&mut self, message: &OscMessage, events: &mut Vec<TuioEvent>) {
        match message.addr.as_str() {
            Self::CURSOR_PROFILE => self.cursors.process(message, events),
            Self::OBJECT_PROFILE => self.objects.process(message, events),
            _ => {}
        }
    }

    /// Forget all sessions and frame counters.
    pub fn reset(&mut self) {
        self.cursors.reset();
        self.objects.reset();
    }

    /// Cursors alive as of the last committed frame.
    pub fn cursors(&self) -> impl Iterator<Item = &Tuio11Cursor> {
        self.cursors.committed.values()
    }

    /// Objects alive as of the last committed frame.
    pub fn objects(&self) -> impl Iterator<Item = &Tuio11Object> {
        self.objects.committed.values()
    }

    /// The `source` announced on the cursor profile, if any.
    pub fn cursor_source(&self) -> Option<&str> {
        self.cursors.source.as_deref()
    }

    /// The `source` announced on the object profile, if any.
    pub fn object_source(&self) -> Option<&str> {
        self.objects.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(addr: &str, name: &str, rest: Vec<OscType>) -> OscMessage {
        let mut args = vec![OscType::String(name.into())];
        args.extend(rest);
        OscMessage::new(addr, args)
    }

    fn alive(ids: &[i32]) -> OscMessage {
        cmd(
            Tuio11Processor::CURSOR_PROFILE,
            "alive",
            ids.iter().map(|&id| OscType::Int(id)).collect(),
        )
    }

    fn set_cursor(id: i32, x: f32, y: f32) -> OscMessage {
        cmd(
            Tuio11Processor::CURSOR_PROFILE,
            "set",
            vec![
                OscType::Int(id),
                OscType::Float(x),
                OscType::Float(y),
                OscType::Float(0.0),
                OscType::Float(0.0),
                OscType::Float(0.0),
            ],
        )
    }

    fn fseq(addr: &str, frame: i32) -> OscMessage {
        cmd(addr, "fseq", vec![OscType::Int(frame)])
    }

    fn run(processor: &mut Tuio11Processor, messages: &[OscMessage]) -> Vec<TuioEvent> {
        let mut events = Vec::new();
        for message in messages {
            processor.process(message, &mut events);
        }
        events
    }

    #[test]
    fn test_cursor_lifecycle() {
        let mut processor = Tuio11Processor::new();
        let cur = Tuio11Processor::CURSOR_PROFILE;

        let events = run(
            &mut processor,
            &[alive(&[1]), set_cursor(1, 0.5, 0.25), fseq(cur, 1)],
        );
        assert_eq!(
            events,
            vec![TuioEvent::CursorAdded {
                session_id: 1,
                position: Point::new(0.5, 0.25)
            }]
        );

        let events = run(
            &mut processor,
            &[alive(&[1]), set_cursor(1, 0.6, 0.25), fseq(cur, 2)],
        );
        assert_eq!(
            events,
            vec![TuioEvent::CursorUpdated {
                session_id: 1,
                position: Point::new(0.6, 0.25)
            }]
        );

        let events = run(&mut processor, &[alive(&[]), fseq(cur, 3)]);
        assert_eq!(events, vec![TuioEvent::CursorRemoved { session_id: 1 }]);
        assert_eq!(processor.cursors().count(), 0);
    }

    #[test]
    fn test_nothing_happens_before_fseq() {
        let mut processor = Tuio11Processor::new();
        let events = run(&mut processor, &[alive(&[1]), set_cursor(1, 0.5, 0.5)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_late_frame_is_dropped() {
        let mut processor = Tuio11Processor::new();
        let cur = Tuio11Processor::CURSOR_PROFILE;
        run(&mut processor, &[alive(&[1]), set_cursor(1, 0.5, 0.5), fseq(cur, 10)]);

        let events = run(&mut processor, &[alive(&[]), fseq(cur, 9)]);
        assert!(events.is_empty());
        assert_eq!(processor.cursors().count(), 1);

        // fseq -1 is always processed.
        let events = run(&mut processor, &[alive(&[]), fseq(cur, -1)]);
        assert_eq!(events, vec![TuioEvent::CursorRemoved { session_id: 1 }]);
    }

    #[test]
    fn test_object_set() {
        let mut processor = Tuio11Processor::new();
        let obj = Tuio11Processor::OBJECT_PROFILE;
        let mut set_args = vec![OscType::Int(7), OscType::Int(42)];
        set_args.extend([0.1, 0.2, 1.5, 0.0, 0.0, 0.0, 0.0, 0.0].map(OscType::Float));

        let events = run(
            &mut processor,
            &[
                cmd(obj, "source", vec![OscType::String("table@10.0.0.2".into())]),
                cmd(obj, "alive", vec![OscType::Int(7)]),
                cmd(obj, "set", set_args),
                fseq(obj, 1),
            ],
        );
        assert_eq!(
            events,
            vec![TuioEvent::ObjectAdded {
                session_id: 7,
                symbol_id: 42,
                position: Point::new(0.1, 0.2),
                angle: 1.5
            }]
        );
        assert_eq!(processor.object_source(), Some("table@10.0.0.2"));
    }

    #[test]
    fn test_malformed_set_is_ignored() {
        let mut processor = Tuio11Processor::new();
        let cur = Tuio11Processor::CURSOR_PROFILE;
        let short = cmd(cur, "set", vec![OscType::Int(1), OscType::Float(0.5)]);
        let events = run(&mut processor, &[alive(&[1]), short, fseq(cur, 1)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_other_profiles_ignored() {
        let mut processor = Tuio11Processor::new();
        let blob = OscMessage::new("/tuio/2Dblb", vec![OscType::String("alive".into())]);
        let events = run(&mut processor, &[blob, fseq("/tuio/2Dblb", 1)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_alive_without_set_waits_for_data() {
        let mut processor = Tuio11Processor::new();
        let cur = Tuio11Processor::CURSOR_PROFILE;
        assert!(run(&mut processor, &[alive(&[4]), fseq(cur, 1)]).is_empty());

        let events = run(&mut processor, &[alive(&[4]), set_cursor(4, 0.1, 0.1), fseq(cur, 2)]);
        assert!(matches!(
            events.as_slice(),
            [TuioEvent::CursorAdded { session_id: 4, .. }]
        ));
    }
}
