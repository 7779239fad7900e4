//! End-to-end tests: OSC packets in, pointer signals and gesture states out.

use std::sync::Arc;

use horizon_touch::tuio::osc::{self, OscBundle, OscMessage, OscPacket, OscTime, OscType};
use horizon_touch::{
    Gesture, GestureState, InputSource, PointerType, RectTarget, TapConfig, TapGesture, TokenTracker,
    TouchManager, TuioConfig, TuioInput, TuioVersion,
};
use horizon_touch_core::{ManualClock, Point, Rect, Size};
use horizon_touch_net::{LoopbackTransport, Transport};
use parking_lot::Mutex;

const SCREEN: Size = Size::new(1000.0, 1000.0);

struct Session {
    manager: TouchManager,
    input: Arc<TuioInput>,
    transport: Arc<LoopbackTransport>,
    clock: ManualClock,
    frame: i32,
}

impl Session {
    fn new(version: TuioVersion) -> Self {
        let clock = ManualClock::new(0.0);
        let mut manager = TouchManager::with_clock(Arc::new(clock.clone()));
        manager.set_dots_per_centimeter(10.0).unwrap();

        let transport = Arc::new(LoopbackTransport::new());
        let config = TuioConfig::default().version(version).pool_capacity(8);
        let input = Arc::new(TuioInput::with_transport(config, transport.clone()).unwrap());
        manager.add_input(input.clone());
        manager.enable(SCREEN);

        Self {
            manager,
            input,
            transport,
            clock,
            frame: 0,
        }
    }

    fn tap_gesture(&mut self, config: TapConfig) -> horizon_touch::GestureId {
        let target = Arc::new(RectTarget(Rect::new(0.0, 0.0, 500.0, 500.0)));
        self.manager
            .add_gesture(TapGesture::from_config(target, &config))
    }

    /// Send one TUIO 1.1 cursor frame at time `at` and run a manager frame.
    fn cursors(&mut self, at: f64, cursors: &[(i32, f32, f32)]) {
        self.frame += 1;
        let addr = "/tuio/2Dcur";
        let mut alive = vec![OscType::String("alive".into())];
        alive.extend(cursors.iter().map(|&(id, _, _)| OscType::Int(id)));
        let mut content = vec![msg(addr, alive)];
        for &(id, x, y) in cursors {
            let mut set = vec![OscType::String("set".into()), OscType::Int(id)];
            set.extend([x, y, 0.0, 0.0, 0.0].map(OscType::Float));
            content.push(msg(addr, set));
        }
        content.push(msg(
            addr,
            vec![OscType::String("fseq".into()), OscType::Int(self.frame)],
        ));
        self.send(at, content);
    }

    fn send(&mut self, at: f64, content: Vec<OscPacket>) {
        self.clock.set(at);
        assert!(self.transport.inject(osc::encode(&OscPacket::Bundle(OscBundle {
            timetag: OscTime::IMMEDIATE,
            content,
        }))));
        self.manager.update();
    }
}

fn msg(addr: &str, args: Vec<OscType>) -> OscPacket {
    OscPacket::Message(OscMessage::new(addr, args))
}

/// Normalized TUIO coordinates for a screen position (Y up).
fn tuio(x: f32, y: f32) -> (f32, f32) {
    (x / SCREEN.width, 1.0 - y / SCREEN.height)
}

fn cursor(id: i32, x: f32, y: f32) -> (i32, f32, f32) {
    let (nx, ny) = tuio(x, y);
    (id, nx, ny)
}

#[test]
fn test_two_finger_tap_recognized_at_centroid() {
    let mut session = Session::new(TuioVersion::Tuio11);
    let tap = session.tap_gesture(TapConfig::default());

    session.cursors(0.0, &[cursor(1, 100.0, 100.0), cursor(2, 200.0, 300.0)]);
    session.cursors(0.05, &[cursor(2, 200.0, 300.0)]);
    assert_eq!(
        session.manager.gesture::<TapGesture>(tap).unwrap().state(),
        GestureState::Possible
    );
    session.cursors(0.08, &[]);

    let gesture = session.manager.gesture::<TapGesture>(tap).unwrap();
    assert_eq!(gesture.state(), GestureState::Recognized);
    let position = gesture.screen_position();
    assert!((position.x - 150.0).abs() < 1e-3, "{position:?}");
    assert!((position.y - 200.0).abs() < 1e-3, "{position:?}");
}

#[test]
fn test_drag_fails_tap() {
    let mut session = Session::new(TuioVersion::Tuio11);
    let tap = session.tap_gesture(TapConfig {
        distance_limit: 1.0,
        ..TapConfig::default()
    });

    session.cursors(0.0, &[cursor(1, 100.0, 100.0)]);
    // 50 pixels at 10 dots per centimeter.
    session.cursors(0.02, &[cursor(1, 150.0, 100.0)]);
    session.cursors(0.04, &[]);

    assert_eq!(
        session.manager.gesture::<TapGesture>(tap).unwrap().state(),
        GestureState::Failed
    );
}

#[test]
fn test_stationary_resends_keep_tap_alive() {
    let mut session = Session::new(TuioVersion::Tuio11);
    let tap = session.tap_gesture(TapConfig {
        distance_limit: 1.0,
        ..TapConfig::default()
    });

    session.cursors(0.0, &[cursor(1, 100.0, 100.0)]);
    // A 2 pixel jitter, then the tracker repeats the same position.
    for step in 1..=11 {
        session.cursors(f64::from(step) * 0.01, &[cursor(1, 102.0, 100.0)]);
    }
    session.cursors(0.15, &[]);

    assert_eq!(
        session.manager.gesture::<TapGesture>(tap).unwrap().state(),
        GestureState::Recognized
    );
}

#[test]
fn test_second_finger_updates_do_not_recount_movement() {
    let mut session = Session::new(TuioVersion::Tuio11);
    let tap = session.tap_gesture(TapConfig {
        distance_limit: 1.0,
        ..TapConfig::default()
    });

    session.cursors(0.0, &[cursor(1, 100.0, 100.0), cursor(2, 200.0, 100.0)]);
    // Finger 1 moves 8 pixels once; the centroid moves 4.
    for step in 1..=6 {
        session.cursors(
            f64::from(step) * 0.01,
            &[cursor(1, 108.0, 100.0), cursor(2, 200.0, 100.0)],
        );
    }
    session.cursors(0.1, &[]);

    assert_eq!(
        session.manager.gesture::<TapGesture>(tap).unwrap().state(),
        GestureState::Recognized
    );
}

#[test]
fn test_press_outside_target_is_ignored() {
    let mut session = Session::new(TuioVersion::Tuio11);
    let tap = session.tap_gesture(TapConfig::default());

    session.cursors(0.0, &[cursor(1, 800.0, 800.0)]);
    session.cursors(0.05, &[]);

    let gesture = session.manager.gesture::<TapGesture>(tap).unwrap();
    assert_eq!(gesture.state(), GestureState::Possible);
    assert_eq!(gesture.core().active_count(), 0);
}

#[test]
fn test_pointer_signals_follow_sessions() {
    let mut session = Session::new(TuioVersion::Tuio11);
    let log = Arc::new(Mutex::new(Vec::new()));
    for (name, signal) in [
        ("added", session.manager.pointers_added()),
        ("pressed", session.manager.pointers_pressed()),
        ("updated", session.manager.pointers_updated()),
        ("released", session.manager.pointers_released()),
        ("removed", session.manager.pointers_removed()),
    ] {
        let log = log.clone();
        signal.connect(move |pointers| log.lock().push((name, pointers.len())));
    }

    session.cursors(0.0, &[cursor(1, 10.0, 10.0)]);
    session.cursors(0.1, &[cursor(1, 20.0, 10.0)]);
    session.cursors(0.2, &[]);

    assert_eq!(
        *log.lock(),
        vec![
            ("added", 1),
            ("pressed", 1),
            ("updated", 1),
            ("released", 1),
            ("removed", 1)
        ]
    );
    assert_eq!(session.manager.pointer_count(), 0);
    assert_eq!(session.input.touch_pool_stats().active, 0);
}

#[test]
fn test_cancel_and_return_preserves_object_state() {
    let mut session = Session::new(TuioVersion::Tuio11);
    let addr = "/tuio/2Dobj";
    let object_frame = |frame: i32, x: f32| {
        let mut set = vec![
            OscType::String("set".into()),
            OscType::Int(4),
            OscType::Int(12),
        ];
        set.extend([x, 0.5, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0].map(OscType::Float));
        vec![
            msg(addr, vec![OscType::String("alive".into()), OscType::Int(4)]),
            msg(addr, set),
            msg(addr, vec![OscType::String("fseq".into()), OscType::Int(frame)]),
        ]
    };

    session.send(0.0, object_frame(1, 0.25));
    let old = session.manager.pointers().pop().unwrap();
    assert_eq!(old.pointer_type(), PointerType::Object);

    assert!(session.manager.cancel_pointer(old.id(), true));
    session.manager.update();

    assert!(session.manager.pointer(old.id()).is_none());
    let returned = session.manager.pointers().pop().unwrap();
    assert_ne!(returned.id(), old.id());
    assert!(returned.is_returned());
    assert_eq!(returned.position(), old.position());
    assert_eq!(returned.object_id(), Some(12));
    assert_eq!(returned.angle(), Some(2.0));

    // The tracker keeps talking about session 4, which now updates the
    // returned pointer.
    session.send(0.1, object_frame(2, 0.5));
    let updated = session.manager.pointer(returned.id()).unwrap();
    assert_eq!(updated.position(), Point::new(500.0, 500.0));
    assert_eq!(session.input.object_count(), 1);
}

#[test]
fn test_protocol_noise_never_leaks_pointers() {
    let mut session = Session::new(TuioVersion::Tuio11);

    session.cursors(0.0, &[cursor(1, 10.0, 10.0)]);
    // Same session again: no second pointer.
    session.cursors(0.1, &[cursor(1, 10.0, 10.0)]);
    assert_eq!(session.manager.pointer_count(), 1);

    // Garbage and truncated packets are dropped.
    assert!(session.transport.inject(b"not osc at all".to_vec()));
    assert!(session.transport.inject(vec![b'#', b'b', b'u']));
    session.manager.update();
    assert_eq!(session.manager.pointer_count(), 1);

    // A late frame is ignored.
    session.frame = 0;
    session.cursors(0.2, &[]);
    assert_eq!(session.manager.pointer_count(), 1);

    let ids: Vec<_> = session.manager.pointers().iter().map(|p| p.id()).collect();
    session.frame = 10;
    session.cursors(0.3, &[]);
    assert_eq!(session.manager.pointer_count(), 0);
    assert!(ids.iter().all(|id| session.manager.pointer(*id).is_none()));
    assert_eq!(session.input.touch_pool_stats().active, 0);
}

#[test]
fn test_pool_reuse_hands_out_fresh_pointers() {
    let mut session = Session::new(TuioVersion::Tuio11);
    let mut seen = Vec::new();

    for round in 0..20 {
        let at = f64::from(round) * 0.1;
        session.cursors(at, &[cursor(round, 10.0, 10.0), cursor(round + 100, 30.0, 30.0)]);
        let pointers = session.manager.pointers();
        assert_eq!(pointers.len(), 2);
        assert_ne!(pointers[0].id(), pointers[1].id());
        for pointer in &pointers {
            assert!(!seen.contains(&pointer.id()), "pointer id reused");
            assert!(!pointer.is_returned());
            seen.push(pointer.id());
        }
        session.cursors(at + 0.05, &[]);
    }

    let stats = session.input.touch_pool_stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.all, 8);
}

#[test]
fn test_tuio20_pointer_and_token_on_one_entity() {
    let mut session = Session::new(TuioVersion::Tuio20);
    let tracker = TokenTracker::attach(&session.manager);
    let frame = |id: i32, ptr: bool, tok: bool, alive: &[i32]| {
        let mut content = vec![msg(
            "/tuio2/frm",
            vec![OscType::Int(id), OscType::Time(OscTime::IMMEDIATE)],
        )];
        if ptr {
            let mut args = vec![OscType::Int(9), OscType::Int(0), OscType::Int(0)];
            args.extend([0.1, 0.1, 0.0, 0.0, 1.0, 1.0].map(OscType::Float));
            content.push(msg("/tuio2/ptr", args));
        }
        if tok {
            let mut args = vec![OscType::Int(9), OscType::Int(0), OscType::Int(33)];
            args.extend([0.1, 0.1, 0.25].map(OscType::Float));
            content.push(msg("/tuio2/tok", args));
        }
        content.push(msg(
            "/tuio2/alv",
            alive.iter().copied().map(OscType::Int).collect(),
        ));
        content
    };

    session.send(0.0, frame(1, true, true, &[9]));
    assert_eq!(session.manager.pointer_count(), 2);
    assert_eq!(tracker.len(), 1);
    assert_eq!(tracker.tokens()[0].object_id, 33);

    // The pointer component stays quiet, the token moves.
    session.send(0.1, frame(2, false, true, &[9]));
    assert_eq!(session.manager.pointer_count(), 2);

    session.send(0.2, frame(3, false, false, &[]));
    assert_eq!(session.manager.pointer_count(), 0);
    assert!(tracker.is_empty());
    assert_eq!(session.input.touch_pool_stats().active, 0);
    assert_eq!(session.input.object_pool_stats().active, 0);
}

#[test]
fn test_disable_cancels_before_returning() {
    let mut session = Session::new(TuioVersion::Tuio11);
    let tap = session.tap_gesture(TapConfig::default());
    let cancelled = Arc::new(Mutex::new(0));
    let cancelled_clone = cancelled.clone();
    session
        .manager
        .pointers_cancelled()
        .connect(move |pointers| *cancelled_clone.lock() += pointers.len());

    session.cursors(0.0, &[cursor(1, 10.0, 10.0), cursor(2, 20.0, 20.0)]);
    session.manager.disable();

    assert_eq!(*cancelled.lock(), 2);
    assert_eq!(session.manager.pointer_count(), 0);
    assert!(!session.transport.is_connected());
    assert_eq!(
        session.manager.gesture::<TapGesture>(tap).unwrap().state(),
        GestureState::Failed
    );
    assert_eq!(session.input.touch_pool_stats().active, 0);
    assert!(!session.input.update_input());
}
