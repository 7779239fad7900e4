//! Tap recognition from clusters of releases.
//!
//! A tap is not tied to one pointer. Every release is remembered with its
//! timestamp; when the last active pointer is released, the releases that
//! happened within `cluster_existence_time` of now and landed on the target
//! form the cluster whose centroid is the tap position. Multi-finger taps
//! and slightly staggered hardware reports are therefore one tap.

use std::any::Any;
use std::sync::Arc;

use horizon_touch_core::logging::targets;
use horizon_touch_core::{Point, Signal};

use super::{FrameContext, Gesture, GestureCore, GestureState, HitResult, HitTarget};
use crate::config::TapConfig;
use crate::pointer::Pointer;

/// Recognizes taps on a target.
pub struct TapGesture {
    core: GestureCore,
    time_limit: f64,
    distance_limit: f32,
    cluster_existence_time: f64,
    total_movement: Point,
    last_centroid: Point,
    start_time: f64,
    removed: Vec<(Pointer, f64)>,
    cached_position: Point,
    cached_previous_position: Point,
    cached_hit: Option<HitResult>,
    tapped: Signal<Point>,
}

impl TapGesture {
    /// Create a tap gesture with default limits.
    pub fn new(target: Arc<dyn HitTarget>) -> Self {
        Self::from_config(target, &TapConfig::default())
    }

    /// Create a tap gesture with the given limits.
    pub fn from_config(target: Arc<dyn HitTarget>, config: &TapConfig) -> Self {
        Self {
            core: GestureCore::new("tap", target),
            time_limit: config.time_limit,
            distance_limit: config.distance_limit,
            cluster_existence_time: config.cluster_existence_time,
            total_movement: Point::ZERO,
            last_centroid: Point::INVALID,
            start_time: 0.0,
            removed: Vec::new(),
            cached_position: Point::INVALID,
            cached_previous_position: Point::INVALID,
            cached_hit: None,
            tapped: Signal::new(),
        }
    }

    /// Longest time in seconds the pointers may stay down.
    pub fn time_limit(&self) -> f64 {
        self.time_limit
    }

    pub fn set_time_limit(&mut self, seconds: f64) {
        self.time_limit = seconds;
    }

    /// Longest distance in centimeters the pointers may travel.
    pub fn distance_limit(&self) -> f32 {
        self.distance_limit
    }

    pub fn set_distance_limit(&mut self, centimeters: f32) {
        self.distance_limit = centimeters;
    }

    /// Window in seconds within which releases count as one tap.
    pub fn cluster_existence_time(&self) -> f64 {
        self.cluster_existence_time
    }

    pub fn set_cluster_existence_time(&mut self, seconds: f64) {
        self.cluster_existence_time = seconds;
    }

    /// Emitted with the tap position when a tap is recognized.
    pub fn tapped(&self) -> &Signal<Point> {
        &self.tapped
    }

    /// Where the target was hit.
    ///
    /// After recognition this is the hit cached at that moment, since the
    /// pointers involved are gone by the time anyone asks.
    pub fn hit_result(&self) -> Option<HitResult> {
        if self.core.state() == GestureState::Recognized {
            return self.cached_hit;
        }
        let position = self.screen_position();
        if position.is_valid() {
            self.core.hit_test(position)
        } else {
            None
        }
    }

    fn recognize(&mut self, now: f64) {
        let min_time = now - self.cluster_existence_time;
        let mut cluster = Vec::new();
        // Releases are appended in time order, so the first stale one ends
        // the scan.
        for (pointer, released_at) in self.removed.iter().rev() {
            if *released_at < min_time {
                break;
            }
            if self.core.hit_test(pointer.position()).is_some() {
                cluster.push(pointer);
            }
        }

        let centroid = Point::centroid(cluster.iter().map(|p| p.position()));
        let previous = Point::centroid(cluster.iter().map(|p| p.previous_position()));
        let (Some(centroid), Some(previous)) = (centroid, previous) else {
            tracing::debug!(target: targets::GESTURE, releases = self.removed.len(), "no release landed on the target");
            self.core.set_state(GestureState::Failed);
            return;
        };

        self.cached_position = centroid;
        self.cached_previous_position = previous;
        self.cached_hit = self.core.hit_test(centroid);
        tracing::debug!(target: targets::GESTURE, x = centroid.x, y = centroid.y, cluster = cluster.len(), "tap recognized");
        if self.core.set_state(GestureState::Recognized) {
            self.tapped.emit(centroid);
        }
    }
}

impl Gesture for TapGesture {
    fn core(&self) -> &GestureCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GestureCore {
        &mut self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn touches_began(&mut self, pointers: &[Pointer], frame: &FrameContext) {
        if self.core.active_count() == pointers.len() {
            self.start_time = frame.now;
        }
        // Joining fingers shift the centroid without moving it.
        self.last_centroid = self.core.screen_position();
    }

    fn touches_moved(&mut self, _pointers: &[Pointer], _frame: &FrameContext) {
        let centroid = self.core.screen_position();
        if self.last_centroid.is_valid() {
            self.total_movement += centroid - self.last_centroid;
        }
        self.last_centroid = centroid;
    }

    fn touches_ended(&mut self, pointers: &[Pointer], frame: &FrameContext) {
        self.removed
            .extend(pointers.iter().map(|p| (p.clone(), frame.now)));
        if self.core.active_count() > 0 {
            self.last_centroid = self.core.screen_position();
            return;
        }

        let distance = self.total_movement.length() / frame.dots_per_centimeter;
        let elapsed = frame.now - self.start_time;
        if distance >= self.distance_limit || elapsed > self.time_limit {
            tracing::debug!(target: targets::GESTURE, distance, elapsed, "tap exceeded its limits");
            self.core.set_state(GestureState::Failed);
            return;
        }
        self.recognize(frame.now);
    }

    fn touches_cancelled(&mut self, _pointers: &[Pointer], _frame: &FrameContext) {
        self.core.set_state(GestureState::Failed);
    }

    fn reset(&mut self) {
        self.total_movement = Point::ZERO;
        self.last_centroid = Point::INVALID;
        self.cached_position = Point::INVALID;
        self.cached_previous_position = Point::INVALID;
        self.cached_hit = None;
        self.removed.clear();
    }

    fn screen_position(&self) -> Point {
        if self.cached_position.is_valid() {
            self.cached_position
        } else {
            self.core.screen_position()
        }
    }

    fn previous_screen_position(&self) -> Point {
        if self.cached_position.is_valid() {
            self.cached_previous_position
        } else {
            self.core.previous_screen_position()
        }
    }
}

impl std::fmt::Debug for TapGesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapGesture")
            .field("core", &self.core)
            .field("time_limit", &self.time_limit)
            .field("distance_limit", &self.distance_limit)
            .field("cluster_existence_time", &self.cluster_existence_time)
            .field("removed", &self.removed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use horizon_touch_core::Rect;

    use super::*;
    use crate::gesture::{GestureId, GestureManager, RectTarget};
    use crate::input::InputSourceId;
    use crate::manager::FrameBatch;
    use crate::pointer::PointerType;

    const DPCM: f32 = 10.0;

    fn frame(now: f64) -> FrameContext {
        FrameContext {
            now,
            dots_per_centimeter: DPCM,
        }
    }

    fn target() -> Arc<dyn HitTarget> {
        Arc::new(RectTarget(Rect::new(0.0, 0.0, 100.0, 100.0)))
    }

    fn touch(x: f32, y: f32) -> Pointer {
        let mut pointer = Pointer::new(PointerType::Touch, InputSourceId::next());
        pointer.set_position(Point::new(x, y));
        pointer.buttons_mut().press(0);
        pointer
    }

    fn moved(pointer: &Pointer, x: f32, y: f32) -> Pointer {
        let mut pointer = pointer.clone();
        pointer.set_position(Point::new(x, y));
        pointer
    }

    fn released(pointer: &Pointer) -> Pointer {
        let mut pointer = pointer.clone();
        pointer.buttons_mut().release(0);
        pointer
    }

    fn press(pointers: &[&Pointer]) -> FrameBatch {
        FrameBatch {
            pressed: pointers.iter().map(|p| (*p).clone()).collect(),
            ..FrameBatch::default()
        }
    }

    fn release(pointers: &[&Pointer]) -> FrameBatch {
        FrameBatch {
            released: pointers.iter().map(|p| released(p)).collect(),
            ..FrameBatch::default()
        }
    }

    fn setup(config: TapConfig) -> (GestureManager, GestureId) {
        let mut manager = GestureManager::new();
        let id = manager.add(TapGesture::from_config(target(), &config));
        (manager, id)
    }

    #[test]
    fn test_two_finger_cluster() {
        let (mut manager, id) = setup(TapConfig::default());
        let a = touch(20.0, 20.0);
        let b = touch(40.0, 60.0);

        manager.process(&press(&[&a, &b]), &frame(0.0));
        manager.process(&release(&[&a]), &frame(0.05));
        assert_eq!(manager.get::<TapGesture>(id).unwrap().state(), GestureState::Possible);
        manager.process(&release(&[&b]), &frame(0.08));

        let tap = manager.get::<TapGesture>(id).unwrap();
        assert_eq!(tap.state(), GestureState::Recognized);
        assert_eq!(tap.screen_position(), Point::new(30.0, 40.0));
        assert_eq!(tap.hit_result().map(|hit| hit.position), Some(Point::new(30.0, 40.0)));
    }

    #[test]
    fn test_tapped_signal() {
        let (mut manager, id) = setup(TapConfig::default());
        let taps = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let taps_clone = taps.clone();
        manager
            .get::<TapGesture>(id)
            .unwrap()
            .tapped()
            .connect(move |position| taps_clone.lock().push(*position));

        let a = touch(10.0, 10.0);
        manager.process(&press(&[&a]), &frame(0.0));
        manager.process(&release(&[&a]), &frame(0.1));
        assert_eq!(*taps.lock(), vec![Point::new(10.0, 10.0)]);
    }

    #[test]
    fn test_drag_fails() {
        let config = TapConfig {
            distance_limit: 1.0,
            ..TapConfig::default()
        };
        let (mut manager, id) = setup(config);
        let a = touch(10.0, 10.0);
        manager.process(&press(&[&a]), &frame(0.0));

        // 50 pixels at 10 dots per centimeter is 5 cm.
        let dragged = moved(&a, 60.0, 10.0);
        manager.process(
            &FrameBatch {
                updated: vec![dragged.clone()],
                ..FrameBatch::default()
            },
            &frame(0.02),
        );
        manager.process(&release(&[&dragged]), &frame(0.04));

        assert_eq!(manager.get::<TapGesture>(id).unwrap().state(), GestureState::Failed);
    }

    #[test]
    fn test_small_movement_within_limit() {
        let config = TapConfig {
            distance_limit: 1.0,
            ..TapConfig::default()
        };
        let (mut manager, id) = setup(config);
        let a = touch(10.0, 10.0);
        manager.process(&press(&[&a]), &frame(0.0));
        let nudged = moved(&a, 13.0, 14.0);
        manager.process(
            &FrameBatch {
                updated: vec![nudged.clone()],
                ..FrameBatch::default()
            },
            &frame(0.02),
        );
        manager.process(&release(&[&nudged]), &frame(0.04));

        let tap = manager.get::<TapGesture>(id).unwrap();
        assert_eq!(tap.state(), GestureState::Recognized);
        assert_eq!(tap.previous_screen_position(), Point::new(10.0, 10.0));
    }

    fn update(pointers: &[&Pointer]) -> FrameBatch {
        FrameBatch {
            updated: pointers.iter().map(|p| (*p).clone()).collect(),
            ..FrameBatch::default()
        }
    }

    #[test]
    fn test_repeated_reports_do_not_add_movement() {
        let config = TapConfig {
            distance_limit: 1.0,
            ..TapConfig::default()
        };
        let (mut manager, id) = setup(config);
        let a = touch(10.0, 10.0);
        manager.process(&press(&[&a]), &frame(0.0));

        // 2 pixels once, then the tracker keeps resending the same spot.
        let nudged = moved(&a, 12.0, 10.0);
        for step in 1..=10 {
            manager.process(&update(&[&nudged]), &frame(f64::from(step) * 0.01));
        }
        manager.process(&release(&[&nudged]), &frame(0.2));

        assert_eq!(manager.get::<TapGesture>(id).unwrap().state(), GestureState::Recognized);
    }

    #[test]
    fn test_two_finger_move_counts_centroid_once() {
        let config = TapConfig {
            distance_limit: 1.0,
            ..TapConfig::default()
        };
        let (mut manager, id) = setup(config);
        let a = touch(10.0, 10.0);
        let b = touch(30.0, 10.0);
        manager.process(&press(&[&a, &b]), &frame(0.0));

        // Moving b by 16 pixels moves the centroid by 8, under 1 cm.
        let b_moved = moved(&b, 46.0, 10.0);
        manager.process(&update(&[&b_moved]), &frame(0.01));
        for step in 2..=6 {
            manager.process(&update(&[&a, &b_moved]), &frame(f64::from(step) * 0.01));
        }
        manager.process(&release(&[&a, &b_moved]), &frame(0.1));

        assert_eq!(manager.get::<TapGesture>(id).unwrap().state(), GestureState::Recognized);
    }

    #[test]
    fn test_movement_accumulates_across_frames() {
        let config = TapConfig {
            distance_limit: 1.0,
            ..TapConfig::default()
        };
        let (mut manager, id) = setup(config);
        let a = touch(10.0, 10.0);
        manager.process(&press(&[&a]), &frame(0.0));

        // Three 4 pixel steps add up to 1.2 cm.
        let mut current = a.clone();
        for step in 1..=3 {
            current = moved(&current, 10.0 + 4.0 * step as f32, 10.0);
            manager.process(&update(&[&current]), &frame(f64::from(step) * 0.01));
        }
        manager.process(&release(&[&current]), &frame(0.1));

        assert_eq!(manager.get::<TapGesture>(id).unwrap().state(), GestureState::Failed);
    }

    #[test]
    fn test_time_limit_fails() {
        let config = TapConfig {
            time_limit: 0.5,
            ..TapConfig::default()
        };
        let (mut manager, id) = setup(config);
        let a = touch(10.0, 10.0);
        manager.process(&press(&[&a]), &frame(1.0));
        manager.process(&release(&[&a]), &frame(1.75));
        assert_eq!(manager.get::<TapGesture>(id).unwrap().state(), GestureState::Failed);
    }

    #[test]
    fn test_stale_release_left_out_of_cluster() {
        let (mut manager, id) = setup(TapConfig::default());
        let a = touch(10.0, 10.0);
        let b = touch(50.0, 50.0);
        manager.process(&press(&[&a, &b]), &frame(0.0));
        manager.process(&release(&[&a]), &frame(0.0));
        manager.process(&release(&[&b]), &frame(0.5));

        let tap = manager.get::<TapGesture>(id).unwrap();
        assert_eq!(tap.state(), GestureState::Recognized);
        assert_eq!(tap.screen_position(), Point::new(50.0, 50.0));
    }

    #[test]
    fn test_release_outside_target_fails() {
        let (mut manager, id) = setup(TapConfig::default());
        let a = touch(10.0, 10.0);
        let b = touch(50.0, 50.0);
        manager.process(&press(&[&a, &b]), &frame(0.0));
        manager.process(&release(&[&a]), &frame(0.0));

        let b_outside = moved(&b, 500.0, 50.0);
        manager.process(
            &FrameBatch {
                updated: vec![b_outside.clone()],
                released: vec![released(&b_outside)],
                ..FrameBatch::default()
            },
            &frame(0.5),
        );
        let tap = manager.get::<TapGesture>(id).unwrap();
        assert_eq!(tap.state(), GestureState::Failed);
        assert!(!tap.screen_position().is_valid());
    }

    #[test]
    fn test_cancel_fails() {
        let (mut manager, id) = setup(TapConfig::default());
        let a = touch(10.0, 10.0);
        manager.process(&press(&[&a]), &frame(0.0));
        manager.process(
            &FrameBatch {
                cancelled: vec![a.clone()],
                ..FrameBatch::default()
            },
            &frame(0.1),
        );
        assert_eq!(manager.get::<TapGesture>(id).unwrap().state(), GestureState::Failed);
    }

    #[test]
    fn test_reset_clears_cached_tap() {
        let (mut manager, id) = setup(TapConfig::default());
        let a = touch(10.0, 10.0);
        manager.process(&press(&[&a]), &frame(0.0));
        manager.process(&release(&[&a]), &frame(0.1));
        assert!(manager.get::<TapGesture>(id).unwrap().screen_position().is_valid());

        manager.process(&FrameBatch::default(), &frame(0.2));
        let tap = manager.get::<TapGesture>(id).unwrap();
        assert_eq!(tap.state(), GestureState::Possible);
        assert!(!tap.screen_position().is_valid());
        assert!(tap.hit_result().is_none());

        // A second tap is recognized on its own.
        let b = touch(90.0, 90.0);
        manager.process(&press(&[&b]), &frame(1.0));
        manager.process(&release(&[&b]), &frame(1.1));
        let tap = manager.get::<TapGesture>(id).unwrap();
        assert_eq!(tap.state(), GestureState::Recognized);
        assert_eq!(tap.screen_position(), Point::new(90.0, 90.0));
    }
}
