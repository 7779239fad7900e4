//! Screen-space coordinate transforms.

use std::fmt;

use horizon_touch_core::{Point, Size};

/// Transforms a screen position before it becomes visible to consumers.
///
/// Used for rotated or cropped displays. Any `Fn(Point) -> Point` closure
/// works as a remapper.
pub trait CoordinatesRemapper: Send + Sync {
    /// Map a screen position.
    fn remap(&self, position: Point) -> Point;
}

impl<F> CoordinatesRemapper for F
where
    F: Fn(Point) -> Point + Send + Sync,
{
    fn remap(&self, position: Point) -> Point {
        self(position)
    }
}

/// Leaves positions unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRemapper;

impl CoordinatesRemapper for IdentityRemapper {
    fn remap(&self, position: Point) -> Point {
        position
    }
}

impl fmt::Debug for dyn CoordinatesRemapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CoordinatesRemapper")
    }
}

/// Convert a normalized TUIO position to screen pixels.
///
/// TUIO's origin is the top left with Y pointing down, screen space has Y
/// pointing up, hence the inversion.
pub fn normalized_to_screen(normalized: Point, screen: Size) -> Point {
    Point::new(
        normalized.x * screen.width,
        (1.0 - normalized.y) * screen.height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_to_screen_inverts_y() {
        let screen = Size::new(1920.0, 1080.0);
        assert_eq!(
            normalized_to_screen(Point::new(0.0, 0.0), screen),
            Point::new(0.0, 1080.0)
        );
        assert_eq!(
            normalized_to_screen(Point::new(0.5, 0.25), screen),
            Point::new(960.0, 810.0)
        );
    }

    #[test]
    fn test_closure_remapper() {
        let mirror = |p: Point| Point::new(100.0 - p.x, p.y);
        assert_eq!(mirror.remap(Point::new(30.0, 5.0)), Point::new(70.0, 5.0));
        assert_eq!(IdentityRemapper.remap(Point::new(1.0, 2.0)), Point::new(1.0, 2.0));
    }
}
