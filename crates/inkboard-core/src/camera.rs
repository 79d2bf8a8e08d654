//! Camera module for pan/zoom transforms.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest zoom level the camera can reach.
pub const MIN_ZOOM: f64 = 0.1;
/// Largest zoom level the camera can reach.
pub const MAX_ZOOM: f64 = 5.0;
/// Multiplicative step applied by one wheel notch.
pub const ZOOM_FACTOR: f64 = 1.1;

/// Direction of a single zoom step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Derive the direction from a wheel delta (negative scrolls up, zooming in).
    ///
    /// Returns `None` for a zero delta.
    pub fn from_wheel_delta(delta_y: f64) -> Option<Self> {
        if delta_y < 0.0 {
            Some(ZoomDirection::In)
        } else if delta_y > 0.0 {
            Some(ZoomDirection::Out)
        } else {
            None
        }
    }

    fn factor(self) -> f64 {
        match self {
            ZoomDirection::In => ZOOM_FACTOR,
            ZoomDirection::Out => 1.0 / ZOOM_FACTOR,
        }
    }
}

/// Camera holds the view transform for the board.
///
/// `offset` is a screen-pixel pan and `zoom` a scale factor; a world point `w`
/// appears on screen at `w * zoom + offset`. The camera is a plain value: every
/// operation returns a new camera instead of mutating in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan), in screen pixels.
    pub offset: Vec2,
    /// Current zoom level, always within `[MIN_ZOOM, MAX_ZOOM]`.
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Camera {
    /// No pan, zoom 1.
    pub const IDENTITY: Camera = Camera {
        offset: Vec2::ZERO,
        zoom: 1.0,
    };

    /// Create a camera, clamping the zoom into the allowed range.
    pub fn new(offset: Vec2, zoom: f64) -> Self {
        Self {
            offset,
            zoom: clamp_zoom(zoom),
        }
    }

    /// World-to-screen transform, used when replaying strokes.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Screen-to-world transform, used for input handling.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        Point::new(
            (screen_point.x - self.offset.x) / self.zoom,
            (screen_point.y - self.offset.y) / self.zoom,
        )
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        Point::new(
            world_point.x * self.zoom + self.offset.x,
            world_point.y * self.zoom + self.offset.y,
        )
    }

    /// Pan by a delta in screen coordinates. The delta is not scaled by zoom.
    ///
    /// A pan that would leave the offset non-finite is ignored.
    pub fn panned(&self, delta: Vec2) -> Camera {
        let offset = self.offset + delta;
        if !offset.is_finite() {
            return *self;
        }
        Camera {
            offset,
            zoom: self.zoom,
        }
    }

    /// Zoom one step, keeping `anchor` (a screen point) over the same world point.
    ///
    /// Leaves the camera unchanged if the anchor is not finite.
    pub fn zoomed_at(&self, anchor: Point, direction: ZoomDirection) -> Camera {
        let new_zoom = clamp_zoom(self.zoom * direction.factor());
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return *self;
        }

        let anchor = anchor.to_vec2();
        let offset = anchor - (anchor - self.offset) / self.zoom * new_zoom;
        if !offset.is_finite() {
            return *self;
        }
        Camera {
            offset,
            zoom: new_zoom,
        }
    }

    /// Whether this camera is the identity view.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_nan() {
        return 1.0;
    }
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_point_eq(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < 1e-9, "{a:?} != {b:?}");
        assert!((a.y - b.y).abs() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn test_default_camera() {
        let camera = Camera::default();
        assert_eq!(camera.offset, Vec2::ZERO);
        assert!((camera.zoom - 1.0).abs() < f64::EPSILON);
        assert!(camera.is_identity());
    }

    #[test]
    fn test_screen_to_world_identity() {
        let camera = Camera::IDENTITY;
        let screen = Point::new(100.0, 200.0);
        assert_point_eq(camera.screen_to_world(screen), screen);
    }

    #[test]
    fn test_screen_to_world_with_offset() {
        let camera = Camera::new(Vec2::new(50.0, 100.0), 1.0);
        let world = camera.screen_to_world(Point::new(100.0, 200.0));
        assert_point_eq(world, Point::new(50.0, 100.0));
    }

    #[test]
    fn test_screen_to_world_with_zoom() {
        let camera = Camera::new(Vec2::ZERO, 2.0);
        let world = camera.screen_to_world(Point::new(100.0, 200.0));
        assert_point_eq(world, Point::new(50.0, 100.0));
    }

    #[test]
    fn test_affine_matches_point_math() {
        let camera = Camera::new(Vec2::new(30.0, -20.0), 1.5);
        let world = Point::new(12.0, 34.0);
        assert_point_eq(camera.transform() * world, camera.world_to_screen(world));

        let screen = Point::new(123.0, 456.0);
        assert_point_eq(
            camera.inverse_transform() * screen,
            camera.screen_to_world(screen),
        );
    }

    #[test]
    fn test_roundtrip_conversion() {
        let camera = Camera::new(Vec2::new(30.0, -20.0), 1.5);
        let original = Point::new(123.0, 456.0);
        let back = camera.world_to_screen(camera.screen_to_world(original));
        assert_point_eq(back, original);
    }

    #[test]
    fn test_zoom_in_at_anchor() {
        let camera = Camera::IDENTITY;
        let anchor = Point::new(50.0, 50.0);
        let zoomed = camera.zoomed_at(anchor, ZoomDirection::In);

        assert!((zoomed.zoom - 1.1).abs() < 1e-12);
        assert_point_eq(zoomed.screen_to_world(anchor), Point::new(50.0, 50.0));
        assert!((zoomed.offset.x - -5.0).abs() < 1e-9);
        assert!((zoomed.offset.y - -5.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_keeps_anchor_with_pan() {
        let camera = Camera::new(Vec2::new(-120.0, 45.0), 2.3);
        let anchor = Point::new(400.0, 300.0);
        let before = camera.screen_to_world(anchor);
        let after = camera.zoomed_at(anchor, ZoomDirection::Out);
        assert_point_eq(after.world_to_screen(before), anchor);
    }

    #[test]
    fn test_zoom_clamp() {
        let mut camera = Camera::IDENTITY;
        for _ in 0..200 {
            camera = camera.zoomed_at(Point::ZERO, ZoomDirection::Out);
        }
        assert!((camera.zoom - MIN_ZOOM).abs() < f64::EPSILON);

        for _ in 0..200 {
            camera = camera.zoomed_at(Point::ZERO, ZoomDirection::In);
        }
        assert!((camera.zoom - MAX_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_new_clamps_zoom() {
        assert!((Camera::new(Vec2::ZERO, 100.0).zoom - MAX_ZOOM).abs() < f64::EPSILON);
        assert!((Camera::new(Vec2::ZERO, 0.0).zoom - MIN_ZOOM).abs() < f64::EPSILON);
        assert!((Camera::new(Vec2::ZERO, f64::NAN).zoom - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan() {
        let camera = Camera::new(Vec2::ZERO, 3.0).panned(Vec2::new(10.0, 20.0));
        assert!((camera.offset.x - 10.0).abs() < f64::EPSILON);
        assert!((camera.offset.y - 20.0).abs() < f64::EPSILON);
        assert!((camera.zoom - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_wheel_direction() {
        assert_eq!(ZoomDirection::from_wheel_delta(-3.0), Some(ZoomDirection::In));
        assert_eq!(ZoomDirection::from_wheel_delta(120.0), Some(ZoomDirection::Out));
        assert_eq!(ZoomDirection::from_wheel_delta(0.0), None);
    }

    #[test]
    fn test_non_finite_pan_is_ignored() {
        let camera = Camera::new(Vec2::new(3.0, 4.0), 2.0);
        assert_eq!(camera.panned(Vec2::new(f64::NAN, 1.0)), camera);
        assert_eq!(camera.panned(Vec2::new(f64::INFINITY, 0.0)), camera);
    }

    #[test]
    fn test_non_finite_anchor_is_ignored() {
        let camera = Camera::new(Vec2::new(3.0, 4.0), 2.0);
        assert_eq!(camera.zoomed_at(Point::new(f64::NAN, 0.0), ZoomDirection::In), camera);
        assert_eq!(
            camera.zoomed_at(Point::new(0.0, f64::NEG_INFINITY), ZoomDirection::Out),
            camera
        );
    }
}
