//! Geometry primitives: spines, stroked bodies, boolean regions and endpoint lookup.

mod curve;
mod index;
mod region;

pub use curve::{Spine, fill_body, shadow_path, stroke_outline, stroked_body};
pub use index::EndpointIndex;
pub use region::{GeoRegionOps, Region, RegionOps, RegionPolygon};

use kurbo::{Affine, Point, Rect, Size, Vec2};

/// Derivative magnitudes below this fall back to the chord direction.
pub const TANGENT_EPSILON: f64 = 1e-6;

/// Distance under which two endpoints are considered the same point.
pub const ENDPOINT_EPSILON: f64 = 5.0;

/// Length of the segments added at both ends of the shadow path.
pub const SHADOW_EXTENSION: f64 = 10.0;

/// Side of the square hit box around a strand start.
pub const START_SELECTION_SIZE: f64 = 120.0;

/// Tolerance used when flattening curves into polygons.
pub const FLATTEN_TOLERANCE: f64 = 0.1;

/// Normalize a vector, returning zero for degenerate input.
pub fn unit_or_zero(v: Vec2) -> Vec2 {
    let len = v.length();
    if len < TANGENT_EPSILON { Vec2::ZERO } else { v / len }
}

/// Check whether two points coincide within [`ENDPOINT_EPSILON`].
pub fn points_coincide(a: Point, b: Point) -> bool {
    a.distance(b) <= ENDPOINT_EPSILON
}

/// Check whether two points are equal within `tolerance`.
pub fn points_close(a: Point, b: Point, tolerance: f64) -> bool {
    (a.x - b.x).abs() <= tolerance && (a.y - b.y).abs() <= tolerance
}

/// Rotate `point` around `center` by `angle` radians.
pub fn rotate_around(point: Point, center: Point, angle: f64) -> Point {
    Affine::rotate_about(angle, center) * point
}

/// Arithmetic mean of a set of points.
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
    Some((sum / points.len() as f64).to_point())
}

/// The square hit box around a strand start.
pub fn start_selection_rect(start: Point) -> Rect {
    Rect::from_center_size(start, Size::new(START_SELECTION_SIZE, START_SELECTION_SIZE))
}

/// Whether `point` lies within the end selection disc of a strand.
pub fn end_selection_contains(end: Point, width: f64, point: Point) -> bool {
    end.distance(point) <= width / 2.0
}

/// A square hit box of side `size` centered on `center`.
pub fn square_hit_box(center: Point, size: f64) -> Rect {
    Rect::from_center_size(center, Size::new(size, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_unit_or_zero() {
        let u = unit_or_zero(Vec2::new(3.0, 4.0));
        assert!((u.x - 0.6).abs() < 1e-12);
        assert!((u.y - 0.8).abs() < 1e-12);
        assert_eq!(unit_or_zero(Vec2::new(1e-9, 0.0)), Vec2::ZERO);
    }

    #[test]
    fn test_rotate_around() {
        let p = rotate_around(Point::new(55.0, -5.0), Point::new(50.0, 0.0), FRAC_PI_2);
        assert!((p.x - 55.0).abs() < 1e-9);
        assert!((p.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_centroid() {
        let c = centroid(&[Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(5.0, 9.0)]).unwrap();
        assert!((c.x - 5.0).abs() < 1e-12);
        assert!((c.y - 3.0).abs() < 1e-12);
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn test_selection_regions() {
        let rect = start_selection_rect(Point::new(100.0, 100.0));
        assert!(rect.contains(Point::new(159.0, 41.0)));
        assert!(!rect.contains(Point::new(161.0, 100.0)));

        assert!(end_selection_contains(Point::new(0.0, 0.0), 20.0, Point::new(7.0, 7.0)));
        assert!(!end_selection_contains(Point::new(0.0, 0.0), 20.0, Point::new(8.0, 8.0)));
    }

    #[test]
    fn test_points_coincide() {
        assert!(points_coincide(Point::new(0.0, 0.0), Point::new(3.0, 4.0)));
        assert!(!points_coincide(Point::new(0.0, 0.0), Point::new(3.0, 4.1)));
    }
}
