//! Grid and angle snapping for interactive edits.

use kurbo::Point;

/// Grid size for snapping (matches the visual grid).
pub const GRID_SIZE: f64 = 20.0;

/// Angle increment for rubber-band strands, in degrees.
pub const ANGLE_SNAP_INCREMENT: f64 = 5.0;

/// Shortest strand the rubber band produces.
pub const MIN_DRAW_LENGTH: f64 = 25.0;

/// Result of an angle snap operation.
#[derive(Debug, Clone, Copy)]
pub struct AngleSnapResult {
    /// The snapped endpoint.
    pub point: Point,
    /// The snapped angle in degrees (0-360).
    pub angle_degrees: f64,
    /// Distance from the start point after clamping.
    pub distance: f64,
}

/// Snap an angle to the nearest increment.
/// Returns the snapped angle in degrees (0-360).
pub fn snap_angle(angle_degrees: f64, increment: f64) -> f64 {
    let snapped = (angle_degrees / increment).round() * increment;
    if snapped < 0.0 {
        snapped + 360.0
    } else if snapped >= 360.0 {
        snapped - 360.0
    } else {
        snapped
    }
}

/// Snap the end of a strand being drawn from `start`.
///
/// The angle is rounded to [`ANGLE_SNAP_INCREMENT`] and the length is at
/// least [`MIN_DRAW_LENGTH`].
pub fn snap_strand_end(start: Point, cursor: Point) -> AngleSnapResult {
    let delta = cursor - start;
    let raw = delta.y.atan2(delta.x).to_degrees();
    let angle = snap_angle(if raw < 0.0 { raw + 360.0 } else { raw }, ANGLE_SNAP_INCREMENT);
    let distance = delta.length().max(MIN_DRAW_LENGTH);
    let radians = angle.to_radians();
    AngleSnapResult {
        point: Point::new(start.x + distance * radians.cos(), start.y + distance * radians.sin()),
        angle_degrees: angle,
        distance,
    }
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    Point::new(
        (point.x / grid_size).round() * grid_size,
        (point.y / grid_size).round() * grid_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(Point::new(25.0, 35.0), GRID_SIZE), Point::new(20.0, 40.0));
        assert_eq!(snap_to_grid(Point::new(-9.0, 11.0), GRID_SIZE), Point::new(-0.0, 20.0));
    }

    #[test]
    fn test_snap_angle() {
        assert_eq!(snap_angle(7.0, 5.0), 5.0);
        assert_eq!(snap_angle(358.0, 5.0), 0.0);
        assert_eq!(snap_angle(-2.4, 5.0), 0.0);
        assert_eq!(snap_angle(-3.0, 5.0), 355.0);
    }

    #[test]
    fn test_snap_strand_end_rounds_angle() {
        let result = snap_strand_end(Point::new(0.0, 0.0), Point::new(100.0, 3.0));
        assert_eq!(result.angle_degrees, 0.0);
        assert!((result.point.y).abs() < 1e-9);
        assert!((result.distance - (100.0f64.powi(2) + 9.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_snap_strand_end_enforces_min_length() {
        let result = snap_strand_end(Point::new(0.0, 0.0), Point::new(0.0, 5.0));
        assert_eq!(result.angle_degrees, 90.0);
        assert!((result.point.y - MIN_DRAW_LENGTH).abs() < 1e-9);
    }
}
