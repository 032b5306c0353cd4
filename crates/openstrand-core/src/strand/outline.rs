use crate::geometry::{Spine, unit_or_zero};
use kurbo::{Point, Rect, Vec2};

/// Corner points and end bars derived from a strand's spine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Outline {
    pub top_left: Point,
    pub bottom_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub side_line_start: (Point, Point),
    pub side_line_end: (Point, Point),
}

fn normal(tangent: Vec2) -> Vec2 {
    let unit = unit_or_zero(tangent);
    Vec2::new(-unit.y, unit.x)
}

impl Outline {
    /// Offset ±width/2 perpendicular to the end tangents. Side lines span the
    /// ribbon plus both outlines.
    pub fn compute(spine: &Spine, width: f64, stroke_width: f64) -> Self {
        let n_start = normal(spine.start_tangent());
        let n_end = normal(spine.end_tangent());
        let half = width / 2.0;
        let bar = (width + 2.0 * stroke_width) / 2.0;
        Self {
            top_left: spine.start + n_start * half,
            bottom_left: spine.start - n_start * half,
            top_right: spine.end + n_end * half,
            bottom_right: spine.end - n_end * half,
            side_line_start: (spine.start - n_start * bar, spine.start + n_start * bar),
            side_line_end: (spine.end - n_end * bar, spine.end + n_end * bar),
        }
    }

    /// Bounds of the side lines.
    pub fn bounds(&self) -> Rect {
        Rect::from_points(self.side_line_start.0, self.side_line_start.1)
            .union(Rect::from_points(self.side_line_end.0, self.side_line_end.1))
    }
}
