//! Cubic spines and the paths derived from them.

use super::{SHADOW_EXTENSION, TANGENT_EPSILON, unit_or_zero};
use kurbo::{
    Affine, BezPath, Cap, CubicBez, Join, ParamCurve, ParamCurveDeriv, Point, Stroke, StrokeOpts,
    Vec2,
};
use serde::{Deserialize, Serialize};

/// Tolerance for the stroker output.
const STROKE_TOLERANCE: f64 = 0.05;

/// Weight applied to neighbour distances when building the composite spline.
const COMPOSITE_WEIGHT: f64 = 1.0 / 3.0;

/// The centerline of a strand.
///
/// A plain cubic from `start` to `end`, or, when the center control point is
/// locked, two C¹-joined cubics passing through `cp_center`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spine {
    pub start: Point,
    pub end: Point,
    pub cp1: Point,
    pub cp2: Point,
    #[serde(default)]
    pub cp_center: Option<Point>,
    #[serde(default)]
    pub cp_center_locked: bool,
}

impl Spine {
    /// A straight spine: control points sit on the endpoints.
    pub fn straight(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            cp1: start,
            cp2: end,
            cp_center: Some(start.midpoint(end)),
            cp_center_locked: false,
        }
    }

    /// Whether the spine is drawn as the two-segment composite.
    pub fn is_composite(&self) -> bool {
        self.cp_center_locked && self.cp_center.is_some()
    }

    /// The single cubic through start, cp1, cp2, end.
    pub fn cubic(&self) -> CubicBez {
        CubicBez::new(self.start, self.cp1, self.cp2, self.end)
    }

    /// The two cubics of the composite spline, if the center is locked.
    pub fn composite(&self) -> Option<(CubicBez, CubicBez)> {
        if !self.cp_center_locked {
            return None;
        }
        let p2 = self.cp_center?;
        let (p0, p1, p3, p4) = (self.start, self.cp1, self.cp2, self.end);

        let start_unit = unit_or_zero(p1 - p0);
        let in_unit = unit_or_zero(p2 - p1);
        let out_unit = unit_or_zero(p3 - p2);
        let end_unit = unit_or_zero(p4 - p3);
        let center_unit = unit_or_zero(in_unit * 0.5 + out_unit * 0.5);

        let d01 = p0.distance(p1);
        let d12 = p1.distance(p2);
        let d23 = p2.distance(p3);
        let d34 = p3.distance(p4);

        let cp_a1 = if start_unit != Vec2::ZERO { p0 + start_unit * (d01 * COMPOSITE_WEIGHT) } else { p1 };
        let cp_a2 = if center_unit != Vec2::ZERO { p2 - center_unit * (d12 * COMPOSITE_WEIGHT) } else { p1 };
        let cp_b1 = if center_unit != Vec2::ZERO { p2 + center_unit * (d23 * COMPOSITE_WEIGHT) } else { p3 };
        let cp_b2 = if end_unit != Vec2::ZERO { p4 - end_unit * (d34 * COMPOSITE_WEIGHT) } else { p3 };

        Some((CubicBez::new(p0, cp_a1, cp_a2, p2), CubicBez::new(p2, cp_b1, cp_b2, p4)))
    }

    /// Pick the sub-curve and local parameter for `t`.
    fn segment_at(&self, t: f64) -> (CubicBez, f64, f64) {
        let t = t.clamp(0.0, 1.0);
        match self.composite() {
            Some((first, _)) if t <= 0.5 => (first, t * 2.0, 2.0),
            Some((_, second)) => (second, (t - 0.5) * 2.0, 2.0),
            None => (self.cubic(), t, 1.0),
        }
    }

    /// Evaluate the spine at `t` in `[0, 1]`.
    pub fn point_at(&self, t: f64) -> Point {
        let (curve, local, _) = self.segment_at(t);
        curve.eval(local)
    }

    /// Derivative of the spine at `t`.
    ///
    /// Falls back to the chord of the selected curve when the derivative
    /// vanishes (coincident control points).
    pub fn tangent_at(&self, t: f64) -> Vec2 {
        let (curve, local, scale) = self.segment_at(t);
        let deriv = curve.deriv().eval(local).to_vec2() * scale;
        if deriv.length() < TANGENT_EPSILON {
            curve.p3 - curve.p0
        } else {
            deriv
        }
    }

    /// Tangent direction at the start.
    pub fn start_tangent(&self) -> Vec2 {
        self.tangent_at(0.0)
    }

    /// Tangent direction at the end.
    pub fn end_tangent(&self) -> Vec2 {
        self.tangent_at(1.0)
    }

    /// The spine as a path.
    pub fn path(&self) -> BezPath {
        let mut path = BezPath::new();
        path.move_to(self.start);
        self.append_curves(&mut path);
        path
    }

    fn append_curves(&self, path: &mut BezPath) {
        match self.composite() {
            Some((first, second)) => {
                path.curve_to(first.p1, first.p2, first.p3);
                path.curve_to(second.p1, second.p2, second.p3);
            }
            None => path.curve_to(self.cp1, self.cp2, self.end),
        }
    }

    /// Apply an affine transform to every point of the spine.
    pub fn transform(&mut self, affine: Affine) {
        self.start = affine * self.start;
        self.end = affine * self.end;
        self.cp1 = affine * self.cp1;
        self.cp2 = affine * self.cp2;
        if let Some(center) = self.cp_center.as_mut() {
            *center = affine * *center;
        }
    }

    /// Translate every point of the spine.
    pub fn translate(&mut self, delta: Vec2) {
        self.transform(Affine::translate(delta));
    }

    /// All defining points (start, end, cp1, cp2 and the center if present).
    pub fn points(&self) -> Vec<Point> {
        let mut points = vec![self.start, self.end, self.cp1, self.cp2];
        if let Some(center) = self.cp_center {
            points.push(center);
        }
        points
    }

    /// Euclidean distance between the endpoints.
    pub fn chord_length(&self) -> f64 {
        self.start.distance(self.end)
    }
}

/// Stroke a path with miter joins and flat caps.
pub fn stroke_outline(path: &BezPath, width: f64) -> BezPath {
    let style = Stroke::new(width).with_join(Join::Miter).with_caps(Cap::Butt);
    kurbo::stroke(path.iter(), &style, &StrokeOpts::default(), STROKE_TOLERANCE)
}

/// The outer body of a strand, including its outline.
pub fn stroked_body(spine: &Spine, width: f64, stroke_width: f64) -> BezPath {
    stroke_outline(&spine.path(), width + 2.0 * stroke_width)
}

/// The inner body of a strand, painted with the strand color.
pub fn fill_body(spine: &Spine, width: f64) -> BezPath {
    stroke_outline(&spine.path(), width)
}

/// The spine extended by [`SHADOW_EXTENSION`] beyond both endpoints.
pub fn shadow_path(spine: &Spine) -> BezPath {
    let start_dir = unit_or_zero(spine.start_tangent());
    let end_dir = unit_or_zero(spine.end_tangent());

    let mut path = BezPath::new();
    path.move_to(spine.start - start_dir * SHADOW_EXTENSION);
    path.line_to(spine.start);
    spine.append_curves(&mut path);
    path.line_to(spine.end + end_dir * SHADOW_EXTENSION);
    path
}
