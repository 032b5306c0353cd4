//! Visual identity of two saved states.
//!
//! Two states are identical when nothing on screen would differ: geometry
//! within a tenth of a pixel, colors exactly, flags exactly.

use crate::persistence::{ProjectFile, RectRecord, StrandRecord, StrandType};
use kurbo::Point;
use std::collections::{BTreeSet, HashMap};

/// Geometric tolerance for points, in pixels.
pub const POINT_TOLERANCE: f64 = 0.1;
/// Tolerance for widths.
pub const WIDTH_TOLERANCE: f64 = 0.1;

/// Canonical form of a deletion rectangle: coordinates in hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RectSignature {
    Corners([(i64, i64); 4]),
    Xywh([i64; 6]),
}

fn hundredths(v: f64) -> i64 {
    (v * 100.0).round() as i64
}

impl From<&RectRecord> for RectSignature {
    fn from(record: &RectRecord) -> Self {
        let corner = |[x, y]: [f64; 2]| (hundredths(x), hundredths(y));
        match *record {
            RectRecord::Corners {
                top_left,
                top_right,
                bottom_left,
                bottom_right,
            } => RectSignature::Corners([
                corner(top_left),
                corner(top_right),
                corner(bottom_left),
                corner(bottom_right),
            ]),
            RectRecord::Xywh {
                x,
                y,
                width,
                height,
                offset_x,
                offset_y,
            } => RectSignature::Xywh([x, y, width, height, offset_x, offset_y].map(hundredths)),
        }
    }
}

fn close(a: Point, b: Point) -> bool {
    (a - b).hypot() <= POINT_TOLERANCE
}

fn close_opt(a: Option<Point>, b: Option<Point>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => close(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn rect_signatures(record: &StrandRecord) -> Vec<RectSignature> {
    let mut sigs: Vec<RectSignature> = record.deletion_rectangles.iter().map(RectSignature::from).collect();
    sigs.sort();
    sigs
}

fn sorted_components(record: &StrandRecord) -> Option<[String; 2]> {
    let (a, b) = record.components()?;
    Some(if a <= b { [a, b] } else { [b, a] })
}

/// Whether two strand records draw the same.
pub fn strands_identical(a: &StrandRecord, b: &StrandRecord) -> bool {
    let (a_cp1, a_cp2) = a.control_points();
    let (b_cp1, b_cp2) = b.control_points();
    let geometry = close(a.start, b.start)
        && close(a.end, b.end)
        && close_opt(a_cp1, b_cp1)
        && close_opt(a_cp2, b_cp2)
        && close_opt(a.control_point_center, b.control_point_center);
    if !geometry {
        return false;
    }
    if a.color != b.color || a.stroke_color != b.stroke_color {
        return false;
    }
    if (a.width - b.width).abs() > WIDTH_TOLERANCE || (a.stroke_width - b.stroke_width).abs() > WIDTH_TOLERANCE {
        return false;
    }
    let flags = |r: &StrandRecord| {
        [
            r.start_line_visible,
            r.end_line_visible,
            r.is_hidden,
            r.shadow_only,
            r.start_extension_visible,
            r.end_extension_visible,
            r.start_arrow_visible,
            r.end_arrow_visible,
            r.full_arrow_visible,
        ]
    };
    if flags(a) != flags(b)
        || a.has_circles != b.has_circles
        || a.closed_connections != b.closed_connections
        || a.knot_connections != b.knot_connections
    {
        return false;
    }
    let a_masked = a.kind == StrandType::MaskedStrand;
    if a_masked != (b.kind == StrandType::MaskedStrand) {
        return false;
    }
    !a_masked || (sorted_components(a) == sorted_components(b) && rect_signatures(a) == rect_signatures(b))
}

/// Whether two project states are visually identical.
pub fn states_identical(a: &ProjectFile, b: &ProjectFile) -> bool {
    if a.strands.len() != b.strands.len() {
        return false;
    }
    let masked = |p: &ProjectFile| p.strands.iter().filter(|s| s.kind == StrandType::MaskedStrand).count();
    if masked(a) != masked(b) {
        return false;
    }
    let a_order: Vec<&str> = a.strands.iter().map(|s| s.layer_name.as_str()).collect();
    let b_order: Vec<&str> = b.strands.iter().map(|s| s.layer_name.as_str()).collect();
    let a_names: BTreeSet<&str> = a_order.iter().copied().collect();
    let b_names: BTreeSet<&str> = b_order.iter().copied().collect();
    if a_names != b_names || a_order != b_order {
        return false;
    }

    if !a.groups.keys().eq(b.groups.keys()) {
        return false;
    }
    let same_groups = a.groups.iter().zip(b.groups.values()).all(|((_, ga), gb)| {
        let la: BTreeSet<&String> = ga.strands.iter().collect();
        let lb: BTreeSet<&String> = gb.strands.iter().collect();
        la == lb
    });
    if !same_groups {
        return false;
    }

    let by_name: HashMap<&str, &StrandRecord> = b.strands.iter().map(|s| (s.layer_name.as_str(), s)).collect();
    let same_strands = a
        .strands
        .iter()
        .all(|s| by_name.get(s.layer_name.as_str()).is_some_and(|other| strands_identical(s, other)));
    if !same_strands {
        return false;
    }

    a.locked_layers == b.locked_layers
        && a.lock_mode == b.lock_mode
        && a.shadow_enabled == b.shadow_enabled
        && a.show_control_points == b.show_control_points
}
