//! Serde records for project files.
//!
//! Field names follow the files written by earlier releases; aliases cover
//! the older spellings that are still found in the wild.

use crate::strand::{DEFAULT_STROKE_WIDTH, DEFAULT_WIDTH, End, KnotConnection, Rgba};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Strand variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrandType {
    Strand,
    AttachedStrand,
    MaskedStrand,
}

/// Attachment side, written as `0`/`1` and also read as `"start"`/`"end"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SideRecord {
    Index(usize),
    Name(End),
}

impl SideRecord {
    pub fn end(self) -> Option<End> {
        match self {
            SideRecord::Index(i) => End::from_index(i),
            SideRecord::Name(end) => Some(end),
        }
    }
}

impl From<End> for SideRecord {
    fn from(end: End) -> Self {
        SideRecord::Index(end.index())
    }
}

/// A deletion rectangle in either of its two record forms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RectRecord {
    Corners {
        top_left: [f64; 2],
        top_right: [f64; 2],
        bottom_left: [f64; 2],
        bottom_right: [f64; 2],
    },
    /// `x`, `y` is the top-left corner; the offsets are relative to the
    /// mask center and only informative.
    Xywh {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(default)]
        offset_x: f64,
        #[serde(default)]
        offset_y: f64,
    },
}

/// Control points of a group member.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlPointsRecord {
    #[serde(default)]
    pub control_point1: Option<Point>,
    #[serde(default)]
    pub control_point2: Option<Point>,
    #[serde(default)]
    pub control_point_center: Option<Point>,
    #[serde(default)]
    pub control_point_center_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(default)]
    pub strands: Vec<String>,
    #[serde(default)]
    pub main_strands: Vec<String>,
    #[serde(default)]
    pub control_points: BTreeMap<String, ControlPointsRecord>,
    #[serde(default)]
    pub collapsed: bool,
}

fn yes() -> bool {
    true
}

fn default_width() -> f64 {
    DEFAULT_WIDTH
}

fn default_stroke_width() -> f64 {
    DEFAULT_STROKE_WIDTH
}

/// One entry of the `strands` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrandRecord {
    #[serde(rename = "type")]
    pub kind: StrandType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub layer_name: String,
    #[serde(default)]
    pub set_number: Option<i32>,
    pub start: Point,
    pub end: Point,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub color: Rgba,
    #[serde(default = "Rgba::black")]
    pub stroke_color: Rgba,
    #[serde(default)]
    pub circle_stroke_color: Option<Rgba>,
    #[serde(default)]
    pub start_circle_stroke_color: Option<Rgba>,
    #[serde(default)]
    pub end_circle_stroke_color: Option<Rgba>,

    #[serde(default)]
    pub control_point1: Option<Point>,
    #[serde(default)]
    pub control_point2: Option<Point>,
    /// Older files store both control points as a pair.
    #[serde(default, skip_serializing)]
    pub control_points: Option<Vec<Option<Point>>>,
    #[serde(default)]
    pub control_point_center: Option<Point>,
    #[serde(default)]
    pub control_point_center_locked: bool,

    #[serde(default)]
    pub has_circles: [bool; 2],
    #[serde(default)]
    pub manual_circle_visibility: [Option<bool>; 2],
    #[serde(default)]
    pub start_line_visible: bool,
    #[serde(default = "yes")]
    pub end_line_visible: bool,
    #[serde(default)]
    pub start_extension_visible: bool,
    #[serde(default)]
    pub end_extension_visible: bool,
    #[serde(default)]
    pub start_arrow_visible: bool,
    #[serde(default)]
    pub end_arrow_visible: bool,
    #[serde(default)]
    pub full_arrow_visible: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub shadow_only: bool,
    #[serde(default)]
    pub shadow_color: Option<Rgba>,
    #[serde(default = "yes")]
    pub should_draw_shadow: bool,
    #[serde(default)]
    pub knot_connections: BTreeMap<End, KnotConnection>,
    #[serde(default)]
    pub closed_connections: [bool; 2],
    #[serde(default)]
    pub angle: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,

    #[serde(default, alias = "attached_to", skip_serializing_if = "Option::is_none")]
    pub parent_layer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_side: Option<SideRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_strand_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletion_rectangles: Vec<RectRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_center_point: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_center_point: Option<Point>,
}

impl StrandRecord {
    /// First and second control points, from either spelling.
    pub fn control_points(&self) -> (Option<Point>, Option<Point>) {
        let pair = self.control_points.as_deref().unwrap_or(&[]);
        (
            self.control_point1.or(pair.first().copied().flatten()),
            self.control_point2.or(pair.get(1).copied().flatten()),
        )
    }
}

/// The whole project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub strands: Vec<StrandRecord>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupRecord>,
    #[serde(default, alias = "selected_strand_name")]
    pub selected_strand: Option<String>,
    #[serde(default)]
    pub locked_layers: BTreeSet<usize>,
    #[serde(default)]
    pub lock_mode: bool,
    #[serde(default = "yes")]
    pub shadow_enabled: bool,
    #[serde(default)]
    pub show_control_points: bool,
}

impl Default for ProjectFile {
    fn default() -> Self {
        Self {
            strands: Vec::new(),
            groups: BTreeMap::new(),
            selected_strand: None,
            locked_layers: BTreeSet::new(),
            lock_mode: false,
            shadow_enabled: true,
            show_control_points: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_record_defaults() {
        let record: StrandRecord = serde_json::from_str(
            r#"{"type":"Strand","layer_name":"1_1","start":{"x":0,"y":0},"end":{"x":10,"y":0}}"#,
        )
        .unwrap();
        assert!(!record.start_line_visible);
        assert!(record.end_line_visible);
        assert!(record.should_draw_shadow);
        assert_eq!(record.width, DEFAULT_WIDTH);
        assert_eq!(record.color, Rgba::purple());
        assert_eq!(record.has_circles, [false, false]);
    }

    #[test]
    fn test_legacy_spellings() {
        let record: StrandRecord = serde_json::from_str(
            r#"{"type":"AttachedStrand","layer_name":"1_2","start":{"x":0,"y":0},"end":{"x":10,"y":0},
                "attached_to":"1_1","attachment_side":"end",
                "control_points":[{"x":1,"y":2},{"x":3,"y":4}],
                "knot_connections":{"end":{"connected_strand_name":"2_1","connected_end":"start"}}}"#,
        )
        .unwrap();
        assert_eq!(record.parent_layer_name.as_deref(), Some("1_1"));
        assert_eq!(record.attachment_side.and_then(SideRecord::end), Some(End::End));
        assert_eq!(record.control_points(), (Some(Point::new(1.0, 2.0)), Some(Point::new(3.0, 4.0))));
        assert_eq!(record.knot_connections[&End::End].connected_end, End::Start);
    }

    #[test]
    fn test_both_rect_forms() {
        let rects: Vec<RectRecord> = serde_json::from_str(
            r#"[{"top_left":[0,0],"top_right":[4,0],"bottom_left":[0,2],"bottom_right":[4,2]},
                {"x":1,"y":2,"width":3,"height":4,"offset_x":-5,"offset_y":6}]"#,
        )
        .unwrap();
        let RectRecord::Corners { top_right, .. } = rects[0] else {
            panic!("expected corner form");
        };
        assert_eq!(top_right, [4.0, 0.0]);
        let RectRecord::Xywh { width, offset_y, .. } = rects[1] else {
            panic!("expected xywh form");
        };
        assert_eq!((width, offset_y), (3.0, 6.0));
    }

    #[test]
    fn test_project_aliases_and_defaults() {
        let project: ProjectFile = serde_json::from_str(r#"{"selected_strand_name":"1_1","unknown":5}"#).unwrap();
        assert_eq!(project.selected_strand.as_deref(), Some("1_1"));
        assert!(project.shadow_enabled);
        assert!(project.strands.is_empty());
    }
}
