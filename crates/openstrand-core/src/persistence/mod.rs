//! Project files: the canvas as a single JSON document.

mod schema;

pub use schema::{
    ControlPointsRecord, GroupRecord, ProjectFile, RectRecord, SideRecord, StrandRecord, StrandType,
};

use crate::canvas::Canvas;
use crate::error::{StrandError, StrandResult};
use crate::geometry::{Spine, TANGENT_EPSILON};
use crate::group::{Group, GroupControlPoints};
use crate::mask::{DeletionRect, MaskData};
use crate::strand::{
    DEFAULT_MIN_LENGTH, End, Strand, StrandId, StrandKind, parse_layer_name, parse_masked_layer_name,
    validate_layer_name,
};
use kurbo::Point;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use uuid::Uuid;

impl From<&DeletionRect> for RectRecord {
    fn from(rect: &DeletionRect) -> Self {
        let xy = |p: Point| [p.x, p.y];
        RectRecord::Corners {
            top_left: xy(rect.top_left),
            top_right: xy(rect.top_right),
            bottom_left: xy(rect.bottom_left),
            bottom_right: xy(rect.bottom_right),
        }
    }
}

impl From<&RectRecord> for DeletionRect {
    fn from(record: &RectRecord) -> Self {
        let pt = |[x, y]: [f64; 2]| Point::new(x, y);
        match *record {
            RectRecord::Corners {
                top_left,
                top_right,
                bottom_left,
                bottom_right,
            } => DeletionRect {
                top_left: pt(top_left),
                top_right: pt(top_right),
                bottom_left: pt(bottom_left),
                bottom_right: pt(bottom_right),
            },
            RectRecord::Xywh { x, y, width, height, .. } => DeletionRect::from_xywh(x, y, width, height),
        }
    }
}

impl StrandRecord {
    /// Record a strand; `canvas` resolves parent and component names.
    pub fn from_strand(strand: &Strand, canvas: &Canvas, index: usize) -> Self {
        let core = &strand.core;
        let spine = &core.spine;
        let name_of = |id: StrandId| canvas.get(id).map(|s| s.layer_name().to_string());

        let (kind, parent_layer_name, attachment_side, min_length) = match strand.kind {
            StrandKind::Regular => (StrandType::Strand, None, None, None),
            StrandKind::Attached {
                parent,
                side,
                min_length,
            } => (
                StrandType::AttachedStrand,
                name_of(parent),
                Some(SideRecord::from(side)),
                Some(min_length),
            ),
            StrandKind::Masked(_) => (StrandType::MaskedStrand, None, None, None),
        };
        let mask = strand.mask();
        let masked = mask.is_some();
        let v = &core.visibility;

        Self {
            kind,
            index: Some(index),
            layer_name: core.layer_name.clone(),
            set_number: Some(core.set_number),
            start: spine.start,
            end: spine.end,
            width: core.width,
            stroke_width: core.stroke_width,
            color: core.color,
            stroke_color: core.stroke_color,
            circle_stroke_color: Some(core.circle_stroke_color),
            start_circle_stroke_color: core.start_circle_stroke_color,
            end_circle_stroke_color: core.end_circle_stroke_color,
            control_point1: (!masked).then_some(spine.cp1),
            control_point2: (!masked).then_some(spine.cp2),
            control_points: None,
            control_point_center: match mask {
                Some(m) => m.edited_center_point,
                None => spine.cp_center,
            },
            control_point_center_locked: !masked && spine.cp_center_locked,
            has_circles: core.has_circles,
            manual_circle_visibility: core.manual_circle_visibility,
            start_line_visible: v.start_line_visible,
            end_line_visible: v.end_line_visible,
            start_extension_visible: v.start_extension_visible,
            end_extension_visible: v.end_extension_visible,
            start_arrow_visible: v.start_arrow_visible,
            end_arrow_visible: v.end_arrow_visible,
            full_arrow_visible: v.full_arrow_visible,
            is_hidden: v.is_hidden,
            shadow_only: v.shadow_only,
            shadow_color: Some(core.shadow_color),
            should_draw_shadow: core.should_draw_shadow,
            knot_connections: core.knot_connections.clone(),
            closed_connections: core.closed_connections,
            angle: Some(core.angle),
            length: Some(core.length),
            parent_layer_name,
            attachment_side,
            min_length,
            component_strand_names: mask.and_then(|m| Some(vec![name_of(m.first)?, name_of(m.second)?])),
            deletion_rectangles: mask
                .map(|m| m.deletion_rects.iter().map(RectRecord::from).collect())
                .unwrap_or_default(),
            base_center_point: mask.and_then(|m| m.base_center_point),
            edited_center_point: mask.and_then(|m| m.edited_center_point),
        }
    }

    /// Component names of a masked record, falling back to the layer name.
    pub fn components(&self) -> Option<(String, String)> {
        match self.component_strand_names.as_deref() {
            Some([a, b, ..]) => Some((a.clone(), b.clone())),
            _ => parse_masked_layer_name(&self.layer_name),
        }
    }

    fn set_number_or_parsed(&self) -> i32 {
        self.set_number
            .or_else(|| parse_layer_name(&self.layer_name).map(|(set, _)| set))
            .or_else(|| {
                let (first, _) = parse_masked_layer_name(&self.layer_name)?;
                parse_layer_name(&first).map(|(set, _)| set)
            })
            .unwrap_or(0)
    }
}

/// Snapshot the canvas as a project document.
pub fn to_project(canvas: &Canvas) -> ProjectFile {
    for name in canvas.masks_without_intersection() {
        log::warn!("Masked strand {name} no longer intersects; saving it as is");
    }
    let strands = canvas
        .strands()
        .enumerate()
        .map(|(i, s)| StrandRecord::from_strand(s, canvas, i))
        .collect();
    let groups = canvas
        .groups()
        .iter()
        .map(|(name, group)| (name.clone(), group_record(group)))
        .collect();
    ProjectFile {
        strands,
        groups,
        selected_strand: canvas.selected_strand().map(|s| s.layer_name().to_string()),
        locked_layers: canvas.locked_layers.clone(),
        lock_mode: canvas.lock_mode,
        shadow_enabled: canvas.shadow_enabled,
        show_control_points: canvas.show_control_points,
    }
}

fn group_record(group: &Group) -> GroupRecord {
    GroupRecord {
        strands: group.layers.clone(),
        main_strands: group.main_strands.clone(),
        control_points: group
            .control_points
            .iter()
            .map(|(layer, cps)| {
                let record = ControlPointsRecord {
                    control_point1: Some(cps.cp1),
                    control_point2: Some(cps.cp2),
                    control_point_center: cps.cp_center,
                    control_point_center_locked: cps.cp_center_locked,
                };
                (layer.clone(), record)
            })
            .collect(),
        collapsed: group.collapsed,
    }
}

/// Serialize the canvas to pretty JSON.
pub fn to_json(canvas: &Canvas) -> StrandResult<String> {
    Ok(serde_json::to_string_pretty(&to_project(canvas))?)
}

/// Parse a project document.
pub fn from_json(json: &str) -> StrandResult<ProjectFile> {
    serde_json::from_str(json).map_err(|e| StrandError::PersistenceIo(format!("Failed to parse project: {e}")))
}

/// Write the canvas to `path`.
pub fn save(canvas: &Canvas, path: &Path) -> StrandResult<()> {
    let json = to_json(canvas)?;
    fs::write(path, json).map_err(|e| {
        log::error!("Failed to save project {}: {e}", path.display());
        StrandError::PersistenceIo(format!("Failed to write {}: {e}", path.display()))
    })?;
    log::info!("Saved {} strands to {}", canvas.len(), path.display());
    Ok(())
}

/// Replace the canvas with the project at `path`.
///
/// The canvas is left untouched when the file cannot be read or parsed.
pub fn load(canvas: &mut Canvas, path: &Path) -> StrandResult<()> {
    let json = fs::read_to_string(path).map_err(|e| {
        log::error!("Failed to read project {}: {e}", path.display());
        StrandError::PersistenceIo(format!("Failed to read {}: {e}", path.display()))
    })?;
    let project = from_json(&json)?;
    apply_project(canvas, &project)?;
    log::info!("Loaded {} strands from {}", canvas.len(), path.display());
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    id: StrandId,
    kind: StrandType,
}

/// Replace the canvas contents with `project`.
///
/// Names are validated before anything changes. Attached strands whose
/// parent cannot be found become regular strands, and masks over unknown
/// components are dropped; both are logged.
pub fn apply_project(canvas: &mut Canvas, project: &ProjectFile) -> StrandResult<()> {
    let mut slots: HashMap<&str, Slot> = HashMap::with_capacity(project.strands.len());
    for record in &project.strands {
        validate_layer_name(&record.layer_name, record.kind == StrandType::MaskedStrand)?;
        let slot = Slot {
            id: Uuid::new_v4(),
            kind: record.kind,
        };
        if slots.insert(record.layer_name.as_str(), slot).is_some() {
            return Err(StrandError::DuplicateLayerName(record.layer_name.clone()));
        }
    }

    let strands: Vec<Strand> = project.strands.iter().filter_map(|r| build_strand(r, &slots)).collect();

    canvas.begin_bulk_update();
    canvas.replace_strands(strands);
    canvas.groups = build_groups(canvas, &project.groups);
    canvas.locked_layers = project.locked_layers.clone();
    canvas.lock_mode = project.lock_mode;
    canvas.shadow_enabled = project.shadow_enabled;
    canvas.show_control_points = project.show_control_points;
    let selected = project.selected_strand.as_deref().and_then(|name| canvas.id_of(name));
    canvas.set_selected_silently(selected);
    canvas.end_bulk_update();
    Ok(())
}

fn build_strand(record: &StrandRecord, slots: &HashMap<&str, Slot>) -> Option<Strand> {
    let slot = slots.get(record.layer_name.as_str())?;
    let (cp1, cp2) = record.control_points();
    let spine = Spine {
        start: record.start,
        end: record.end,
        cp1: cp1.unwrap_or(record.start),
        cp2: cp2.unwrap_or(record.end),
        cp_center: record.control_point_center.or(Some(record.start.midpoint(record.end))),
        cp_center_locked: record.control_point_center_locked,
    };
    let mut strand = Strand::new(record.layer_name.clone(), record.set_number_or_parsed(), spine).with_id(slot.id);

    strand.kind = match record.kind {
        StrandType::Strand => StrandKind::Regular,
        StrandType::AttachedStrand => resolve_parent(record, slots),
        StrandType::MaskedStrand => StrandKind::Masked(Box::new(mask_data(record, slots)?)),
    };
    if strand.is_masked() {
        strand.core.spine.cp_center = None;
        strand.core.spine.cp_center_locked = false;
    }

    let core = &mut strand.core;
    core.width = record.width;
    core.stroke_width = record.stroke_width;
    core.color = record.color;
    core.stroke_color = record.stroke_color;
    if let Some(color) = record.circle_stroke_color {
        core.circle_stroke_color = color;
    }
    core.start_circle_stroke_color = record.start_circle_stroke_color;
    core.end_circle_stroke_color = record.end_circle_stroke_color;
    core.has_circles = record.has_circles;
    core.manual_circle_visibility = record.manual_circle_visibility;
    let v = &mut core.visibility;
    v.start_line_visible = record.start_line_visible;
    v.end_line_visible = record.end_line_visible;
    v.start_extension_visible = record.start_extension_visible;
    v.end_extension_visible = record.end_extension_visible;
    v.start_arrow_visible = record.start_arrow_visible;
    v.end_arrow_visible = record.end_arrow_visible;
    v.full_arrow_visible = record.full_arrow_visible;
    v.is_hidden = record.is_hidden;
    v.shadow_only = record.shadow_only;
    if let Some(color) = record.shadow_color {
        core.shadow_color = color;
    }
    core.should_draw_shadow = record.should_draw_shadow;
    core.knot_connections = record.knot_connections.clone();
    core.closed_connections = record.closed_connections;
    // A zero-length strand has no direction of its own.
    if let (Some(angle), true) = (record.angle, core.length <= TANGENT_EPSILON) {
        core.angle = angle;
    }
    strand.update_shape();
    Some(strand)
}

fn resolve_parent(record: &StrandRecord, slots: &HashMap<&str, Slot>) -> StrandKind {
    let parent = record
        .parent_layer_name
        .as_deref()
        .and_then(|name| slots.get(name))
        .filter(|slot| slot.kind != StrandType::MaskedStrand);
    match parent {
        Some(parent) => StrandKind::Attached {
            parent: parent.id,
            side: record.attachment_side.and_then(SideRecord::end).unwrap_or(End::End),
            min_length: record.min_length.unwrap_or(DEFAULT_MIN_LENGTH),
        },
        None => {
            log::warn!(
                "Parent {:?} of {} not found; loading it as a regular strand",
                record.parent_layer_name,
                record.layer_name
            );
            StrandKind::Regular
        }
    }
}

fn mask_data(record: &StrandRecord, slots: &HashMap<&str, Slot>) -> Option<MaskData> {
    let component = |name: &str| slots.get(name).filter(|s| s.kind != StrandType::MaskedStrand).map(|s| s.id);
    let resolved = record
        .components()
        .and_then(|(a, b)| Some((component(&a)?, component(&b)?)))
        .filter(|(a, b)| a != b);
    let Some((first, second)) = resolved else {
        log::warn!("Dropping masked strand {}: unknown components", record.layer_name);
        return None;
    };
    let mut data = MaskData::pending(first, second);
    data.deletion_rects = record.deletion_rectangles.iter().map(DeletionRect::from).collect();
    data.base_center_point = record.base_center_point;
    data.edited_center_point = record.edited_center_point.or(record.control_point_center);
    Some(data)
}

fn build_groups(canvas: &Canvas, records: &BTreeMap<String, GroupRecord>) -> BTreeMap<String, Group> {
    let mut groups = BTreeMap::new();
    for (name, record) in records {
        let mut group = Group::new(name.clone());
        for layer in &record.strands {
            let Some(strand) = canvas.by_name(layer) else {
                log::warn!("Group {name} refers to unknown layer {layer}");
                continue;
            };
            group.add_layer(layer);
            let cps = match record.control_points.get(layer) {
                Some(ControlPointsRecord {
                    control_point1: Some(cp1),
                    control_point2: Some(cp2),
                    control_point_center,
                    control_point_center_locked,
                }) => GroupControlPoints {
                    cp1: *cp1,
                    cp2: *cp2,
                    cp_center: *control_point_center,
                    cp_center_locked: *control_point_center_locked,
                },
                _ => GroupControlPoints::from(&strand.core.spine),
            };
            group.control_points.insert(layer.clone(), cps);
        }
        if !record.main_strands.is_empty() {
            group.main_strands = record.main_strands.clone();
        }
        group.collapsed = record.collapsed;
        groups.insert(name.clone(), group);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::undo::states_identical;
    use kurbo::{Shape, Vec2};
    use tempfile::tempdir;

    fn sample_canvas() -> Canvas {
        let mut canvas = Canvas::new();
        let main = canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        let child = canvas.attach_child(main, End::End).unwrap();
        canvas.get_mut(child).unwrap().update(Point::new(200.0, 0.0), true);
        let cross = canvas.create_new_strand(Some(2), Point::new(150.0, -60.0), Point::new(150.0, 60.0)).unwrap();
        {
            let strand = canvas.get_mut(cross).unwrap();
            strand.core.spine.cp1 = Point::new(180.0, -20.0);
            strand.core.visibility.end_arrow_visible = true;
            strand.core.manual_circle_visibility = [Some(true), None];
        }
        canvas.finish_mutation();
        let mask = canvas.create_mask(child, cross).unwrap();
        canvas
            .add_deletion_rect(mask, DeletionRect::from_drag(Point::new(145.0, -5.0), Point::new(155.0, 5.0)))
            .unwrap();
        canvas.create_group("g", &["1_1", "1_2"]).unwrap();
        canvas.shadow_enabled = false;
        canvas.select(Some(cross));
        canvas
    }

    #[test]
    fn test_save_load_is_identity() {
        let canvas = sample_canvas();
        let dir = tempdir().unwrap();
        let path = dir.path().join("project.json");
        save(&canvas, &path).unwrap();

        let mut loaded = Canvas::new();
        load(&mut loaded, &path).unwrap();
        assert!(states_identical(&to_project(&canvas), &to_project(&loaded)));
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.selected_strand().map(|s| s.layer_name()), Some("2_1"));
        assert!(!loaded.shadow_enabled);

        let main = loaded.id_of("1_1").unwrap();
        let child = loaded.id_of("1_2").unwrap();
        assert_eq!(loaded.get(main).unwrap().core.attached_strands, vec![child]);
        let mask = loaded.by_name("1_2_2_1").unwrap().mask().unwrap();
        assert_eq!(mask.deletion_rects.len(), 1);
        assert!(!mask.mask_region().to_path().contains(Point::new(150.0, 0.0)));
        assert!(loaded.group("g").is_ok());
    }

    #[test]
    fn test_forward_parent_reference_and_missing_parent() {
        let json = r#"{"strands":[
            {"type":"AttachedStrand","layer_name":"1_2","start":{"x":100,"y":0},"end":{"x":200,"y":0},
             "parent_layer_name":"1_1","attachment_side":1},
            {"type":"Strand","layer_name":"1_1","start":{"x":0,"y":0},"end":{"x":100,"y":0}},
            {"type":"AttachedStrand","layer_name":"3_2","start":{"x":0,"y":50},"end":{"x":10,"y":50},
             "attached_to":"3_1"}
        ]}"#;
        let mut canvas = Canvas::new();
        apply_project(&mut canvas, &from_json(json).unwrap()).unwrap();
        let child = canvas.by_name("1_2").unwrap();
        assert_eq!(child.parent(), Some((canvas.id_of("1_1").unwrap(), End::End)));
        assert!(!canvas.by_name("3_2").unwrap().is_attached());
        assert_eq!(canvas.by_name("1_1").unwrap().core.attached_strands.len(), 1);
    }

    #[test]
    fn test_xywh_rect_loads_as_quad() {
        let json = r#"{"strands":[
            {"type":"Strand","layer_name":"1_1","start":{"x":0,"y":0},"end":{"x":100,"y":0},"width":20},
            {"type":"Strand","layer_name":"2_1","start":{"x":50,"y":-50},"end":{"x":50,"y":50},"width":20},
            {"type":"MaskedStrand","layer_name":"1_1_2_1","start":{"x":0,"y":0},"end":{"x":100,"y":0},
             "deletion_rectangles":[{"x":45,"y":-5,"width":10,"height":10,"offset_x":-5,"offset_y":-5}]}
        ]}"#;
        let mut canvas = Canvas::new();
        apply_project(&mut canvas, &from_json(json).unwrap()).unwrap();
        let mask = canvas.by_name("1_1_2_1").unwrap().mask().unwrap();
        assert_eq!(mask.deletion_rects[0].top_left, Point::new(45.0, -5.0));
        assert_eq!(mask.deletion_rects[0].bottom_right, Point::new(55.0, 5.0));
        assert!(!mask.mask_region().to_path().contains(Point::new(50.0, 0.0)));
        assert!(mask.mask_region().to_path().contains(Point::new(43.0, 0.0)));
    }

    #[test]
    fn test_invalid_project_leaves_canvas_untouched() {
        let mut canvas = sample_canvas();
        let before = to_project(&canvas);
        let json = r#"{"strands":[
            {"type":"Strand","layer_name":"1_1","start":{"x":0,"y":0},"end":{"x":1,"y":0}},
            {"type":"Strand","layer_name":"1_1","start":{"x":0,"y":0},"end":{"x":1,"y":0}}
        ]}"#;
        let result = apply_project(&mut canvas, &from_json(json).unwrap());
        assert!(matches!(result, Err(StrandError::DuplicateLayerName(_))));
        assert!(from_json("{not json").is_err());
        assert!(states_identical(&before, &to_project(&canvas)));
    }

    #[test]
    fn test_missing_file_is_persistence_error() {
        let dir = tempdir().unwrap();
        let mut canvas = Canvas::new();
        let result = load(&mut canvas, &dir.path().join("nope.json"));
        assert!(matches!(result, Err(StrandError::PersistenceIo(_))));
    }

    #[test]
    fn test_moved_component_saves_moved_rects() {
        let mut canvas = sample_canvas();
        let cross = canvas.id_of("2_1").unwrap();
        canvas.translate_strand(cross, Vec2::new(0.0, 10.0));
        let project = to_project(&canvas);
        let mask = project.strands.iter().find(|s| s.kind == StrandType::MaskedStrand).unwrap();
        assert_eq!(mask.component_strand_names, Some(vec!["1_2".to_string(), "2_1".to_string()]));
        let RectRecord::Corners { top_left, .. } = mask.deletion_rectangles[0] else {
            panic!("rectangles are saved as corners");
        };
        assert!((top_left[1] - 5.0).abs() < 1e-9);
    }
}
