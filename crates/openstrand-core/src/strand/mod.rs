//! Strand definitions: the shared core and the regular/attached/masked variants.

mod naming;
mod outline;

pub use naming::{masked_layer_name, parse_layer_name, parse_masked_layer_name, validate_layer_name};
pub use outline::Outline;

use crate::geometry::{self, Spine};
use crate::mask::MaskData;
use kurbo::{Affine, BezPath, Point, Rect, Shape as _, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for strands.
pub type StrandId = Uuid;

/// Default ribbon width for new strands.
pub const DEFAULT_WIDTH: f64 = 46.0;
/// Default outline width for new strands.
pub const DEFAULT_STROKE_WIDTH: f64 = 4.0;
/// Minimum length of an attached strand while it is being dragged.
pub const DEFAULT_MIN_LENGTH: f64 = 40.0;

/// RGBA8 color as stored in project files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn purple() -> Self {
        Self::new(128, 0, 128, 255)
    }

    pub const fn default_shadow() -> Self {
        Self::new(0, 0, 0, 150)
    }

    /// Same color with a different alpha.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::purple()
    }
}

impl From<Rgba> for Color {
    fn from(c: Rgba) -> Self {
        Color::from_rgba8(c.r, c.g, c.b, c.a)
    }
}

impl From<Color> for Rgba {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

/// One of the two ends of a strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum End {
    Start,
    End,
}

impl End {
    pub const BOTH: [End; 2] = [End::Start, End::End];

    /// Index into two-element per-end arrays.
    pub fn index(self) -> usize {
        match self {
            End::Start => 0,
            End::End => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(End::Start),
            1 => Some(End::End),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            End::Start => End::End,
            End::End => End::Start,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            End::Start => "start",
            End::End => "end",
        }
    }
}

/// A draggable point of a strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Start,
    End,
    Cp1,
    Cp2,
    CpCenter,
}

impl Handle {
    pub fn from_end(end: End) -> Self {
        match end {
            End::Start => Handle::Start,
            End::End => Handle::End,
        }
    }

    /// The endpoint this handle stands for, if it is one.
    pub fn as_end(self) -> Option<End> {
        match self {
            Handle::Start => Some(End::Start),
            Handle::End => Some(End::End),
            _ => None,
        }
    }

    /// Position of the handle on `spine`.
    pub fn point(self, spine: &Spine) -> Option<Point> {
        match self {
            Handle::Start => Some(spine.start),
            Handle::End => Some(spine.end),
            Handle::Cp1 => Some(spine.cp1),
            Handle::Cp2 => Some(spine.cp2),
            Handle::CpCenter => spine.cp_center,
        }
    }
}

/// Knot metadata for one end of a strand. Carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnotConnection {
    pub connected_strand_name: String,
    pub connected_end: End,
    #[serde(default)]
    pub is_closing_strand: bool,
}

/// Visibility and decoration flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub start_line_visible: bool,
    pub end_line_visible: bool,
    pub start_extension_visible: bool,
    pub end_extension_visible: bool,
    pub start_arrow_visible: bool,
    pub end_arrow_visible: bool,
    pub full_arrow_visible: bool,
    pub is_hidden: bool,
    pub shadow_only: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            start_line_visible: true,
            end_line_visible: true,
            start_extension_visible: false,
            end_extension_visible: false,
            start_arrow_visible: false,
            end_arrow_visible: false,
            full_arrow_visible: false,
            is_hidden: false,
            shadow_only: false,
        }
    }
}

impl Visibility {
    pub fn line_visible(&self, end: End) -> bool {
        match end {
            End::Start => self.start_line_visible,
            End::End => self.end_line_visible,
        }
    }

    pub fn extension_visible(&self, end: End) -> bool {
        match end {
            End::Start => self.start_extension_visible,
            End::End => self.end_extension_visible,
        }
    }

    pub fn arrow_visible(&self, end: End) -> bool {
        match end {
            End::Start => self.start_arrow_visible,
            End::End => self.end_arrow_visible,
        }
    }
}

/// Geometry, style and flags shared by every strand variant.
#[derive(Debug, Clone)]
pub struct StrandCore {
    pub layer_name: String,
    pub set_number: i32,
    pub spine: Spine,
    pub width: f64,
    pub stroke_width: f64,
    pub color: Rgba,
    pub stroke_color: Rgba,
    pub circle_stroke_color: Rgba,
    pub start_circle_stroke_color: Option<Rgba>,
    pub end_circle_stroke_color: Option<Rgba>,
    pub has_circles: [bool; 2],
    pub manual_circle_visibility: [Option<bool>; 2],
    pub attached_strands: Vec<StrandId>,
    pub visibility: Visibility,
    pub shadow_color: Rgba,
    pub should_draw_shadow: bool,
    pub knot_connections: BTreeMap<End, KnotConnection>,
    pub closed_connections: [bool; 2],
    /// Direction from start to end, in degrees.
    pub angle: f64,
    /// Distance from start to end.
    pub length: f64,
    /// Set while the user is actively dragging this strand.
    pub dragging: bool,
    outline: Outline,
}

impl StrandCore {
    fn new(layer_name: String, set_number: i32, spine: Spine) -> Self {
        let mut core = Self {
            layer_name,
            set_number,
            spine,
            width: DEFAULT_WIDTH,
            stroke_width: DEFAULT_STROKE_WIDTH,
            color: Rgba::purple(),
            stroke_color: Rgba::black(),
            circle_stroke_color: Rgba::black(),
            start_circle_stroke_color: None,
            end_circle_stroke_color: None,
            has_circles: [false, false],
            manual_circle_visibility: [None, None],
            attached_strands: Vec::new(),
            visibility: Visibility::default(),
            shadow_color: Rgba::default_shadow(),
            should_draw_shadow: true,
            knot_connections: BTreeMap::new(),
            closed_connections: [false, false],
            angle: 0.0,
            length: 0.0,
            dragging: false,
            outline: Outline::default(),
        };
        core.sync_polar();
        core
    }

    /// Recompute `angle` and `length` from the endpoints.
    pub fn sync_polar(&mut self) {
        let chord = self.spine.end - self.spine.start;
        self.length = chord.length();
        if self.length > geometry::TANGENT_EPSILON {
            self.angle = chord.y.atan2(chord.x).to_degrees();
        }
    }

    /// Disc stroke color for one end.
    pub fn circle_stroke_for(&self, end: End) -> Rgba {
        let specific = match end {
            End::Start => self.start_circle_stroke_color,
            End::End => self.end_circle_stroke_color,
        };
        specific.unwrap_or(self.circle_stroke_color)
    }
}

/// Variant-specific data.
#[derive(Debug, Clone)]
pub enum StrandKind {
    /// A free-standing strand.
    Regular,
    /// A strand whose start is bound to an endpoint of `parent`.
    Attached {
        parent: StrandId,
        side: End,
        min_length: f64,
    },
    /// The visible intersection of two other strands.
    Masked(Box<MaskData>),
}

/// A strand on the canvas.
#[derive(Debug, Clone)]
pub struct Strand {
    pub(crate) id: StrandId,
    pub core: StrandCore,
    pub kind: StrandKind,
}

impl Strand {
    /// Create a regular strand.
    pub fn new(layer_name: impl Into<String>, set_number: i32, spine: Spine) -> Self {
        let mut strand = Self {
            id: Uuid::new_v4(),
            core: StrandCore::new(layer_name.into(), set_number, spine),
            kind: StrandKind::Regular,
        };
        strand.update_shape();
        strand
    }

    /// Create a straight regular strand.
    pub fn straight(layer_name: impl Into<String>, set_number: i32, start: Point, end: Point) -> Self {
        Self::new(layer_name, set_number, Spine::straight(start, end))
    }

    /// Create a zero-length child bound to `side` of `parent`.
    ///
    /// The child inherits width, colors and set; it shows a disc at its start only.
    pub fn attached_to(layer_name: impl Into<String>, parent: &Strand, side: End) -> Self {
        let anchor = parent.endpoint(side);
        let mut strand = Self::new(layer_name, parent.core.set_number, Spine::straight(anchor, anchor));
        strand.core.width = parent.core.width;
        strand.core.stroke_width = parent.core.stroke_width;
        strand.core.color = parent.core.color;
        strand.core.stroke_color = parent.core.stroke_color;
        strand.core.circle_stroke_color = parent.core.circle_stroke_color;
        strand.core.shadow_color = parent.core.shadow_color;
        strand.core.has_circles = [true, false];
        strand.kind = StrandKind::Attached {
            parent: parent.id,
            side,
            min_length: DEFAULT_MIN_LENGTH,
        };
        strand.update_shape();
        strand
    }

    /// Create a masked strand over `first` and `second`.
    pub fn masked(first: &Strand, second: &Strand, mask: MaskData) -> Self {
        let name = masked_layer_name(&first.core.layer_name, &second.core.layer_name);
        let mut strand = Self::new(name, first.core.set_number, first.core.spine);
        strand.core.width = first.core.width;
        strand.core.stroke_width = first.core.stroke_width;
        strand.core.color = first.core.color;
        strand.core.stroke_color = first.core.stroke_color;
        strand.core.shadow_color = first.core.shadow_color;
        strand.core.has_circles = [false, false];
        strand.kind = StrandKind::Masked(Box::new(mask));
        strand
    }

    /// Rebuild a strand with a known id (used when loading).
    pub(crate) fn with_id(mut self, id: StrandId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> StrandId {
        self.id
    }

    pub fn layer_name(&self) -> &str {
        &self.core.layer_name
    }

    pub fn set_number(&self) -> i32 {
        self.core.set_number
    }

    pub fn spine(&self) -> &Spine {
        &self.core.spine
    }

    pub fn is_masked(&self) -> bool {
        matches!(self.kind, StrandKind::Masked(_))
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.kind, StrandKind::Attached { .. })
    }

    /// A main strand has intra-set index 1.
    pub fn is_main_strand(&self) -> bool {
        !self.is_masked()
            && parse_layer_name(&self.core.layer_name).map(|(_, k)| k == 1).unwrap_or(false)
    }

    /// Parent id and attachment side, for attached strands.
    pub fn parent(&self) -> Option<(StrandId, End)> {
        match self.kind {
            StrandKind::Attached { parent, side, .. } => Some((parent, side)),
            _ => None,
        }
    }

    /// Minimum drag length, for attached strands.
    pub fn min_length(&self) -> Option<f64> {
        match self.kind {
            StrandKind::Attached { min_length, .. } => Some(min_length),
            _ => None,
        }
    }

    pub fn mask(&self) -> Option<&MaskData> {
        match &self.kind {
            StrandKind::Masked(mask) => Some(mask),
            _ => None,
        }
    }

    pub fn mask_mut(&mut self) -> Option<&mut MaskData> {
        match &mut self.kind {
            StrandKind::Masked(mask) => Some(mask),
            _ => None,
        }
    }

    /// Component ids of a masked strand.
    pub fn mask_components(&self) -> Option<(StrandId, StrandId)> {
        self.mask().map(|m| (m.first, m.second))
    }

    pub fn endpoint(&self, end: End) -> Point {
        match end {
            End::Start => self.core.spine.start,
            End::End => self.core.spine.end,
        }
    }

    /// Move one endpoint.
    ///
    /// Control points sitting exactly on the old endpoint move with it, so a
    /// straight strand stays straight.
    pub fn set_endpoint(&mut self, end: End, point: Point) {
        let spine = &mut self.core.spine;
        let old = match end {
            End::Start => spine.start,
            End::End => spine.end,
        };
        if spine.cp1 == old {
            spine.cp1 = point;
        }
        if spine.cp2 == old {
            spine.cp2 = point;
        }
        match end {
            End::Start => spine.start = point,
            End::End => spine.end = point,
        }
        self.core.sync_polar();
        self.update_shape();
    }

    /// Translate the whole strand.
    pub fn translate(&mut self, delta: Vec2) {
        self.transform(Affine::translate(delta));
    }

    /// Apply an affine transform to the spine (and deletion rectangles of masks).
    pub fn transform(&mut self, affine: Affine) {
        self.core.spine.transform(affine);
        if let Some(mask) = self.mask_mut() {
            mask.transform_rects(affine);
        }
        self.core.sync_polar();
        self.update_shape();
    }

    /// Set the end point.
    ///
    /// With `reset_cps` the curve becomes straight again and the center lock
    /// is cleared. The minimum length of attached strands is only enforced
    /// while `dragging` is set; programmatic updates may produce shorter
    /// strands on purpose.
    pub fn update(&mut self, end: Point, reset_cps: bool) {
        let start = self.core.spine.start;
        let end = self.constrain_drag(End::End, end);
        if reset_cps {
            self.core.spine = Spine::straight(start, end);
        } else {
            self.core.spine.end = end;
        }
        self.core.sync_polar();
        self.update_shape();
    }

    /// Clamp a drag target for the end of an attached strand to its minimum length.
    pub fn constrain_drag(&self, end: End, target: Point) -> Point {
        let (Some(min_length), End::End, true) = (self.min_length(), end, self.core.dragging) else {
            return target;
        };
        let start = self.core.spine.start;
        let chord = target - start;
        let length = chord.length();
        if length >= min_length {
            return target;
        }
        let direction = if length > geometry::TANGENT_EPSILON {
            chord / length
        } else {
            Vec2::from_angle(self.core.angle.to_radians())
        };
        start + direction * min_length
    }

    /// Recompute `end` from the stored polar `angle` and `length`.
    pub fn update_end(&mut self) {
        let direction = Vec2::from_angle(self.core.angle.to_radians());
        let end = self.core.spine.start + direction * self.core.length;
        let old_end = self.core.spine.end;
        if self.core.spine.cp2 == old_end {
            self.core.spine.cp2 = end;
        }
        self.core.spine.end = end;
        self.update_shape();
    }

    /// Set the fill color; the outline alpha follows the fill alpha.
    pub fn set_color(&mut self, color: Rgba) {
        self.core.color = color;
        self.core.stroke_color = self.core.stroke_color.with_alpha(color.a);
    }

    /// Recompute the corner points and side lines.
    pub fn update_shape(&mut self) {
        self.core.outline = Outline::compute(&self.core.spine, self.core.width, self.core.stroke_width);
    }

    pub fn outline(&self) -> &Outline {
        &self.core.outline
    }

    /// Outer body (width plus both outlines).
    pub fn stroked_body(&self) -> BezPath {
        geometry::stroked_body(&self.core.spine, self.core.width, self.core.stroke_width)
    }

    /// Inner body painted with the strand color.
    pub fn fill_body(&self) -> BezPath {
        geometry::fill_body(&self.core.spine, self.core.width)
    }

    /// Bounding box of the body and side lines.
    pub fn bounds(&self) -> Rect {
        if let Some(bounds) = self.mask().and_then(|m| m.mask_region().bounds()) {
            return bounds;
        }
        self.stroked_body().bounding_box().union(self.core.outline.bounds())
    }

    /// Whether `point` lies in the start hit box.
    pub fn hit_start(&self, point: Point) -> bool {
        geometry::start_selection_rect(self.core.spine.start).contains(point)
    }

    /// Whether `point` lies in the end hit disc.
    pub fn hit_end(&self, point: Point) -> bool {
        geometry::end_selection_contains(self.core.spine.end, self.core.width, point)
    }

    /// Whether `point` lies on the strand body.
    pub fn body_contains(&self, point: Point) -> bool {
        match self.mask() {
            Some(mask) => mask.mask_region().to_path().contains(point),
            None => self.stroked_body().contains(point),
        }
    }
}
