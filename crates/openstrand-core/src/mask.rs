//! Masked strand composition: intersections of two stroked bodies minus
//! user-drawn deletion rectangles.

use crate::canvas::Canvas;
use crate::error::{StrandError, StrandResult};
use crate::events::CanvasEvent;
use crate::geometry::{Region, RegionOps};
use crate::strand::{Strand, StrandId};
use kurbo::{Affine, Point, Rect, Vec2};

/// A quad erased from a masked strand, in canvas coordinates.
///
/// Corners are kept individually so the quad stays exact under rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeletionRect {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl DeletionRect {
    /// Axis-aligned quad spanned by two drag corners.
    pub fn from_drag(a: Point, b: Point) -> Self {
        Self::from_rect(Rect::from_points(a, b))
    }

    /// Axis-aligned quad from a rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            top_left: Point::new(rect.x0, rect.y0),
            top_right: Point::new(rect.x1, rect.y0),
            bottom_left: Point::new(rect.x0, rect.y1),
            bottom_right: Point::new(rect.x1, rect.y1),
        }
    }

    /// Quad from the `x, y, width, height` record form (x, y is the top-left corner).
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_rect(Rect::new(x, y, x + width, y + height))
    }

    /// Corners in drawing order around the quad.
    pub fn polygon(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Corners in record order: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_left, self.bottom_right]
    }

    pub fn bounding_rect(&self) -> Rect {
        let [a, b, c, d] = self.corners();
        Rect::from_points(a, b).union(Rect::from_points(c, d))
    }

    pub fn region(&self) -> Region {
        Region::from_quad(self.polygon())
    }

    /// Transform each corner.
    pub fn transform(&mut self, affine: Affine) {
        self.top_left = affine * self.top_left;
        self.top_right = affine * self.top_right;
        self.bottom_left = affine * self.bottom_left;
        self.bottom_right = affine * self.bottom_right;
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.transform(Affine::translate(delta));
    }
}

/// Variant data of a masked strand.
#[derive(Debug, Clone)]
pub struct MaskData {
    pub first: StrandId,
    pub second: StrandId,
    pub deletion_rects: Vec<DeletionRect>,
    /// Intersection minus deletion rectangles, once the mask has been edited.
    pub custom_mask: Option<Region>,
    pub base_center_point: Option<Point>,
    pub edited_center_point: Option<Point>,
    base_region: Region,
    mask_region: Region,
}

impl MaskData {
    /// Intersect the stroked bodies of `first` and `second`.
    ///
    /// Fails with [`StrandError::MaskEmptyIntersection`] when they do not overlap.
    pub fn create(first: &Strand, second: &Strand, ops: &dyn RegionOps) -> StrandResult<Self> {
        let base = intersection(first, second, ops);
        if ops.is_empty(&base) {
            return Err(StrandError::MaskEmptyIntersection {
                first: first.layer_name().to_string(),
                second: second.layer_name().to_string(),
            });
        }
        let center = base.bounds_center();
        Ok(Self {
            first: first.id(),
            second: second.id(),
            deletion_rects: Vec::new(),
            custom_mask: None,
            base_center_point: center,
            edited_center_point: center,
            mask_region: base.clone(),
            base_region: base,
        })
    }

    /// Mask data that has not been computed yet. Call [`MaskData::recompute`]
    /// once both components are in place.
    pub fn pending(first: StrandId, second: StrandId) -> Self {
        Self {
            first,
            second,
            deletion_rects: Vec::new(),
            custom_mask: None,
            base_center_point: None,
            edited_center_point: None,
            base_region: Region::empty(),
            mask_region: Region::empty(),
        }
    }

    /// The raw intersection of both bodies.
    pub fn base_region(&self) -> &Region {
        &self.base_region
    }

    /// The visible region: the intersection minus every deletion rectangle.
    pub fn mask_region(&self) -> &Region {
        &self.mask_region
    }

    /// Whether the component bodies still overlap.
    pub fn has_intersection(&self, ops: &dyn RegionOps) -> bool {
        !ops.is_empty(&self.base_region)
    }

    /// Rebuild the intersection from fresh component geometry and reapply
    /// the (already transformed) deletion rectangles.
    pub fn recompute(&mut self, first: &Strand, second: &Strand, ops: &dyn RegionOps) {
        self.base_region = intersection(first, second, ops);
        self.base_center_point = self.base_region.bounds_center().or(self.base_center_point);
        self.apply_rects(ops);
    }

    fn apply_rects(&mut self, ops: &dyn RegionOps) {
        if self.deletion_rects.is_empty() {
            self.custom_mask = None;
            self.mask_region = self.base_region.clone();
            self.edited_center_point = self.base_center_point;
            return;
        }
        let erased = self
            .deletion_rects
            .iter()
            .fold(Region::empty(), |acc, rect| ops.union(&acc, &rect.region()));
        let masked = ops.subtract(&self.base_region, &erased);
        self.edited_center_point = masked.bounds_center().or(self.base_center_point);
        self.custom_mask = Some(masked.clone());
        self.mask_region = masked;
    }

    /// Erase `rect` from the visible region.
    pub fn add_deletion_rect(&mut self, rect: DeletionRect, ops: &dyn RegionOps) {
        let current = self.custom_mask.as_ref().unwrap_or(&self.base_region);
        let masked = ops.subtract(current, &rect.region());
        self.deletion_rects.push(rect);
        self.edited_center_point = masked.bounds_center().or(self.base_center_point);
        self.custom_mask = Some(masked.clone());
        self.mask_region = masked;
    }

    /// Drop all deletion rectangles.
    pub fn reset(&mut self) {
        self.deletion_rects.clear();
        self.custom_mask = None;
        self.mask_region = self.base_region.clone();
        self.edited_center_point = self.base_center_point;
    }

    /// Transform every deletion rectangle corner by corner.
    pub fn transform_rects(&mut self, affine: Affine) {
        for rect in &mut self.deletion_rects {
            rect.transform(affine);
        }
    }
}

impl Canvas {
    /// Create a masked strand over `first` and `second`.
    ///
    /// Fails without touching the canvas when the pair is invalid, already
    /// masked, or the bodies do not overlap.
    pub fn create_mask(&mut self, first: StrandId, second: StrandId) -> StrandResult<StrandId> {
        let (Some(a), Some(b)) = (self.get(first), self.get(second)) else {
            return Err(StrandError::InvalidLayerName(format!("{first}/{second}")));
        };
        if first == second || a.is_masked() || b.is_masked() {
            return Err(StrandError::InvalidLayerName(a.layer_name().to_string()));
        }
        if self.has_mask(first, second) {
            return Err(StrandError::DuplicateLayerName(crate::strand::masked_layer_name(
                a.layer_name(),
                b.layer_name(),
            )));
        }
        let data = MaskData::create(a, b, self.region_ops()).inspect_err(|e| log::debug!("{e}"))?;
        let masked = Strand::masked(a, b, data);
        let names = (a.layer_name().to_string(), b.layer_name().to_string());
        let id = self.add_strand(masked)?;
        log::info!("Created mask {}_{}", names.0, names.1);
        self.events.emit(CanvasEvent::MaskCreated {
            first: names.0,
            second: names.1,
        });
        self.finish_mutation();
        Ok(id)
    }

    /// Erase a rectangle from a masked strand.
    pub fn add_deletion_rect(&mut self, mask: StrandId, rect: DeletionRect) -> StrandResult<()> {
        self.with_mask_data(mask, |data, ops| data.add_deletion_rect(rect, ops))
            .ok_or_else(|| StrandError::InvalidLayerName(mask.to_string()))?;
        self.finish_mutation();
        Ok(())
    }

    /// Remove every deletion rectangle of a masked strand.
    pub fn reset_mask(&mut self, mask: StrandId) -> StrandResult<()> {
        let strand = self.get_mut(mask).ok_or_else(|| StrandError::InvalidLayerName(mask.to_string()))?;
        let name = strand.layer_name().to_string();
        strand.mask_mut().ok_or(StrandError::InvalidLayerName(name))?.reset();
        self.finish_mutation();
        Ok(())
    }
}

fn intersection(first: &Strand, second: &Strand, ops: &dyn RegionOps) -> Region {
    let a = ops.from_path(&first.stroked_body());
    let b = ops.from_path(&second.stroked_body());
    ops.intersect(&a, &b)
}
