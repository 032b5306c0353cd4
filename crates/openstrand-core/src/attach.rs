//! Attachment graph: binding children to parent endpoints and moving
//! coincident endpoints together.

use crate::canvas::Canvas;
use crate::error::{StrandError, StrandResult};
use crate::geometry::points_coincide;
use crate::strand::{End, Handle, Strand, StrandId};
use kurbo::{Point, Vec2};

/// Attach radius as a multiple of the strand width.
pub const ATTACH_RADIUS_FACTOR: f64 = 1.1;

impl Canvas {
    /// Endpoints of `id` that can take a new child.
    ///
    /// The start of an attached strand is bound to its parent; every other
    /// endpoint is free until a child is attached there.
    pub fn free_endpoints(&self, id: StrandId) -> Vec<End> {
        let Some(strand) = self.get(id) else {
            return Vec::new();
        };
        if strand.is_masked() {
            return Vec::new();
        }
        End::BOTH
            .into_iter()
            .filter(|&end| !(strand.is_attached() && end == End::Start))
            .filter(|&end| {
                !strand
                    .core
                    .attached_strands
                    .iter()
                    .filter_map(|c| self.get(*c))
                    .any(|c| c.parent().map(|(_, side)| side) == Some(end))
            })
            .collect()
    }

    /// Find a free endpoint near `point` on the selected strand or one of its
    /// descendants. Without a selection every strand is searched, front to back.
    pub fn find_attach_target(&self, point: Point) -> Option<(StrandId, End)> {
        let candidates: Vec<StrandId> = match self.selected() {
            Some(selected) => {
                let mut ids = vec![selected];
                ids.extend(self.descendants(selected));
                ids
            }
            None => self.strand_ids().iter().rev().copied().collect(),
        };
        candidates.into_iter().find_map(|id| {
            let strand = self.get(id)?;
            if !self.is_editable(id) {
                return None;
            }
            let radius = strand.core.width * ATTACH_RADIUS_FACTOR;
            self.free_endpoints(id)
                .into_iter()
                .find(|&end| strand.endpoint(end).distance(point) <= radius)
                .map(|end| (id, end))
        })
    }

    /// Create a zero-length child bound to `side` of `parent`.
    pub fn attach_child(&mut self, parent: StrandId, side: End) -> StrandResult<StrandId> {
        if !self.free_endpoints(parent).contains(&side) {
            return Err(StrandError::AttachNoTargetEndpoint);
        }
        let parent_strand = self.get(parent).ok_or(StrandError::AttachNoTargetEndpoint)?;
        let set = parent_strand.set_number();
        let name = format!("{set}_{}", self.next_index_in_set(set));
        let child = Strand::attached_to(name, parent_strand, side);
        let id = self.add_strand(child)?;
        log::debug!("Attached new child at {} of {parent}", side.as_str());
        self.finish_mutation();
        Ok(id)
    }

    /// Every non-masked endpoint within the endpoint epsilon of `point`.
    pub fn endpoints_near(&self, point: Point) -> Vec<(StrandId, End, Point)> {
        self.strands()
            .filter(|s| !s.is_masked())
            .flat_map(|s| End::BOTH.into_iter().map(move |end| (s.id(), end, s.endpoint(end))))
            .filter(|(_, _, p)| points_coincide(*p, point))
            .collect()
    }

    /// Move one endpoint of `id` to `target`.
    ///
    /// Every endpoint coincident with the old position moves by the same
    /// delta, using positions captured before anything moves. Deletion
    /// rectangles of masks built on `id` follow. Returns the ids touched.
    pub fn move_endpoint(&mut self, id: StrandId, end: End, target: Point) -> Vec<StrandId> {
        let Some(strand) = self.get(id) else {
            return Vec::new();
        };
        let target = strand.constrain_drag(end, target);
        let old = strand.endpoint(end);
        let delta = target - old;
        if delta == Vec2::ZERO {
            return Vec::new();
        }

        let mut movers = self.endpoints_near(old);
        if !movers.iter().any(|(s, e, _)| *s == id && *e == end) {
            movers.push((id, end, old));
        }
        let mut touched = Vec::new();
        for (sid, e, pre) in movers {
            if let Some(s) = self.get_mut(sid) {
                s.set_endpoint(e, pre + delta);
                if !touched.contains(&sid) {
                    touched.push(sid);
                }
            }
        }
        for mask in self.masks_of(id) {
            if let Some(m) = self.get_mut(mask).and_then(Strand::mask_mut) {
                m.transform_rects(kurbo::Affine::translate(delta));
            }
        }
        self.finish_mutation();
        touched
    }

    /// Move a control point. Endpoint handles go through [`Canvas::move_endpoint`].
    pub fn move_handle(&mut self, id: StrandId, handle: Handle, target: Point) -> Vec<StrandId> {
        if let Some(end) = handle.as_end() {
            return self.move_endpoint(id, end, target);
        }
        let Some(strand) = self.get_mut(id) else {
            return Vec::new();
        };
        let spine = &mut strand.core.spine;
        match handle {
            Handle::Cp1 => spine.cp1 = target,
            Handle::Cp2 => spine.cp2 = target,
            Handle::CpCenter => spine.cp_center = Some(target),
            Handle::Start | Handle::End => {}
        }
        strand.update_shape();
        self.finish_mutation();
        vec![id]
    }

    /// Translate a whole strand, dragging coincident endpoints of other
    /// strands along.
    pub fn translate_strand(&mut self, id: StrandId, delta: Vec2) {
        let Some(strand) = self.get(id) else {
            return;
        };
        let mut followers = Vec::new();
        for end in End::BOTH {
            followers.extend(self.endpoints_near(strand.endpoint(end)).into_iter().filter(|(s, _, _)| *s != id));
        }
        if let Some(s) = self.get_mut(id) {
            s.translate(delta);
        }
        for (sid, e, pre) in followers {
            if let Some(s) = self.get_mut(sid) {
                s.set_endpoint(e, pre + delta);
            }
        }
        for mask in self.masks_of(id) {
            if let Some(m) = self.get_mut(mask).and_then(Strand::mask_mut) {
                m.transform_rects(kurbo::Affine::translate(delta));
            }
        }
        self.finish_mutation();
    }
}
