//! Named groups of strands and their atomic rotation and translation.

use crate::canvas::Canvas;
use crate::error::{StrandError, StrandResult};
use crate::geometry::{Spine, centroid};
use crate::mask::DeletionRect;
use crate::strand::{End, StrandId, parse_layer_name};
use kurbo::{Affine, Point, Vec2};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Control points of a member, kept with the group record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupControlPoints {
    pub cp1: Point,
    pub cp2: Point,
    pub cp_center: Option<Point>,
    pub cp_center_locked: bool,
}

impl From<&Spine> for GroupControlPoints {
    fn from(spine: &Spine) -> Self {
        Self {
            cp1: spine.cp1,
            cp2: spine.cp2,
            cp_center: spine.cp_center,
            cp_center_locked: spine.cp_center_locked,
        }
    }
}

/// A named collection of layers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub name: String,
    pub layers: Vec<String>,
    pub main_strands: Vec<String>,
    pub main_set_numbers: BTreeSet<i32>,
    pub control_points: BTreeMap<String, GroupControlPoints>,
    pub collapsed: bool,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a layer, tracking main strands and their sets.
    pub fn add_layer(&mut self, layer: &str) {
        if !self.layers.iter().any(|l| l == layer) {
            self.layers.push(layer.to_string());
        }
        if let Some((set, index)) = parse_layer_name(layer) {
            if index == 1 && !self.main_strands.iter().any(|l| l == layer) {
                self.main_strands.push(layer.to_string());
            }
            self.main_set_numbers.insert(set);
        }
    }
}

#[derive(Debug, Clone)]
struct StrandSnapshot {
    spine: Spine,
    rects: Option<Vec<DeletionRect>>,
}

/// A non-member endpoint that sat on a member endpoint when the operation began.
#[derive(Debug, Clone, Copy)]
struct Follower {
    strand: StrandId,
    end: End,
    pre: Point,
    anchor: Point,
}

/// Pre-operation state of a group rotation or translation.
///
/// Every frame restores this state before applying the total angle or
/// offset, so live drags never accumulate error.
#[derive(Debug, Clone)]
pub struct GroupOperation {
    group: String,
    members: Vec<StrandId>,
    pub rotation_center: Point,
    pre_state: HashMap<StrandId, StrandSnapshot>,
    outside_descendants: Vec<StrandId>,
    followers: Vec<Follower>,
    main_strands: Vec<String>,
}

impl GroupOperation {
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn members(&self) -> &[StrandId] {
        &self.members
    }
}

impl Canvas {
    pub fn groups(&self) -> &BTreeMap<String, Group> {
        &self.groups
    }

    pub fn group(&self, name: &str) -> StrandResult<&Group> {
        self.groups.get(name).ok_or_else(|| StrandError::GroupMissing(name.to_string()))
    }

    /// Create a group from existing layers.
    pub fn create_group(&mut self, name: &str, layers: &[&str]) -> StrandResult<()> {
        let mut group = Group::new(name);
        for layer in layers {
            let strand = self.by_name(layer).ok_or_else(|| StrandError::InvalidLayerName(layer.to_string()))?;
            group.add_layer(layer);
            group.control_points.insert(layer.to_string(), GroupControlPoints::from(&strand.core.spine));
        }
        log::info!("Created group {name} with {} layers", group.layers.len());
        self.groups.insert(name.to_string(), group);
        Ok(())
    }

    pub fn delete_group(&mut self, name: &str) -> StrandResult<()> {
        self.groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StrandError::GroupMissing(name.to_string()))
    }

    pub fn add_to_group(&mut self, name: &str, layer: &str) -> StrandResult<()> {
        let spine = self
            .by_name(layer)
            .map(|s| s.core.spine)
            .ok_or_else(|| StrandError::InvalidLayerName(layer.to_string()))?;
        let group = self.groups.get_mut(name).ok_or_else(|| StrandError::GroupMissing(name.to_string()))?;
        group.add_layer(layer);
        group.control_points.insert(layer.to_string(), GroupControlPoints::from(&spine));
        Ok(())
    }

    pub fn rename_group(&mut self, old: &str, new: &str) -> StrandResult<()> {
        if self.groups.contains_key(new) {
            return Err(StrandError::DuplicateLayerName(new.to_string()));
        }
        let mut group = self.groups.remove(old).ok_or_else(|| StrandError::GroupMissing(old.to_string()))?;
        group.name = new.to_string();
        self.groups.insert(new.to_string(), group);
        Ok(())
    }

    /// Members of a group in layer order.
    ///
    /// Besides the listed layers this includes every strand whose set is one
    /// of the group's main sets, and masks whose components are both members.
    pub fn group_members(&self, name: &str) -> StrandResult<Vec<StrandId>> {
        let group = self.group(name)?;
        let mut members: HashSet<StrandId> = self
            .strands()
            .filter(|s| {
                group.layers.iter().any(|l| l == s.layer_name())
                    || (!s.is_masked() && group.main_set_numbers.contains(&s.set_number()))
            })
            .map(|s| s.id())
            .collect();
        let masks: Vec<StrandId> = self
            .strands()
            .filter_map(|s| s.mask_components().map(|c| (s.id(), c)))
            .filter(|(_, (a, b))| members.contains(a) && members.contains(b))
            .map(|(id, _)| id)
            .collect();
        members.extend(masks);
        Ok(self.strand_ids().iter().copied().filter(|id| members.contains(id)).collect())
    }

    /// Drop deleted layers from groups; remove groups left without any
    /// strand in one of their main sets.
    pub(crate) fn prune_groups(&mut self, removed: &HashSet<String>) {
        let live_sets: HashSet<i32> = self.strands().filter(|s| !s.is_masked()).map(|s| s.set_number()).collect();
        self.groups.retain(|name, group| {
            group.layers.retain(|l| !removed.contains(l));
            group.main_strands.retain(|l| !removed.contains(l));
            for layer in removed {
                group.control_points.remove(layer);
            }
            let keep = group.main_set_numbers.iter().all(|set| live_sets.contains(set)) && !group.layers.is_empty();
            if !keep {
                log::info!("Removing group {name}: a main set became empty");
            }
            keep
        });
    }

    /// Snapshot a group before rotating or translating it.
    pub fn begin_group_operation(&self, name: &str) -> StrandResult<GroupOperation> {
        let group = self.group(name).inspect_err(|e| log::warn!("{e}"))?;
        let members = self.group_members(name)?;
        let member_set: HashSet<StrandId> = members.iter().copied().collect();

        let mut points = Vec::new();
        let mut pre_state = HashMap::new();
        for &id in &members {
            let Some(strand) = self.get(id) else { continue };
            let spine = strand.core.spine;
            points.extend([spine.start, spine.end, spine.cp1, spine.cp2]);
            let rects = strand.mask().map(|m| m.deletion_rects.clone());
            if let Some(rects) = &rects {
                points.extend(rects.iter().flat_map(|r| r.corners()));
            }
            pre_state.insert(id, StrandSnapshot { spine, rects });
        }
        let rotation_center = centroid(&points).unwrap_or_default();

        let mut outside_descendants = Vec::new();
        for &id in &members {
            for d in self.descendants(id) {
                if !member_set.contains(&d) && !outside_descendants.contains(&d) {
                    outside_descendants.push(d);
                }
            }
        }
        for &d in &outside_descendants {
            if let Some(strand) = self.get(d) {
                pre_state.insert(
                    d,
                    StrandSnapshot {
                        spine: strand.core.spine,
                        rects: None,
                    },
                );
            }
        }

        let mut followers = Vec::new();
        for &id in &members {
            let Some(strand) = self.get(id) else { continue };
            if strand.is_masked() {
                continue;
            }
            for end in End::BOTH {
                let anchor = strand.endpoint(end);
                for (other, other_end, pre) in self.endpoints_near(anchor) {
                    if !member_set.contains(&other)
                        && !followers.iter().any(|f: &Follower| f.strand == other && f.end == other_end)
                    {
                        followers.push(Follower {
                            strand: other,
                            end: other_end,
                            pre,
                            anchor,
                        });
                    }
                }
            }
        }

        Ok(GroupOperation {
            group: name.to_string(),
            members,
            rotation_center,
            pre_state,
            outside_descendants,
            followers,
            main_strands: group.main_strands.clone(),
        })
    }

    fn restore(&mut self, op: &GroupOperation, id: StrandId) {
        let Some(snapshot) = op.pre_state.get(&id) else { return };
        if let Some(strand) = self.get_mut(id) {
            strand.core.spine = snapshot.spine;
            if let (Some(mask), Some(rects)) = (strand.mask_mut(), &snapshot.rects) {
                mask.deletion_rects = rects.clone();
            }
        }
    }

    fn apply_to_members(&mut self, op: &GroupOperation, affine: Affine) {
        for &id in &op.members {
            self.restore(op, id);
            if let Some(strand) = self.get_mut(id) {
                strand.transform(affine);
            }
        }
    }

    fn move_followers(&mut self, op: &GroupOperation, place: impl Fn(&Follower) -> Point) {
        for follower in &op.followers {
            let target = place(follower);
            if let Some(strand) = self.get_mut(follower.strand) {
                strand.set_endpoint(follower.end, target);
            }
        }
    }

    /// Rotate the group by `degrees` around its rotation center, from the
    /// pre-operation state.
    pub fn rotate_group(&mut self, op: &GroupOperation, degrees: f64) {
        let affine = Affine::rotate_about(degrees.to_radians(), op.rotation_center);
        self.apply_to_members(op, affine);
        for &d in &op.outside_descendants {
            self.restore(op, d);
        }
        self.move_followers(op, |f| affine * f.anchor + (f.pre - f.anchor));
        self.finish_mutation();
    }

    /// Translate the group by `delta` from the pre-operation state. Chains
    /// hanging off the group follow without becoming members.
    pub fn translate_group(&mut self, op: &GroupOperation, delta: Vec2) {
        let affine = Affine::translate(delta);
        self.apply_to_members(op, affine);
        for &d in &op.outside_descendants {
            self.restore(op, d);
            if let Some(strand) = self.get_mut(d) {
                strand.translate(delta);
            }
        }
        self.move_followers(op, |f| f.pre + delta);
        self.finish_mutation();
    }

    /// Commit a group operation.
    pub fn finish_group_operation(&mut self, op: GroupOperation) {
        let spines: Vec<(String, GroupControlPoints)> = op
            .members
            .iter()
            .filter_map(|id| self.get(*id))
            .map(|s| (s.layer_name().to_string(), GroupControlPoints::from(&s.core.spine)))
            .collect();
        if let Some(group) = self.groups.get_mut(&op.group) {
            if group.main_strands.is_empty() && !op.main_strands.is_empty() {
                group.main_strands = op.main_strands.clone();
            }
            for (layer, cps) in spines {
                if group.control_points.contains_key(&layer) {
                    group.control_points.insert(layer, cps);
                }
            }
        }
        self.finish_mutation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crossing_canvas() -> (Canvas, StrandId, StrandId, StrandId) {
        let mut canvas = Canvas::new();
        let a = canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        let b = canvas.create_new_strand(Some(2), Point::new(50.0, -50.0), Point::new(50.0, 50.0)).unwrap();
        for id in [a, b] {
            let strand = canvas.get_mut(id).unwrap();
            strand.core.width = 20.0;
            strand.update_shape();
        }
        let mask = canvas.create_mask(a, b).unwrap();
        (canvas, a, b, mask)
    }

    #[test]
    fn test_group_membership_is_inferred_from_sets() {
        let mut canvas = Canvas::new();
        let main = canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        canvas.create_group("g", &["1_1"]).unwrap();
        let child = canvas.attach_child(main, End::End).unwrap();
        assert_eq!(canvas.group_members("g").unwrap(), vec![main, child]);
        assert_eq!(canvas.group("g").unwrap().main_set_numbers, BTreeSet::from([1]));
    }

    #[test]
    fn test_group_management() {
        let (mut canvas, _, _, _) = crossing_canvas();
        canvas.create_group("g", &["1_1"]).unwrap();
        canvas.add_to_group("g", "2_1").unwrap();
        canvas.rename_group("g", "h").unwrap();
        assert!(matches!(canvas.group("g"), Err(StrandError::GroupMissing(_))));
        assert_eq!(canvas.group("h").unwrap().layers, vec!["1_1", "2_1"]);
        assert!(canvas.create_group("bad", &["9_9"]).is_err());
        canvas.delete_group("h").unwrap();
        assert!(matches!(canvas.delete_group("h"), Err(StrandError::GroupMissing(_))));
    }

    #[test]
    fn test_group_removed_when_main_set_empties() {
        let (mut canvas, a, _, _) = crossing_canvas();
        canvas.create_group("g", &["1_1", "2_1"]).unwrap();
        canvas.delete_strand(a).unwrap();
        assert!(canvas.group("g").is_err());
    }

    #[test]
    fn test_masked_edit_survives_rotation() {
        let (mut canvas, _, _, mask) = crossing_canvas();
        let rect = DeletionRect {
            top_left: Point::new(45.0, -5.0),
            top_right: Point::new(55.0, -5.0),
            bottom_left: Point::new(45.0, 5.0),
            bottom_right: Point::new(55.0, 5.0),
        };
        canvas.add_deletion_rect(mask, rect).unwrap();
        canvas.create_group("g", &["1_1", "2_1"]).unwrap();

        let op = canvas.begin_group_operation("g").unwrap();
        assert!(op.members().contains(&mask));
        assert!(op.rotation_center.distance(Point::new(50.0, 0.0)) < 1e-9);
        canvas.rotate_group(&op, 90.0);
        canvas.finish_group_operation(op);

        let masked = canvas.get(mask).unwrap();
        let rect = masked.mask().unwrap().deletion_rects[0];
        let expected = [
            Point::new(55.0, -5.0),
            Point::new(55.0, 5.0),
            Point::new(45.0, -5.0),
            Point::new(45.0, 5.0),
        ];
        for (got, want) in rect.corners().iter().zip(expected) {
            assert!(got.distance(want) < 1e-9, "{got:?} != {want:?}");
        }
        let ops = canvas.region_ops();
        let region = masked.mask().unwrap().mask_region();
        assert!(!ops.contains(region, Point::new(50.0, 0.0)));
        assert!(ops.contains(region, Point::new(50.0, 9.0)));
    }

    #[test]
    fn test_live_rotation_does_not_accumulate() {
        let (mut canvas, a, _, _) = crossing_canvas();
        canvas.create_group("g", &["1_1", "2_1"]).unwrap();
        let op = canvas.begin_group_operation("g").unwrap();
        canvas.rotate_group(&op, 30.0);
        canvas.rotate_group(&op, 75.0);
        let live = canvas.get(a).unwrap().core.spine;

        canvas.rotate_group(&op, 0.0);
        canvas.rotate_group(&op, 75.0);
        let direct = canvas.get(a).unwrap().core.spine;
        assert!(live.start.distance(direct.start) < 1e-9);
        assert!(live.end.distance(direct.end) < 1e-9);
    }

    #[test]
    fn test_rotation_composes_across_operations() {
        let (mut canvas, a, b, _) = crossing_canvas();
        canvas.create_group("g", &["1_1", "2_1"]).unwrap();
        let original: Vec<Spine> = [a, b].iter().map(|id| canvas.get(*id).unwrap().core.spine).collect();

        let op = canvas.begin_group_operation("g").unwrap();
        canvas.rotate_group(&op, 25.0);
        canvas.finish_group_operation(op);
        let op = canvas.begin_group_operation("g").unwrap();
        canvas.rotate_group(&op, 40.0);
        canvas.finish_group_operation(op);
        let twice: Vec<Spine> = [a, b].iter().map(|id| canvas.get(*id).unwrap().core.spine).collect();

        let center = Point::new(50.0, 0.0);
        let once = Affine::rotate_about(65f64.to_radians(), center);
        for (before, after) in original.iter().zip(&twice) {
            for (p, q) in before.points().iter().zip(after.points()) {
                assert!((once * *p).distance(q) < 1e-6);
            }
        }
    }

    #[test]
    fn test_translate_drags_outside_descendants() {
        let mut canvas = Canvas::new();
        let main = canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        let other = canvas.create_new_strand(Some(2), Point::new(0.0, 200.0), Point::new(100.0, 200.0)).unwrap();
        // A set-2 child hanging off a set-1 strand is not a member of a set-1 group.
        let parent = canvas.get(main).unwrap().clone();
        let mut hanger = crate::strand::Strand::attached_to("2_2", &parent, End::End);
        hanger.core.set_number = 2;
        hanger.update(Point::new(150.0, 50.0), true);
        let hanger = canvas.add_strand(hanger).unwrap();
        canvas.finish_mutation();
        canvas.create_group("g", &["1_1"]).unwrap();

        let op = canvas.begin_group_operation("g").unwrap();
        assert_eq!(op.members(), &[main]);
        canvas.translate_group(&op, Vec2::new(10.0, 20.0));
        canvas.translate_group(&op, Vec2::new(20.0, 40.0));
        canvas.finish_group_operation(op);

        assert_eq!(canvas.get(main).unwrap().endpoint(End::End), Point::new(120.0, 40.0));
        assert_eq!(canvas.get(hanger).unwrap().endpoint(End::End), Point::new(170.0, 90.0));
        assert_eq!(canvas.get(other).unwrap().endpoint(End::Start), Point::new(0.0, 200.0));
    }
}
