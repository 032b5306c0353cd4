//! Rotate mode: swing a strand around its opposite endpoint.

use super::{InteractionMode, ModeKind, ModeOutcome, MutationKind};
use crate::canvas::Canvas;
use crate::geometry::{Spine, square_hit_box};
use crate::input::PointerEvent;
use crate::strand::{End, Handle, Strand, StrandId};
use kurbo::{Affine, Point};

#[derive(Debug, Clone, Copy)]
struct ActiveRotation {
    strand: StrandId,
    pivot: Point,
    start_angle: f64,
    angle: f64,
    pre: Spine,
}

#[derive(Debug, Default)]
pub struct RotateMode {
    active: Option<ActiveRotation>,
}

/// The endpoint that moves when `handle` is dragged; the other one is the pivot.
fn moving_end(handle: Handle) -> End {
    match handle {
        Handle::Start | Handle::Cp1 => End::Start,
        Handle::End | Handle::Cp2 | Handle::CpCenter => End::End,
    }
}

/// Nothing else is bound to this end, so it may swing freely.
fn end_is_free(canvas: &Canvas, strand: &Strand, end: End) -> bool {
    !strand.core.has_circles[end.index()]
        && canvas
            .endpoints_near(strand.endpoint(end))
            .iter()
            .all(|(other, _, _)| *other == strand.id())
}

fn angle_of(pivot: Point, p: Point) -> f64 {
    let v = p - pivot;
    v.y.atan2(v.x)
}

impl RotateMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rotating(&self) -> Option<StrandId> {
        self.active.map(|a| a.strand)
    }

    /// Current rotation in radians.
    pub fn angle(&self) -> Option<f64> {
        self.active.map(|a| a.angle)
    }

    fn hit_test(canvas: &Canvas, pos: Point) -> Option<(StrandId, Handle)> {
        for &id in canvas.strand_ids().iter().rev() {
            let Some(strand) = canvas.get(id) else {
                continue;
            };
            if strand.is_masked() || !canvas.is_editable(id) {
                continue;
            }
            let mut handles = vec![(Handle::Start, strand.core.width * 2.0), (Handle::End, strand.core.width * 2.0)];
            if canvas.show_control_points {
                handles.push((Handle::Cp1, super::CONTROL_POINT_HIT_SIZE));
                handles.push((Handle::Cp2, super::CONTROL_POINT_HIT_SIZE));
                if strand.spine().cp_center_locked {
                    handles.push((Handle::CpCenter, super::CONTROL_POINT_HIT_SIZE));
                }
            }
            for (handle, size) in handles {
                let Some(p) = handle.point(strand.spine()) else {
                    continue;
                };
                if square_hit_box(p, size).contains(pos) && end_is_free(canvas, strand, moving_end(handle)) {
                    return Some((id, handle));
                }
            }
        }
        None
    }

    fn restore(canvas: &mut Canvas, active: &ActiveRotation) {
        if let Some(strand) = canvas.get_mut(active.strand) {
            strand.core.spine = active.pre;
            strand.core.sync_polar();
            strand.update_shape();
        }
    }
}

impl InteractionMode for RotateMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Rotate
    }

    fn on_press(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        let Some((id, handle)) = Self::hit_test(canvas, event.position) else {
            return ModeOutcome::Idle;
        };
        let Some(strand) = canvas.get(id) else {
            return ModeOutcome::Idle;
        };
        let pivot = strand.endpoint(moving_end(handle).opposite());
        self.active = Some(ActiveRotation {
            strand: id,
            pivot,
            start_angle: angle_of(pivot, event.position),
            angle: 0.0,
            pre: *strand.spine(),
        });
        ModeOutcome::Idle
    }

    /// Restores the spine captured at press, then rotates it once.
    fn on_move(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        let Some(active) = self.active.as_mut() else {
            return ModeOutcome::Idle;
        };
        if event.position == active.pivot {
            return ModeOutcome::Idle;
        }
        active.angle = angle_of(active.pivot, event.position) - active.start_angle;
        let rotation = Affine::rotate_about(active.angle, active.pivot);
        if let Some(strand) = canvas.get_mut(active.strand) {
            strand.core.spine = active.pre;
            strand.transform(rotation);
        }
        canvas.finish_mutation();
        ModeOutcome::Changed
    }

    fn on_release(&mut self, canvas: &mut Canvas, _event: &PointerEvent) -> ModeOutcome {
        match self.active.take() {
            Some(active) if active.angle != 0.0 => {
                canvas.request_repaint();
                ModeOutcome::Commit(MutationKind::Rotate)
            }
            _ => ModeOutcome::Idle,
        }
    }

    fn cancel(&mut self, canvas: &mut Canvas) {
        if let Some(active) = self.active.take() {
            Self::restore(canvas, &active);
            canvas.finish_mutation();
        }
    }
}
