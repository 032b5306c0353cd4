//! Move mode: drag endpoints and control points along the grid.
//!
//! The pointer only sets a target; a 16 ms timer walks the handle toward it
//! one bounded grid step per tick.

use super::{InteractionMode, ModeKind, ModeOutcome, MutationKind};
use crate::canvas::Canvas;
use crate::geometry::{START_SELECTION_SIZE, square_hit_box};
use crate::input::PointerEvent;
use crate::snap::{GRID_SIZE, snap_to_grid};
use crate::strand::{End, Handle, StrandId};
use kurbo::Point;
use std::time::Duration;

/// Timer period while a handle is catching up with the pointer.
pub const MOVE_TICK: Duration = Duration::from_millis(16);

/// Largest step per tick and axis, in grid cells.
pub const MOVE_SPEED: f64 = 1.0;

/// Side of the square hit box around a control point.
pub const CONTROL_POINT_HIT_SIZE: f64 = 50.0;

#[derive(Debug, Clone, Copy)]
struct ActiveMove {
    strand: StrandId,
    handle: Handle,
    last_snapped: Point,
    target: Point,
    moved: bool,
}

#[derive(Debug, Default)]
pub struct MoveMode {
    active: Option<ActiveMove>,
}

fn step_toward(from: f64, to: f64) -> f64 {
    let delta = to - from;
    from + delta.signum() * delta.abs().min(MOVE_SPEED * GRID_SIZE)
}

impl MoveMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strand and handle being moved.
    pub fn moving(&self) -> Option<(StrandId, Handle)> {
        self.active.map(|a| (a.strand, a.handle))
    }

    /// Pick the handle under `pos`: the selected strand first, then the
    /// others front to back. Endpoints win over control points.
    pub fn hit_test(canvas: &Canvas, pos: Point) -> Option<(StrandId, Handle)> {
        let selected = canvas.selected();
        let candidates = selected
            .into_iter()
            .chain(canvas.strand_ids().iter().rev().copied().filter(|id| Some(*id) != selected));
        for id in candidates {
            let Some(strand) = canvas.get(id) else {
                continue;
            };
            if strand.is_masked() || strand.core.visibility.is_hidden || !canvas.is_editable(id) {
                continue;
            }
            let spine = strand.spine();
            for end in End::BOTH {
                if square_hit_box(strand.endpoint(end), START_SELECTION_SIZE).contains(pos) {
                    return Some((id, Handle::from_end(end)));
                }
            }
            if !canvas.show_control_points {
                continue;
            }
            let mut handles = vec![Handle::Cp1, Handle::Cp2];
            if spine.cp_center_locked {
                handles.push(Handle::CpCenter);
            }
            for handle in handles {
                let hit = handle
                    .point(spine)
                    .is_some_and(|p| square_hit_box(p, CONTROL_POINT_HIT_SIZE).contains(pos));
                if hit {
                    return Some((id, handle));
                }
            }
        }
        None
    }

    fn set_dragging(canvas: &mut Canvas, id: StrandId, dragging: bool) {
        if let Some(strand) = canvas.get_mut(id) {
            strand.core.dragging = dragging;
        }
    }
}

impl InteractionMode for MoveMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Move
    }

    fn on_press(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        let Some((strand, handle)) = Self::hit_test(canvas, event.position) else {
            return ModeOutcome::Idle;
        };
        Self::set_dragging(canvas, strand, true);
        let snapped = snap_to_grid(event.position, GRID_SIZE);
        self.active = Some(ActiveMove {
            strand,
            handle,
            last_snapped: snapped,
            target: snapped,
            moved: false,
        });
        ModeOutcome::Idle
    }

    fn on_move(&mut self, _canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        if let Some(active) = self.active.as_mut() {
            active.target = snap_to_grid(event.position, GRID_SIZE);
        }
        ModeOutcome::Idle
    }

    fn on_tick(&mut self, canvas: &mut Canvas) -> ModeOutcome {
        let Some(active) = self.active.as_mut() else {
            return ModeOutcome::Idle;
        };
        let from = active.last_snapped;
        let next = snap_to_grid(
            Point::new(step_toward(from.x, active.target.x), step_toward(from.y, active.target.y)),
            GRID_SIZE,
        );
        if next == from {
            return ModeOutcome::Idle;
        }
        canvas.move_handle(active.strand, active.handle, next);
        active.last_snapped = next;
        active.moved = true;
        ModeOutcome::Changed
    }

    fn wants_tick(&self) -> bool {
        self.active.is_some_and(|a| a.last_snapped != a.target)
    }

    /// Stops the timer; a target not reached yet is dropped.
    fn on_release(&mut self, canvas: &mut Canvas, _event: &PointerEvent) -> ModeOutcome {
        let Some(active) = self.active.take() else {
            return ModeOutcome::Idle;
        };
        Self::set_dragging(canvas, active.strand, false);
        canvas.request_repaint();
        if active.moved {
            ModeOutcome::Commit(MutationKind::Move)
        } else {
            ModeOutcome::Idle
        }
    }

    fn cancel(&mut self, canvas: &mut Canvas) {
        if let Some(active) = self.active.take() {
            Self::set_dragging(canvas, active.strand, false);
        }
    }
}
