//! Attach mode: grow children from free endpoints, or draw the first strand
//! of a set.

use super::{InteractionMode, ModeKind, ModeOutcome, MutationKind, RubberBand};
use crate::canvas::Canvas;
use crate::error::StrandError;
use crate::input::PointerEvent;
use crate::strand::{Strand, StrandId};

#[derive(Debug, Clone, Copy, Default)]
enum AttachState {
    #[default]
    Idle,
    DrawingFirstStrand(RubberBand),
    Attaching {
        child: StrandId,
        moved: bool,
    },
}

#[derive(Debug, Default)]
pub struct AttachMode {
    state: AttachState,
}

impl AttachMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// The child being dragged, if any.
    pub fn attaching(&self) -> Option<StrandId> {
        match self.state {
            AttachState::Attaching { child, .. } => Some(child),
            _ => None,
        }
    }

    /// The canvas has no main strand, or the selected set lacks one.
    fn is_first_strand(canvas: &Canvas) -> bool {
        if !canvas.strands().any(Strand::is_main_strand) {
            return true;
        }
        canvas
            .selected_strand()
            .map(Strand::set_number)
            .is_some_and(|set| !canvas.strands().any(|s| s.is_main_strand() && s.set_number() == set))
    }

    fn drop_child(canvas: &mut Canvas, child: StrandId) {
        if let Err(e) = canvas.delete_strand(child) {
            log::warn!("Could not roll back attached strand: {e}");
        }
    }
}

impl InteractionMode for AttachMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Attach
    }

    fn on_press(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        let pos = event.position;
        if let Some((parent, side)) = canvas.find_attach_target(pos) {
            return match canvas.attach_child(parent, side) {
                Ok(child) => {
                    if let Some(strand) = canvas.get_mut(child) {
                        strand.core.dragging = true;
                    }
                    self.state = AttachState::Attaching { child, moved: false };
                    ModeOutcome::Changed
                }
                Err(e) => {
                    log::debug!("Attach cancelled: {e}");
                    ModeOutcome::Idle
                }
            };
        }
        if Self::is_first_strand(canvas) {
            self.state = AttachState::DrawingFirstStrand(RubberBand::begin(canvas, pos));
            return ModeOutcome::Idle;
        }
        log::debug!("{}", StrandError::AttachNoTargetEndpoint);
        ModeOutcome::Idle
    }

    fn on_move(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        match &mut self.state {
            AttachState::Idle => ModeOutcome::Idle,
            AttachState::DrawingFirstStrand(band) => {
                band.update(canvas, event.position);
                ModeOutcome::Changed
            }
            AttachState::Attaching { child, moved } => {
                let Some(strand) = canvas.get_mut(*child) else {
                    return ModeOutcome::Idle;
                };
                strand.update(event.position, true);
                *moved = true;
                canvas.request_repaint();
                ModeOutcome::Changed
            }
        }
    }

    fn on_release(&mut self, canvas: &mut Canvas, _event: &PointerEvent) -> ModeOutcome {
        match std::mem::take(&mut self.state) {
            AttachState::Idle => ModeOutcome::Idle,
            AttachState::DrawingFirstStrand(band) => band.finish(canvas),
            AttachState::Attaching { child, moved } => {
                if !moved {
                    Self::drop_child(canvas, child);
                    return ModeOutcome::Cancelled;
                }
                if let Some(strand) = canvas.get_mut(child) {
                    strand.core.dragging = false;
                }
                canvas.select(Some(child));
                canvas.finish_mutation();
                ModeOutcome::Commit(MutationKind::Attach)
            }
        }
    }

    fn cancel(&mut self, canvas: &mut Canvas) {
        match std::mem::take(&mut self.state) {
            AttachState::Idle => {}
            AttachState::DrawingFirstStrand(band) => band.cancel(canvas),
            AttachState::Attaching { child, .. } => Self::drop_child(canvas, child),
        }
    }
}
