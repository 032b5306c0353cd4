//! Mask-edit mode: erase rectangles from one masked strand.

use super::{InteractionMode, ModeKind, ModeOutcome, MutationKind};
use crate::canvas::Canvas;
use crate::error::{StrandError, StrandResult};
use crate::events::CanvasEvent;
use crate::input::{Key, PointerEvent};
use crate::mask::DeletionRect;
use crate::strand::StrandId;
use kurbo::{Point, Rect};

#[derive(Debug)]
pub struct MaskEditMode {
    mask: StrandId,
    drag: Option<(Point, Point)>,
}

impl MaskEditMode {
    /// Start editing `mask`, which must be a masked strand.
    pub fn enter(canvas: &Canvas, mask: StrandId) -> StrandResult<Self> {
        let strand = canvas
            .get(mask)
            .ok_or_else(|| StrandError::InvalidLayerName(mask.to_string()))?;
        if !strand.is_masked() {
            return Err(StrandError::InvalidLayerName(strand.layer_name().to_string()));
        }
        log::debug!("Editing mask {}", strand.layer_name());
        Ok(Self { mask, drag: None })
    }

    pub fn mask(&self) -> StrandId {
        self.mask
    }

    /// The rectangle being dragged, for preview drawing.
    pub fn preview(&self) -> Option<Rect> {
        self.drag.map(|(a, b)| Rect::from_points(a, b))
    }
}

impl InteractionMode for MaskEditMode {
    fn kind(&self) -> ModeKind {
        ModeKind::MaskEdit
    }

    fn on_press(&mut self, _canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        self.drag = Some((event.position, event.position));
        ModeOutcome::Idle
    }

    fn on_move(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        let Some((_, current)) = self.drag.as_mut() else {
            return ModeOutcome::Idle;
        };
        *current = event.position;
        canvas.request_repaint();
        ModeOutcome::Changed
    }

    fn on_release(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        let Some((anchor, _)) = self.drag.take() else {
            return ModeOutcome::Idle;
        };
        let rect = Rect::from_points(anchor, event.position);
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            canvas.request_repaint();
            return ModeOutcome::Idle;
        }
        match canvas.add_deletion_rect(self.mask, DeletionRect::from_drag(anchor, event.position)) {
            Ok(()) => ModeOutcome::Commit(MutationKind::MaskEdit),
            Err(e) => {
                log::warn!("Could not erase from mask: {e}");
                ModeOutcome::Cancelled
            }
        }
    }

    fn on_key(&mut self, canvas: &mut Canvas, key: Key) -> ModeOutcome {
        match key {
            Key::Escape => {
                self.drag = None;
                canvas.events().emit(CanvasEvent::MaskEditExited);
                canvas.flush_events();
                canvas.request_repaint();
                ModeOutcome::Exit
            }
            Key::Delete => match canvas.reset_mask(self.mask) {
                Ok(()) => ModeOutcome::Commit(MutationKind::MaskEdit),
                Err(e) => {
                    log::warn!("Could not reset mask: {e}");
                    ModeOutcome::Idle
                }
            },
            _ => ModeOutcome::Idle,
        }
    }

    fn cancel(&mut self, canvas: &mut Canvas) {
        if self.drag.take().is_some() {
            canvas.request_repaint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn masked_canvas() -> (Canvas, StrandId) {
        let mut canvas = Canvas::new();
        let a = canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        let b = canvas.create_new_strand(Some(2), Point::new(50.0, -50.0), Point::new(50.0, 50.0)).unwrap();
        let mask = canvas.create_mask(a, b).unwrap();
        (canvas, mask)
    }

    #[test]
    fn test_drag_erases_rectangle() {
        let (mut canvas, mask) = masked_canvas();
        let mut mode = MaskEditMode::enter(&canvas, mask).unwrap();
        assert!(canvas.get(mask).unwrap().body_contains(Point::new(50.0, 0.0)));

        mode.on_press(&mut canvas, &PointerEvent::left(Point::new(45.0, -5.0)));
        mode.on_move(&mut canvas, &PointerEvent::left(Point::new(55.0, 5.0)));
        assert_eq!(mode.preview(), Some(Rect::new(45.0, -5.0, 55.0, 5.0)));
        let outcome = mode.on_release(&mut canvas, &PointerEvent::left(Point::new(55.0, 5.0)));

        assert_eq!(outcome, ModeOutcome::Commit(MutationKind::MaskEdit));
        let strand = canvas.get(mask).unwrap();
        assert_eq!(strand.mask().unwrap().deletion_rects.len(), 1);
        assert!(!strand.body_contains(Point::new(50.0, 0.0)));
    }

    #[test]
    fn test_click_without_area_adds_nothing() {
        let (mut canvas, mask) = masked_canvas();
        let mut mode = MaskEditMode::enter(&canvas, mask).unwrap();
        mode.on_press(&mut canvas, &PointerEvent::left(Point::new(50.0, 0.0)));
        assert_eq!(mode.on_release(&mut canvas, &PointerEvent::left(Point::new(50.0, 0.0))), ModeOutcome::Idle);
        assert!(canvas.get(mask).unwrap().mask().unwrap().deletion_rects.is_empty());
    }

    #[test]
    fn test_escape_emits_exit() {
        let (mut canvas, mask) = masked_canvas();
        let exits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&exits);
        canvas.events().subscribe(move |e| {
            if *e == CanvasEvent::MaskEditExited {
                *counter.borrow_mut() += 1;
            }
        });
        let mut mode = MaskEditMode::enter(&canvas, mask).unwrap();
        assert_eq!(mode.on_key(&mut canvas, Key::Escape), ModeOutcome::Exit);
        assert_eq!(*exits.borrow(), 1);
    }

    #[test]
    fn test_regular_strand_is_rejected() {
        let mut canvas = Canvas::new();
        let id = canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        assert!(MaskEditMode::enter(&canvas, id).is_err());
    }
}
