//! Mask mode: pick two crossing strands to create a masked layer.

use super::{InteractionMode, ModeKind, ModeOutcome, MutationKind};
use crate::canvas::Canvas;
use crate::error::StrandError;
use crate::input::PointerEvent;
use crate::strand::StrandId;

#[derive(Debug, Default)]
pub struct MaskMode {
    first: Option<StrandId>,
}

impl MaskMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// The strand picked by the first click.
    pub fn pending(&self) -> Option<StrandId> {
        self.first
    }

    /// Frontmost non-masked strand under the pointer.
    fn pick(canvas: &Canvas, event: &PointerEvent) -> Option<StrandId> {
        canvas
            .strands_at_point(event.position)
            .into_iter()
            .find(|id| canvas.get(*id).is_some_and(|s| !s.is_masked()))
    }
}

impl InteractionMode for MaskMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Mask
    }

    fn on_press(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        let picked = Self::pick(canvas, event);
        canvas.request_repaint();
        let (Some(first), Some(second)) = (self.first, picked) else {
            self.first = picked;
            return ModeOutcome::Idle;
        };
        self.first = None;
        if first == second || canvas.has_mask(first, second) {
            return ModeOutcome::Idle;
        }
        match canvas.create_mask(first, second) {
            Ok(_) => ModeOutcome::Commit(MutationKind::Mask),
            Err(StrandError::MaskEmptyIntersection { .. }) => ModeOutcome::Cancelled,
            Err(e) => {
                log::warn!("Mask creation failed: {e}");
                ModeOutcome::Cancelled
            }
        }
    }

    fn cancel(&mut self, canvas: &mut Canvas) {
        if self.first.take().is_some() {
            canvas.request_repaint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn click(mode: &mut MaskMode, canvas: &mut Canvas, x: f64, y: f64) -> ModeOutcome {
        mode.on_press(canvas, &PointerEvent::left(Point::new(x, y)))
    }

    #[test]
    fn test_two_clicks_create_mask() {
        let mut canvas = Canvas::new();
        canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(200.0, 0.0)).unwrap();
        canvas.create_new_strand(Some(2), Point::new(100.0, -100.0), Point::new(100.0, 100.0)).unwrap();
        let mut mode = MaskMode::new();

        assert_eq!(click(&mut mode, &mut canvas, 20.0, 0.0), ModeOutcome::Idle);
        assert!(mode.pending().is_some());
        assert_eq!(click(&mut mode, &mut canvas, 100.0, -80.0), ModeOutcome::Commit(MutationKind::Mask));
        assert!(canvas.by_name("1_1_2_1").is_some());
        assert!(mode.pending().is_none());

        // The same pair again does nothing.
        click(&mut mode, &mut canvas, 20.0, 0.0);
        assert_eq!(click(&mut mode, &mut canvas, 100.0, -80.0), ModeOutcome::Idle);
        assert_eq!(canvas.len(), 3);
    }

    #[test]
    fn test_parallel_strands_cancel_silently() {
        let mut canvas = Canvas::new();
        canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        canvas.create_new_strand(Some(2), Point::new(0.0, 100.0), Point::new(100.0, 100.0)).unwrap();
        let mut mode = MaskMode::new();
        click(&mut mode, &mut canvas, 50.0, 0.0);
        assert_eq!(click(&mut mode, &mut canvas, 50.0, 100.0), ModeOutcome::Cancelled);
        assert_eq!(canvas.len(), 2);
    }

    #[test]
    fn test_same_strand_or_empty_click_resets_pair() {
        let mut canvas = Canvas::new();
        canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        let mut mode = MaskMode::new();
        click(&mut mode, &mut canvas, 50.0, 0.0);
        assert_eq!(click(&mut mode, &mut canvas, 60.0, 0.0), ModeOutcome::Idle);
        assert!(mode.pending().is_none());

        click(&mut mode, &mut canvas, 50.0, 0.0);
        click(&mut mode, &mut canvas, 50.0, 500.0);
        assert!(mode.pending().is_none());
    }
}
