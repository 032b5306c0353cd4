//! Rubber-band creation of main strands.

use super::{InteractionMode, ModeKind, ModeOutcome, MutationKind};
use crate::canvas::Canvas;
use crate::input::PointerEvent;
use crate::snap::snap_strand_end;
use crate::strand::Strand;
use kurbo::Point;

/// A main strand being drawn from `start`; shown through `canvas.in_progress`.
#[derive(Debug, Clone, Copy)]
pub struct RubberBand {
    start: Point,
    end: Option<Point>,
}

impl RubberBand {
    pub fn begin(canvas: &mut Canvas, start: Point) -> Self {
        let set = canvas.layer_state().next_set_number();
        let mut preview = Strand::straight(format!("{set}_1"), set, start, start);
        preview.set_color(canvas.set_color(set));
        canvas.in_progress = Some(preview);
        canvas.request_repaint();
        Self { start, end: None }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    /// Snap the free end to the cursor: 5° angles, at least 25 px long.
    pub fn update(&mut self, canvas: &mut Canvas, cursor: Point) {
        let snapped = snap_strand_end(self.start, cursor);
        self.end = Some(snapped.point);
        if let Some(preview) = canvas.in_progress.as_mut() {
            preview.update(snapped.point, true);
        }
        canvas.request_repaint();
    }

    /// Turn the preview into a real strand. Without any movement nothing is created.
    pub fn finish(self, canvas: &mut Canvas) -> ModeOutcome {
        canvas.in_progress = None;
        let Some(end) = self.end else {
            canvas.request_repaint();
            return ModeOutcome::Cancelled;
        };
        match canvas.create_new_strand(None, self.start, end) {
            Ok(_) => ModeOutcome::Commit(MutationKind::NewStrand),
            Err(e) => {
                log::warn!("Could not create strand: {e}");
                ModeOutcome::Cancelled
            }
        }
    }

    pub fn cancel(self, canvas: &mut Canvas) {
        canvas.in_progress = None;
        canvas.request_repaint();
    }
}

/// Draws the main strand of a new set on every drag.
#[derive(Debug, Default)]
pub struct NewStrandMode {
    band: Option<RubberBand>,
}

impl NewStrandMode {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InteractionMode for NewStrandMode {
    fn kind(&self) -> ModeKind {
        ModeKind::NewStrand
    }

    fn on_press(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        self.band = Some(RubberBand::begin(canvas, event.position));
        ModeOutcome::Idle
    }

    fn on_move(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        match self.band.as_mut() {
            Some(band) => {
                band.update(canvas, event.position);
                ModeOutcome::Changed
            }
            None => ModeOutcome::Idle,
        }
    }

    fn on_release(&mut self, canvas: &mut Canvas, _event: &PointerEvent) -> ModeOutcome {
        self.band.take().map_or(ModeOutcome::Idle, |band| band.finish(canvas))
    }

    fn cancel(&mut self, canvas: &mut Canvas) {
        if let Some(band) = self.band.take() {
            band.cancel(canvas);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_creates_next_set() {
        let mut canvas = Canvas::new();
        canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        let mut mode = NewStrandMode::new();

        mode.on_press(&mut canvas, &PointerEvent::left(Point::new(0.0, 100.0)));
        mode.on_move(&mut canvas, &PointerEvent::left(Point::new(98.0, 104.0)));
        assert_eq!(canvas.in_progress.as_ref().map(|s| s.layer_name()), Some("2_1"));

        let outcome = mode.on_release(&mut canvas, &PointerEvent::left(Point::new(98.0, 104.0)));
        assert_eq!(outcome, ModeOutcome::Commit(MutationKind::NewStrand));
        assert!(canvas.in_progress.is_none());
        let strand = canvas.by_name("2_1").unwrap();
        // 2.3° rounds down to a horizontal strand.
        assert!((strand.endpoint(crate::strand::End::End).y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_without_drag_creates_nothing() {
        let mut canvas = Canvas::new();
        let mut mode = NewStrandMode::new();
        mode.on_press(&mut canvas, &PointerEvent::left(Point::new(10.0, 10.0)));
        let outcome = mode.on_release(&mut canvas, &PointerEvent::left(Point::new(10.0, 10.0)));
        assert_eq!(outcome, ModeOutcome::Cancelled);
        assert!(canvas.is_empty());
        assert!(canvas.in_progress.is_none());
    }

    #[test]
    fn test_short_drag_is_lengthened() {
        let mut canvas = Canvas::new();
        let mut band = RubberBand::begin(&mut canvas, Point::new(0.0, 0.0));
        band.update(&mut canvas, Point::new(3.0, 0.0));
        band.finish(&mut canvas);
        let strand = canvas.by_name("1_1").unwrap();
        assert!((strand.core.length - crate::snap::MIN_DRAW_LENGTH).abs() < 1e-9);
    }
}
