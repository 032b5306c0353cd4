//! Angle-adjust mode: nudge the polar angle and length of one strand with
//! the arrow keys.

use super::{InteractionMode, ModeKind, ModeOutcome, MutationKind};
use crate::canvas::Canvas;
use crate::error::{StrandError, StrandResult};
use crate::events::CanvasEvent;
use crate::geometry::Spine;
use crate::input::Key;
use crate::strand::{End, StrandId};

/// Degrees per left/right key press.
pub const ANGLE_STEP: f64 = 1.0;
/// Pixels per up/down key press.
pub const LENGTH_STEP: f64 = 10.0;
/// Shortest length reachable with the keys.
pub const MIN_ADJUST_LENGTH: f64 = 10.0;

#[derive(Debug)]
pub struct AngleAdjustMode {
    strand: StrandId,
    initial: Spine,
    initial_angle: f64,
    initial_length: f64,
    /// Endpoints of other strands that sat on the end at activation.
    followers: Vec<(StrandId, End)>,
    changed: bool,
}

impl AngleAdjustMode {
    pub fn activate(canvas: &Canvas, id: StrandId) -> StrandResult<Self> {
        let strand = canvas.get(id).ok_or_else(|| StrandError::InvalidLayerName(id.to_string()))?;
        if strand.is_masked() || !canvas.is_editable(id) {
            return Err(StrandError::InvalidLayerName(strand.layer_name().to_string()));
        }
        let followers = canvas
            .endpoints_near(strand.endpoint(End::End))
            .into_iter()
            .filter(|(other, _, _)| *other != id)
            .map(|(other, end, _)| (other, end))
            .collect();
        Ok(Self {
            strand: id,
            initial: *strand.spine(),
            initial_angle: strand.core.angle,
            initial_length: strand.core.length,
            followers,
            changed: false,
        })
    }

    pub fn strand(&self) -> StrandId {
        self.strand
    }

    fn adjust(&mut self, canvas: &mut Canvas, d_angle: f64, d_length: f64) -> ModeOutcome {
        let Some(strand) = canvas.get_mut(self.strand) else {
            return ModeOutcome::Idle;
        };
        strand.core.angle += d_angle;
        strand.core.length = (strand.core.length + d_length).max(MIN_ADJUST_LENGTH);
        strand.update_end();
        let end = strand.endpoint(End::End);
        for &(other, side) in &self.followers {
            if let Some(follower) = canvas.get_mut(other) {
                follower.set_endpoint(side, end);
            }
        }
        self.changed = true;
        canvas.finish_mutation();
        ModeOutcome::Changed
    }

    fn restore(&mut self, canvas: &mut Canvas) {
        if !self.changed {
            return;
        }
        if let Some(strand) = canvas.get_mut(self.strand) {
            strand.core.spine = self.initial;
            strand.core.angle = self.initial_angle;
            strand.core.length = self.initial_length;
            strand.update_shape();
        }
        for &(other, side) in &self.followers {
            if let Some(follower) = canvas.get_mut(other) {
                follower.set_endpoint(side, self.initial.end);
            }
        }
        self.changed = false;
        canvas.finish_mutation();
    }
}

impl InteractionMode for AngleAdjustMode {
    fn kind(&self) -> ModeKind {
        ModeKind::AngleAdjust
    }

    fn on_key(&mut self, canvas: &mut Canvas, key: Key) -> ModeOutcome {
        match key {
            Key::Left => self.adjust(canvas, -ANGLE_STEP, 0.0),
            Key::Right => self.adjust(canvas, ANGLE_STEP, 0.0),
            Key::Up => self.adjust(canvas, 0.0, LENGTH_STEP),
            Key::Down => self.adjust(canvas, 0.0, -LENGTH_STEP),
            Key::Enter => {
                canvas.select(Some(self.strand));
                canvas.events().emit(CanvasEvent::AngleAdjustCompleted);
                canvas.flush_events();
                if std::mem::take(&mut self.changed) {
                    ModeOutcome::Commit(MutationKind::AngleAdjust)
                } else {
                    ModeOutcome::Exit
                }
            }
            Key::Escape => {
                self.restore(canvas);
                ModeOutcome::Exit
            }
            Key::Delete => ModeOutcome::Idle,
        }
    }

    fn cancel(&mut self, canvas: &mut Canvas) {
        self.restore(canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn setup() -> (Canvas, StrandId, StrandId) {
        let mut canvas = Canvas::new();
        let main = canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        let child = canvas.attach_child(main, End::End).unwrap();
        canvas.get_mut(child).unwrap().update(Point::new(100.0, 100.0), true);
        canvas.finish_mutation();
        (canvas, main, child)
    }

    #[test]
    fn test_keys_rotate_and_resize() {
        let (mut canvas, main, child) = setup();
        let mut mode = AngleAdjustMode::activate(&canvas, main).unwrap();
        for _ in 0..90 {
            mode.on_key(&mut canvas, Key::Right);
        }
        mode.on_key(&mut canvas, Key::Up);

        let strand = canvas.get(main).unwrap();
        assert!(strand.endpoint(End::End).distance(Point::new(0.0, 110.0)) < 1e-6);
        let follower = canvas.get(child).unwrap();
        assert!(follower.endpoint(End::Start).distance(Point::new(0.0, 110.0)) < 1e-6);
        assert_eq!(follower.endpoint(End::End), Point::new(100.0, 100.0));

        assert_eq!(mode.on_key(&mut canvas, Key::Enter), ModeOutcome::Commit(MutationKind::AngleAdjust));
    }

    #[test]
    fn test_length_is_floored() {
        let (mut canvas, main, _) = setup();
        let mut mode = AngleAdjustMode::activate(&canvas, main).unwrap();
        for _ in 0..20 {
            mode.on_key(&mut canvas, Key::Down);
        }
        let strand = canvas.get(main).unwrap();
        assert!((strand.endpoint(End::End).x - MIN_ADJUST_LENGTH).abs() < 1e-9);
    }

    #[test]
    fn test_escape_restores() {
        let (mut canvas, main, child) = setup();
        let before = crate::persistence::to_project(&canvas);
        let mut mode = AngleAdjustMode::activate(&canvas, main).unwrap();
        mode.on_key(&mut canvas, Key::Left);
        mode.on_key(&mut canvas, Key::Down);
        assert_eq!(mode.on_key(&mut canvas, Key::Escape), ModeOutcome::Exit);

        assert!(crate::undo::states_identical(&before, &crate::persistence::to_project(&canvas)));
        assert_eq!(canvas.get(child).unwrap().endpoint(End::Start), Point::new(100.0, 0.0));
    }
}
