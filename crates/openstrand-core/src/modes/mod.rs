//! Interaction modes.
//!
//! Exactly one mode is active at a time. Modes turn pointer and key input
//! into canvas mutations and report what happened through [`ModeOutcome`];
//! they never save undo states themselves.

mod angle_adjust;
mod attach;
mod mask;
mod mask_edit;
mod moving;
mod new_strand;
mod rotate;

pub use angle_adjust::{ANGLE_STEP, AngleAdjustMode, LENGTH_STEP, MIN_ADJUST_LENGTH};
pub use attach::AttachMode;
pub use mask::MaskMode;
pub use mask_edit::MaskEditMode;
pub use moving::{CONTROL_POINT_HIT_SIZE, MOVE_SPEED, MOVE_TICK, MoveMode};
pub use new_strand::{NewStrandMode, RubberBand};
pub use rotate::RotateMode;

use crate::canvas::Canvas;
use crate::error::{StrandError, StrandResult};
use crate::input::{Key, MouseButton, PointerEvent};
use serde::{Deserialize, Serialize};

/// Available modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModeKind {
    #[default]
    Attach,
    Move,
    Rotate,
    Mask,
    MaskEdit,
    AngleAdjust,
    NewStrand,
}

/// The user operation a commit finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Attach,
    NewStrand,
    Move,
    Rotate,
    Mask,
    MaskEdit,
    AngleAdjust,
}

/// Result of feeding one input to a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeOutcome {
    /// Nothing changed.
    Idle,
    /// The canvas changed and the operation is still running.
    Changed,
    /// The operation finished; the caller saves an undo state.
    Commit(MutationKind),
    /// The operation was abandoned and its partial changes rolled back.
    Cancelled,
    /// The mode asks to be left.
    Exit,
}

/// Input handlers shared by every mode. Unhandled input is ignored.
pub trait InteractionMode {
    fn kind(&self) -> ModeKind;

    fn on_press(&mut self, _canvas: &mut Canvas, _event: &PointerEvent) -> ModeOutcome {
        ModeOutcome::Idle
    }

    fn on_move(&mut self, _canvas: &mut Canvas, _event: &PointerEvent) -> ModeOutcome {
        ModeOutcome::Idle
    }

    fn on_release(&mut self, _canvas: &mut Canvas, _event: &PointerEvent) -> ModeOutcome {
        ModeOutcome::Idle
    }

    fn on_key(&mut self, _canvas: &mut Canvas, _key: Key) -> ModeOutcome {
        ModeOutcome::Idle
    }

    /// Timer callback for modes that animate.
    fn on_tick(&mut self, _canvas: &mut Canvas) -> ModeOutcome {
        ModeOutcome::Idle
    }

    /// Whether the mode wants timer callbacks right now.
    fn wants_tick(&self) -> bool {
        false
    }

    /// Abandon any running operation, restoring the canvas.
    fn cancel(&mut self, _canvas: &mut Canvas) {}
}

/// The active mode.
#[derive(Debug)]
pub enum Mode {
    Attach(AttachMode),
    Move(MoveMode),
    Rotate(RotateMode),
    Mask(MaskMode),
    MaskEdit(MaskEditMode),
    AngleAdjust(AngleAdjustMode),
    NewStrand(NewStrandMode),
}

impl Mode {
    fn as_dyn(&mut self) -> &mut dyn InteractionMode {
        match self {
            Mode::Attach(m) => m,
            Mode::Move(m) => m,
            Mode::Rotate(m) => m,
            Mode::Mask(m) => m,
            Mode::MaskEdit(m) => m,
            Mode::AngleAdjust(m) => m,
            Mode::NewStrand(m) => m,
        }
    }

    fn as_ref_dyn(&self) -> &dyn InteractionMode {
        match self {
            Mode::Attach(m) => m,
            Mode::Move(m) => m,
            Mode::Rotate(m) => m,
            Mode::Mask(m) => m,
            Mode::MaskEdit(m) => m,
            Mode::AngleAdjust(m) => m,
            Mode::NewStrand(m) => m,
        }
    }
}

/// Owns the active mode and routes input to it.
#[derive(Debug)]
pub struct ModeManager {
    mode: Mode,
}

impl Default for ModeManager {
    fn default() -> Self {
        Self {
            mode: Mode::Attach(AttachMode::new()),
        }
    }
}

impl ModeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> ModeKind {
        self.mode.as_ref_dyn().kind()
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Switch modes, cancelling whatever the current one is doing.
    ///
    /// Mask-edit and angle-adjust work on the selected strand and fail
    /// without a suitable selection; the current mode is kept then.
    pub fn set_mode(&mut self, canvas: &mut Canvas, kind: ModeKind) -> StrandResult<()> {
        let next = match kind {
            ModeKind::Attach => Mode::Attach(AttachMode::new()),
            ModeKind::Move => Mode::Move(MoveMode::new()),
            ModeKind::Rotate => Mode::Rotate(RotateMode::new()),
            ModeKind::Mask => Mode::Mask(MaskMode::new()),
            ModeKind::NewStrand => Mode::NewStrand(NewStrandMode::new()),
            ModeKind::MaskEdit | ModeKind::AngleAdjust => {
                let selected = canvas
                    .selected()
                    .ok_or_else(|| StrandError::InvalidLayerName("no strand selected".to_string()))?;
                if kind == ModeKind::MaskEdit {
                    Mode::MaskEdit(MaskEditMode::enter(canvas, selected)?)
                } else {
                    Mode::AngleAdjust(AngleAdjustMode::activate(canvas, selected)?)
                }
            }
        };
        self.mode.as_dyn().cancel(canvas);
        log::debug!("Mode {:?} -> {kind:?}", self.kind());
        self.mode = next;
        Ok(())
    }

    pub fn on_press(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        if event.button != MouseButton::Left {
            return ModeOutcome::Idle;
        }
        self.mode.as_dyn().on_press(canvas, event)
    }

    pub fn on_move(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        self.mode.as_dyn().on_move(canvas, event)
    }

    pub fn on_release(&mut self, canvas: &mut Canvas, event: &PointerEvent) -> ModeOutcome {
        if event.button != MouseButton::Left {
            return ModeOutcome::Idle;
        }
        self.mode.as_dyn().on_release(canvas, event)
    }

    pub fn on_key(&mut self, canvas: &mut Canvas, key: Key) -> ModeOutcome {
        self.mode.as_dyn().on_key(canvas, key)
    }

    pub fn on_tick(&mut self, canvas: &mut Canvas) -> ModeOutcome {
        self.mode.as_dyn().on_tick(canvas)
    }

    pub fn wants_tick(&self) -> bool {
        self.mode.as_ref_dyn().wants_tick()
    }

    pub fn cancel(&mut self, canvas: &mut Canvas) {
        self.mode.as_dyn().cancel(canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn test_default_mode_is_attach() {
        assert_eq!(ModeManager::new().kind(), ModeKind::Attach);
    }

    #[test]
    fn test_selection_required_for_targeted_modes() {
        let mut canvas = Canvas::new();
        let mut modes = ModeManager::new();
        assert!(modes.set_mode(&mut canvas, ModeKind::AngleAdjust).is_err());
        assert_eq!(modes.kind(), ModeKind::Attach);

        canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        modes.set_mode(&mut canvas, ModeKind::AngleAdjust).unwrap();
        assert_eq!(modes.kind(), ModeKind::AngleAdjust);
        // A regular strand is not a mask.
        assert!(modes.set_mode(&mut canvas, ModeKind::MaskEdit).is_err());
        assert_eq!(modes.kind(), ModeKind::AngleAdjust);
    }

    #[test]
    fn test_switching_cancels_running_drag() {
        let mut canvas = Canvas::new();
        let mut modes = ModeManager::new();
        modes.set_mode(&mut canvas, ModeKind::NewStrand).unwrap();
        modes.on_press(&mut canvas, &PointerEvent::left(Point::new(0.0, 0.0)));
        modes.on_move(&mut canvas, &PointerEvent::left(Point::new(80.0, 0.0)));
        assert!(canvas.in_progress.is_some());

        modes.set_mode(&mut canvas, ModeKind::Move).unwrap();
        assert!(canvas.in_progress.is_none());
        assert!(canvas.is_empty());
    }

    #[test]
    fn test_right_button_is_ignored() {
        let mut canvas = Canvas::new();
        let mut modes = ModeManager::new();
        let mut event = PointerEvent::left(Point::new(0.0, 0.0));
        event.button = MouseButton::Right;
        assert_eq!(modes.on_press(&mut canvas, &event), ModeOutcome::Idle);
        assert!(canvas.in_progress.is_none());
    }
}
