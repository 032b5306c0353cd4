//! The editing session: canvas, active mode and undo history wired together.
//!
//! Every user operation ends at a mutation boundary where one undo state is
//! saved. Attach and mask operations save through a delayed finalize-save
//! and hold guards that swallow competing saves until it fires and for a
//! short while after.

use crate::canvas::Canvas;
use crate::error::{StrandError, StrandResult};
use crate::group::GroupOperation;
use crate::input::{Key, PointerEvent};
use crate::modes::{ModeKind, ModeManager, ModeOutcome, MOVE_TICK, MutationKind};
use crate::persistence;
use crate::undo::{SaveOutcome, UndoRedoManager};
use kurbo::{Point, Vec2};
use std::path::Path;
use std::time::{Duration, Instant};

/// Delay between an attach/mask release and its save.
pub const FINALIZE_SAVE_DELAY: Duration = Duration::from_millis(100);

/// How long the guards stay up after the finalize-save.
pub const SAVE_GUARD_HOLD: Duration = Duration::from_millis(250);

/// Ticks run per [`Editor::tick`] at most.
const MAX_TICKS_PER_CALL: u32 = 64;

/// Time source of an editor.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    /// A clock that only moves when told to.
    Manual(Instant),
}

impl Clock {
    pub fn now(&self) -> Instant {
        match self {
            Clock::System => Instant::now(),
            Clock::Manual(t) => *t,
        }
    }

    pub fn advance(&mut self, by: Duration) {
        if let Clock::Manual(t) = self {
            *t += by;
        }
    }
}

/// A canvas with its modes and history.
#[derive(Debug)]
pub struct Editor {
    pub canvas: Canvas,
    undo: UndoRedoManager,
    modes: ModeManager,
    clock: Clock,
    pending_finalize: Option<Instant>,
    guard_release: Option<Instant>,
    last_mode_tick: Option<Instant>,
}

impl Editor {
    pub fn new() -> StrandResult<Self> {
        Self::with_clock(Clock::System)
    }

    pub fn with_clock(clock: Clock) -> StrandResult<Self> {
        Ok(Self {
            canvas: Canvas::new(),
            undo: UndoRedoManager::new()?,
            modes: ModeManager::new(),
            clock,
            pending_finalize: None,
            guard_release: None,
            last_mode_tick: None,
        })
    }

    pub fn undo_manager(&self) -> &UndoRedoManager {
        &self.undo
    }

    pub fn mode(&self) -> ModeKind {
        self.modes.kind()
    }

    pub fn modes(&self) -> &ModeManager {
        &self.modes
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Move a manual clock forward and run whatever became due.
    pub fn advance(&mut self, by: Duration) -> StrandResult<()> {
        self.clock.advance(by);
        self.tick()
    }

    pub fn set_mode(&mut self, kind: ModeKind) -> StrandResult<()> {
        self.last_mode_tick = None;
        self.modes.set_mode(&mut self.canvas, kind)
    }

    pub fn pointer_press(&mut self, event: &PointerEvent) -> StrandResult<ModeOutcome> {
        let outcome = self.modes.on_press(&mut self.canvas, event);
        self.handle_outcome(outcome)
    }

    pub fn pointer_move(&mut self, event: &PointerEvent) -> StrandResult<ModeOutcome> {
        let outcome = self.modes.on_move(&mut self.canvas, event);
        if self.modes.wants_tick() && self.last_mode_tick.is_none() {
            self.last_mode_tick = Some(self.clock.now());
        }
        self.handle_outcome(outcome)
    }

    pub fn pointer_release(&mut self, event: &PointerEvent) -> StrandResult<ModeOutcome> {
        let outcome = self.modes.on_release(&mut self.canvas, event);
        self.last_mode_tick = None;
        self.handle_outcome(outcome)
    }

    pub fn key(&mut self, key: Key) -> StrandResult<ModeOutcome> {
        let outcome = self.modes.on_key(&mut self.canvas, key);
        self.handle_outcome(outcome)
    }

    /// Run timers: mode animation ticks, the pending finalize-save and the
    /// guard release.
    pub fn tick(&mut self) -> StrandResult<()> {
        let now = self.clock.now();
        if let Some(mut last) = self.last_mode_tick {
            let mut ticks = 0;
            while self.modes.wants_tick() && now.saturating_duration_since(last) >= MOVE_TICK && ticks < MAX_TICKS_PER_CALL
            {
                self.modes.on_tick(&mut self.canvas);
                last += MOVE_TICK;
                ticks += 1;
            }
            self.last_mode_tick = self.modes.wants_tick().then_some(last);
        }
        if self.pending_finalize.is_some_and(|at| now >= at) {
            self.pending_finalize = None;
            self.undo.finalize_save_at(&self.canvas, now)?;
            self.guard_release = Some(now + SAVE_GUARD_HOLD);
        }
        if self.pending_finalize.is_none() && self.guard_release.is_some_and(|at| now >= at) {
            self.guard_release = None;
            self.undo.guards.attach_save_in_progress = false;
            self.undo.guards.mask_save_in_progress = false;
            log::debug!("Save guards released");
        }
        Ok(())
    }

    fn handle_outcome(&mut self, outcome: ModeOutcome) -> StrandResult<ModeOutcome> {
        match outcome {
            ModeOutcome::Commit(kind) => {
                self.commit(kind)?;
                if kind == MutationKind::AngleAdjust {
                    self.set_mode(ModeKind::default())?;
                }
            }
            ModeOutcome::Exit => self.set_mode(ModeKind::default())?,
            ModeOutcome::Idle | ModeOutcome::Changed | ModeOutcome::Cancelled => {}
        }
        Ok(outcome)
    }

    fn commit(&mut self, kind: MutationKind) -> StrandResult<()> {
        match kind {
            MutationKind::Attach | MutationKind::NewStrand => {
                self.undo.guards.attach_save_in_progress = true;
                self.schedule_finalize();
                Ok(())
            }
            MutationKind::Mask => {
                self.undo.guards.mask_save_in_progress = true;
                self.schedule_finalize();
                Ok(())
            }
            MutationKind::Move | MutationKind::Rotate | MutationKind::MaskEdit | MutationKind::AngleAdjust => {
                self.save().map(|_| ())
            }
        }
    }

    /// One finalize-save per operation; a second release inside the window
    /// shares it.
    fn schedule_finalize(&mut self) {
        if self.pending_finalize.is_none() {
            self.pending_finalize = Some(self.clock.now() + FINALIZE_SAVE_DELAY);
        }
    }

    /// Save the canvas as an undo state now.
    pub fn save(&mut self) -> StrandResult<SaveOutcome> {
        let now = self.clock.now();
        self.undo.save_state_at(&self.canvas, now)
    }

    /// Fire a pending finalize-save immediately.
    fn flush_pending(&mut self) -> StrandResult<()> {
        if self.pending_finalize.take().is_some() {
            let now = self.clock.now();
            self.undo.finalize_save_at(&self.canvas, now)?;
            self.guard_release = Some(now + SAVE_GUARD_HOLD);
        }
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.pending_finalize.is_some() || self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.pending_finalize.is_none() && self.undo.can_redo()
    }

    pub fn undo(&mut self) -> StrandResult<bool> {
        self.modes.cancel(&mut self.canvas);
        self.flush_pending()?;
        self.undo.undo(&mut self.canvas)
    }

    pub fn redo(&mut self) -> StrandResult<bool> {
        self.modes.cancel(&mut self.canvas);
        self.flush_pending()?;
        self.undo.redo(&mut self.canvas)
    }

    pub fn create_new_strand(&mut self, set_number: Option<i32>, start: Point, end: Point) -> StrandResult<()> {
        self.canvas.create_new_strand(set_number, start, end)?;
        self.save().map(|_| ())
    }

    pub fn delete_selected(&mut self) -> StrandResult<bool> {
        let Some(id) = self.canvas.selected() else {
            return Ok(false);
        };
        self.canvas.delete_strand(id)?;
        self.save()?;
        Ok(true)
    }

    pub fn toggle_shadow(&mut self) -> StrandResult<SaveOutcome> {
        let enabled = !self.canvas.shadow_enabled;
        self.canvas.set_shadow_enabled(enabled);
        self.save()
    }

    pub fn toggle_control_points(&mut self) -> StrandResult<SaveOutcome> {
        let show = !self.canvas.show_control_points;
        self.canvas.set_show_control_points(show);
        self.save()
    }

    pub fn set_lock_mode(&mut self, lock_mode: bool) -> StrandResult<SaveOutcome> {
        self.canvas.set_lock_mode(lock_mode);
        self.save()
    }

    pub fn toggle_locked_layer(&mut self, index: usize) -> StrandResult<SaveOutcome> {
        self.canvas.toggle_locked_layer(index);
        self.save()
    }

    pub fn move_layer(&mut self, from: usize, to: usize) -> StrandResult<bool> {
        if !self.canvas.move_layer(from, to) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Remove every deletion rectangle of the named mask.
    pub fn reset_mask(&mut self, layer: &str) -> StrandResult<()> {
        let id = self
            .canvas
            .id_of(layer)
            .ok_or_else(|| StrandError::InvalidLayerName(layer.to_string()))?;
        self.canvas.reset_mask(id)?;
        self.save().map(|_| ())
    }

    pub fn create_group(&mut self, name: &str, layers: &[&str]) -> StrandResult<()> {
        self.canvas.create_group(name, layers)?;
        self.save().map(|_| ())
    }

    pub fn delete_group(&mut self, name: &str) -> StrandResult<()> {
        self.canvas.delete_group(name)?;
        self.save().map(|_| ())
    }

    /// Start a live group drag. Feed it to [`Canvas::rotate_group`] or
    /// [`Canvas::translate_group`], then close it with [`Editor::finish_group_operation`].
    pub fn begin_group_operation(&self, name: &str) -> StrandResult<GroupOperation> {
        self.canvas.begin_group_operation(name)
    }

    pub fn finish_group_operation(&mut self, op: GroupOperation) -> StrandResult<()> {
        self.canvas.finish_group_operation(op);
        self.save().map(|_| ())
    }

    /// Rotate a group by `degrees` as one undoable step.
    pub fn rotate_group(&mut self, name: &str, degrees: f64) -> StrandResult<()> {
        let op = self.canvas.begin_group_operation(name)?;
        self.canvas.rotate_group(&op, degrees);
        self.finish_group_operation(op)
    }

    /// Translate a group as one undoable step.
    pub fn translate_group(&mut self, name: &str, delta: Vec2) -> StrandResult<()> {
        let op = self.canvas.begin_group_operation(name)?;
        self.canvas.translate_group(&op, delta);
        self.finish_group_operation(op)
    }

    /// Load a project and start a fresh history with it as step 1.
    pub fn open_project(&mut self, path: &Path) -> StrandResult<()> {
        self.modes.cancel(&mut self.canvas);
        persistence::load(&mut self.canvas, path)?;
        self.pending_finalize = None;
        self.undo.clear_history(&self.canvas, true)
    }

    pub fn save_project(&mut self, path: &Path) -> StrandResult<()> {
        self.flush_pending()?;
        persistence::save(&self.canvas, path)
    }

    pub fn export_history(&mut self, path: &Path) -> StrandResult<()> {
        self.flush_pending()?;
        self.undo.export_history_to(&self.canvas, path)
    }

    pub fn import_history(&mut self, path: &Path) -> StrandResult<()> {
        self.modes.cancel(&mut self.canvas);
        self.pending_finalize = None;
        self.undo.import_history_from(&mut self.canvas, path)
    }

    pub fn clear_history(&mut self) -> StrandResult<()> {
        self.pending_finalize = None;
        self.undo.clear_history(&self.canvas, true)
    }

    /// Remove the undo directory.
    pub fn close(self) -> StrandResult<()> {
        self.undo.cleanup()
    }
}
