//! Undo/redo over numbered state files.
//!
//! Each saved step is a project document written to
//! `{session_id}_{step}.json` inside a temporary directory owned by the
//! manager. Step 0 is always the empty canvas and has no file.

mod history;
mod identity;

pub use history::{HISTORY_TYPE, HISTORY_VERSION, HistoryBundle, HistoryState};
pub use identity::{POINT_TOLERANCE, RectSignature, WIDTH_TOLERANCE, states_identical, strands_identical};

use crate::canvas::Canvas;
use crate::error::{StrandError, StrandResult};
use crate::persistence::{self, ProjectFile};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

/// Saves closer together than this are checked for no-op changes.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Re-entrancy guards raised by subsystems that save on their own schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveGuards {
    pub skip_save: bool,
    pub mask_save_in_progress: bool,
    pub attach_save_in_progress: bool,
}

impl SaveGuards {
    pub fn any(&self) -> bool {
        self.skip_save || self.mask_save_in_progress || self.attach_save_in_progress
    }
}

/// Why a save did not produce a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A guard was raised.
    Guarded,
    /// The canvas is empty and nothing was saved yet.
    EmptyCanvas,
    /// Identical to the current step within the debounce window.
    Unchanged,
}

/// What [`UndoRedoManager::save_state_at`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(usize),
    /// The state reverted the last step within the debounce window; that
    /// step was dropped and the counters now point at the given step.
    RolledBack(usize),
    Skipped(SkipReason),
}

fn new_session_id(previous: u128) -> u128 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    now.max(previous + 1)
}

/// The empty canvas, keeping the flags of `like`.
fn empty_state(like: &ProjectFile) -> ProjectFile {
    ProjectFile {
        locked_layers: like.locked_layers.clone(),
        lock_mode: like.lock_mode,
        shadow_enabled: like.shadow_enabled,
        show_control_points: like.show_control_points,
        ..ProjectFile::default()
    }
}

/// Step-numbered undo history for one canvas.
#[derive(Debug)]
pub struct UndoRedoManager {
    dir: TempDir,
    session_id: u128,
    current_step: usize,
    max_step: usize,
    last_save: Option<Instant>,
    pub guards: SaveGuards,
}

impl UndoRedoManager {
    /// Create a manager with a fresh temporary directory.
    pub fn new() -> StrandResult<Self> {
        let dir = tempfile::Builder::new().prefix("openstrand-undo-").tempdir().map_err(|e| {
            log::error!("Cannot create undo directory: {e}");
            StrandError::PersistenceIo(format!("Failed to create undo directory: {e}"))
        })?;
        log::debug!("Undo states live in {}", dir.path().display());
        Ok(Self {
            dir,
            session_id: new_session_id(0),
            current_step: 0,
            max_step: 0,
            last_save: None,
            guards: SaveGuards::default(),
        })
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn max_step(&self) -> usize {
        self.max_step
    }

    pub fn can_undo(&self) -> bool {
        self.current_step > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current_step < self.max_step
    }

    pub fn session_id(&self) -> u128 {
        self.session_id
    }

    pub fn temp_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the file holding `step`.
    pub fn state_path(&self, step: usize) -> PathBuf {
        self.dir.path().join(format!("{}_{step}.json", self.session_id))
    }

    fn write_state(&self, step: usize, state: &ProjectFile) -> StrandResult<()> {
        let json = serde_json::to_string(state)?;
        let path = self.state_path(step);
        let partial = path.with_extension("json.partial");
        fs::write(&partial, json)
            .and_then(|()| fs::rename(&partial, &path))
            .map_err(|e| {
                log::error!("Failed to write undo state {}: {e}", path.display());
                StrandError::PersistenceIo(format!("Failed to write {}: {e}", path.display()))
            })
    }

    fn read_state(&self, step: usize) -> StrandResult<ProjectFile> {
        let invalid = |reason: String| StrandError::InvalidStateFile { step, reason };
        let json = fs::read_to_string(self.state_path(step)).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| invalid(e.to_string()))
    }

    /// The state saved at `step`; step 0 is the empty canvas with the flags of `like`.
    fn state_at(&self, step: usize, like: &ProjectFile) -> StrandResult<ProjectFile> {
        if step == 0 {
            Ok(empty_state(like))
        } else {
            self.read_state(step)
        }
    }

    fn step_matches(&self, step: usize, state: &ProjectFile) -> bool {
        self.state_at(step, state)
            .map(|saved| states_identical(state, &saved))
            .unwrap_or(false)
    }

    fn remove_step(&self, step: usize) {
        if let Err(e) = fs::remove_file(self.state_path(step)) {
            log::debug!("Could not remove undo state {step}: {e}");
        }
    }

    /// Save the canvas as a new step, using the current time.
    pub fn save_state(&mut self, canvas: &Canvas) -> StrandResult<SaveOutcome> {
        self.save_state_at(canvas, Instant::now())
    }

    /// Save the canvas as a new step at time `now`.
    ///
    /// Skipped while a guard is raised, and for an empty canvas before the
    /// first save. Within [`SAVE_DEBOUNCE`] of the previous save a state
    /// identical to the current step is dropped, and a state identical to
    /// the step before it rolls the last step back.
    pub fn save_state_at(&mut self, canvas: &Canvas, now: Instant) -> StrandResult<SaveOutcome> {
        if self.guards.any() {
            log::debug!("Skipping save while guarded: {:?}", self.guards);
            return Ok(SaveOutcome::Skipped(SkipReason::Guarded));
        }
        self.finalize_save_at(canvas, now)
    }

    /// Save at the end of a guarded operation. Guards do not apply; the
    /// debounce rules do.
    pub fn finalize_save_at(&mut self, canvas: &Canvas, now: Instant) -> StrandResult<SaveOutcome> {
        let state = persistence::to_project(canvas);
        if state.strands.is_empty() && self.current_step == 0 {
            log::debug!("Skipping save of an empty canvas at step 0");
            return Ok(SaveOutcome::Skipped(SkipReason::EmptyCanvas));
        }

        let recent = self.last_save.is_some_and(|t| now.saturating_duration_since(t) < SAVE_DEBOUNCE);
        if recent {
            if self.step_matches(self.current_step, &state) {
                log::debug!("Skipping save: identical to step {}", self.current_step);
                return Ok(SaveOutcome::Skipped(SkipReason::Unchanged));
            }
            if self.current_step > 0
                && self.current_step == self.max_step
                && self.step_matches(self.current_step - 1, &state)
            {
                self.remove_step(self.current_step);
                self.current_step -= 1;
                self.max_step = self.current_step;
                self.last_save = Some(now);
                log::info!("Change reverted within debounce, back at step {}", self.current_step);
                return Ok(SaveOutcome::RolledBack(self.current_step));
            }
        }

        let step = self.current_step + 1;
        self.write_state(step, &state)?;
        for stale in step + 1..=self.max_step {
            self.remove_step(stale);
        }
        self.current_step = step;
        self.max_step = step;
        self.last_save = Some(now);
        log::info!("Saved state {step} ({} strands)", state.strands.len());
        Ok(SaveOutcome::Saved(step))
    }

    fn apply(&self, canvas: &mut Canvas, state: &ProjectFile, step: usize) -> StrandResult<()> {
        persistence::apply_project(canvas, state).map_err(|e| StrandError::InvalidStateFile {
            step,
            reason: e.to_string(),
        })
    }

    /// Step back, skipping steps that look the same as the canvas.
    ///
    /// Returns `false` at step 0. On a bad state file the counters and the
    /// canvas are left as they were.
    pub fn undo(&mut self, canvas: &mut Canvas) -> StrandResult<bool> {
        if self.current_step == 0 {
            return Ok(false);
        }
        let before = persistence::to_project(canvas);
        let mut target = self.current_step - 1;
        let state = loop {
            let state = self
                .state_at(target, &before)
                .inspect_err(|e| log::error!("Undo failed, staying at step {}: {e}", self.current_step))?;
            if target > 0 && states_identical(&state, &before) {
                log::debug!("Undo skips no-op step {target}");
                target -= 1;
                continue;
            }
            break state;
        };
        self.apply(canvas, &state, target)
            .inspect_err(|e| log::error!("Undo failed, staying at step {}: {e}", self.current_step))?;
        self.current_step = target;
        self.last_save = None;
        log::info!("Undo to step {target} of {}", self.max_step);
        Ok(true)
    }

    /// Step forward, skipping steps that look the same as the canvas.
    pub fn redo(&mut self, canvas: &mut Canvas) -> StrandResult<bool> {
        if self.current_step >= self.max_step {
            return Ok(false);
        }
        let before = persistence::to_project(canvas);
        let mut target = self.current_step + 1;
        let state = loop {
            let state = self
                .state_at(target, &before)
                .inspect_err(|e| log::error!("Redo failed, staying at step {}: {e}", self.current_step))?;
            if target < self.max_step && states_identical(&state, &before) {
                log::debug!("Redo skips no-op step {target}");
                target += 1;
                continue;
            }
            break state;
        };
        self.apply(canvas, &state, target)
            .inspect_err(|e| log::error!("Redo failed, staying at step {}: {e}", self.current_step))?;
        self.current_step = target;
        self.last_save = None;
        log::info!("Redo to step {target} of {}", self.max_step);
        Ok(true)
    }

    fn remove_state_files(&self) -> StrandResult<()> {
        for entry in fs::read_dir(self.dir.path())?.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Forget every step. With `save_current` the canvas becomes step 1.
    pub fn clear_history(&mut self, canvas: &Canvas, save_current: bool) -> StrandResult<()> {
        self.remove_state_files()?;
        self.session_id = new_session_id(self.session_id);
        self.current_step = 0;
        self.max_step = 0;
        self.last_save = None;
        log::info!("History cleared");
        if save_current {
            self.finalize_save_at(canvas, Instant::now())?;
        }
        Ok(())
    }

    /// Remove the temporary directory.
    pub fn cleanup(self) -> StrandResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| {
            log::error!("Failed to remove undo directory {}: {e}", path.display());
            StrandError::PersistenceIo(format!("Failed to remove {}: {e}", path.display()))
        })
    }

    /// Bundle every step. The canvas is saved first when it differs from
    /// the current step.
    pub fn export_history(&mut self, canvas: &Canvas) -> StrandResult<HistoryBundle> {
        let current = persistence::to_project(canvas);
        if !self.step_matches(self.current_step, &current) {
            self.last_save = None;
            self.finalize_save_at(canvas, Instant::now())?;
        }
        let states = (1..=self.max_step)
            .map(|step| Ok(HistoryState { step, data: self.read_state(step)? }))
            .collect::<StrandResult<Vec<_>>>()?;
        log::info!("Exported {} history states", states.len());
        Ok(HistoryBundle::new(self.current_step, self.max_step, states))
    }

    pub fn export_history_to(&mut self, canvas: &Canvas, path: &Path) -> StrandResult<()> {
        self.export_history(canvas)?.write(path)
    }

    /// Replace the history with `bundle` and load its current step.
    ///
    /// A bundle that fails validation is refused before anything changes.
    pub fn import_history(&mut self, canvas: &mut Canvas, bundle: &HistoryBundle) -> StrandResult<()> {
        bundle.validate().inspect_err(|e| log::error!("Refusing history import: {e}"))?;
        let mut states: Vec<&HistoryState> = bundle.states.iter().collect();
        states.sort_by_key(|s| s.step);

        self.remove_state_files()?;
        self.session_id = new_session_id(self.session_id);
        for (i, state) in states.iter().enumerate() {
            self.write_state(i + 1, &state.data)?;
        }
        self.max_step = states.len();
        self.current_step = bundle.current_step.min(self.max_step);
        self.last_save = None;

        let like = persistence::to_project(canvas);
        let state = self.state_at(self.current_step, &like)?;
        self.apply(canvas, &state, self.current_step)?;
        log::info!("Imported {} history states, at step {}", self.max_step, self.current_step);
        Ok(())
    }

    pub fn import_history_from(&mut self, canvas: &mut Canvas, path: &Path) -> StrandResult<()> {
        let bundle = HistoryBundle::read(path)?;
        self.import_history(canvas, &bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    fn add(canvas: &mut Canvas, set: i32) {
        let y = set as f64 * 80.0;
        canvas.create_new_strand(Some(set), Point::new(0.0, y), Point::new(100.0, y)).unwrap();
    }

    #[test]
    fn test_first_empty_save_is_skipped() {
        let mut undo = UndoRedoManager::new().unwrap();
        let canvas = Canvas::new();
        assert_eq!(undo.save_state(&canvas).unwrap(), SaveOutcome::Skipped(SkipReason::EmptyCanvas));
        assert_eq!(undo.max_step(), 0);
    }

    #[test]
    fn test_guards_suppress_save() {
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        add(&mut canvas, 1);
        undo.guards.attach_save_in_progress = true;
        assert_eq!(undo.save_state(&canvas).unwrap(), SaveOutcome::Skipped(SkipReason::Guarded));
        assert_eq!(undo.finalize_save_at(&canvas, Instant::now()).unwrap(), SaveOutcome::Saved(1));
        assert!(undo.state_path(1).exists());
    }

    #[test]
    fn test_identity_diff_skips_noop_save() {
        let t0 = Instant::now();
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        add(&mut canvas, 1);
        undo.save_state_at(&canvas, t0).unwrap();
        let s1 = persistence::to_project(&canvas);

        canvas.set_shadow_enabled(false);
        undo.save_state_at(&canvas, at(t0, 1000)).unwrap();
        canvas.set_shadow_enabled(true);
        let outcome = undo.save_state_at(&canvas, at(t0, 1300)).unwrap();

        assert_eq!(outcome, SaveOutcome::RolledBack(1));
        assert!(undo.max_step() <= 2);
        assert_eq!(undo.current_step(), 1);
        assert!(states_identical(&s1, &persistence::to_project(&canvas)));
        assert!(!undo.state_path(2).exists());

        assert_eq!(
            undo.save_state_at(&canvas, at(t0, 1400)).unwrap(),
            SaveOutcome::Skipped(SkipReason::Unchanged)
        );
    }

    #[test]
    fn test_undo_through_empty_step() {
        let t0 = Instant::now();
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        add(&mut canvas, 1);
        undo.save_state_at(&canvas, t0).unwrap();
        let id = canvas.id_of("1_1").unwrap();
        canvas.delete_strand(id).unwrap();
        assert_eq!(undo.save_state_at(&canvas, at(t0, 1000)).unwrap(), SaveOutcome::Saved(2));

        assert!(undo.undo(&mut canvas).unwrap());
        assert!(canvas.by_name("1_1").is_some());
        assert!(undo.undo(&mut canvas).unwrap());
        assert!(canvas.is_empty());
        assert_eq!(undo.current_step(), 0);
        assert!(!undo.undo(&mut canvas).unwrap());
        assert!(undo.can_redo());
    }

    #[test]
    fn test_k_mutations_then_k_undos_restore_start() {
        let t0 = Instant::now();
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        add(&mut canvas, 1);
        undo.save_state_at(&canvas, t0).unwrap();
        let start = persistence::to_project(&canvas);

        add(&mut canvas, 2);
        undo.save_state_at(&canvas, at(t0, 1000)).unwrap();
        let main = canvas.id_of("1_1").unwrap();
        canvas.move_endpoint(main, crate::strand::End::End, Point::new(140.0, 120.0));
        undo.save_state_at(&canvas, at(t0, 2000)).unwrap();
        canvas.set_show_control_points(true);
        undo.save_state_at(&canvas, at(t0, 3000)).unwrap();

        for _ in 0..3 {
            assert!(undo.undo(&mut canvas).unwrap());
        }
        assert!(states_identical(&start, &persistence::to_project(&canvas)));

        for _ in 0..3 {
            assert!(undo.redo(&mut canvas).unwrap());
        }
        assert!(canvas.show_control_points);
        assert!(!undo.can_redo());
    }

    #[test]
    fn test_undo_skips_duplicate_steps() {
        let t0 = Instant::now();
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        add(&mut canvas, 1);
        undo.save_state_at(&canvas, t0).unwrap();
        undo.save_state_at(&canvas, at(t0, 2000)).unwrap();
        assert_eq!(undo.max_step(), 2);

        assert!(undo.undo(&mut canvas).unwrap());
        assert_eq!(undo.current_step(), 0);
        assert!(canvas.is_empty());
    }

    #[test]
    fn test_new_save_truncates_redo() {
        let t0 = Instant::now();
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        add(&mut canvas, 1);
        undo.save_state_at(&canvas, t0).unwrap();
        add(&mut canvas, 2);
        undo.save_state_at(&canvas, at(t0, 1000)).unwrap();
        undo.undo(&mut canvas).unwrap();

        add(&mut canvas, 3);
        assert_eq!(undo.save_state_at(&canvas, at(t0, 1100)).unwrap(), SaveOutcome::Saved(2));
        assert_eq!(undo.max_step(), 2);
        assert!(!undo.can_redo());
    }

    #[test]
    fn test_invalid_state_file_keeps_counters() {
        let t0 = Instant::now();
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        add(&mut canvas, 1);
        undo.save_state_at(&canvas, t0).unwrap();
        add(&mut canvas, 2);
        undo.save_state_at(&canvas, at(t0, 1000)).unwrap();
        fs::write(undo.state_path(1), "{ broken").unwrap();

        let result = undo.undo(&mut canvas);
        assert!(matches!(result, Err(StrandError::InvalidStateFile { step: 1, .. })));
        assert_eq!(undo.current_step(), 2);
        assert_eq!(canvas.len(), 2);
    }

    #[test]
    fn test_history_round_trip() {
        let t0 = Instant::now();
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        let mut snapshots = Vec::new();
        for set in 1..=5 {
            add(&mut canvas, set);
            undo.save_state_at(&canvas, at(t0, set as u64 * 1000)).unwrap();
            snapshots.push(persistence::to_project(&canvas));
        }
        undo.undo(&mut canvas).unwrap();
        let bundle = undo.export_history(&canvas).unwrap();
        assert_eq!((bundle.current_step, bundle.max_step), (4, 5));

        let mut fresh_canvas = Canvas::new();
        let mut fresh = UndoRedoManager::new().unwrap();
        fresh.import_history(&mut fresh_canvas, &bundle).unwrap();
        assert_eq!((fresh.current_step(), fresh.max_step()), (4, 5));
        assert!(states_identical(&snapshots[3], &persistence::to_project(&fresh_canvas)));

        for step in 1..=5 {
            assert!(states_identical(&fresh.read_state(step).unwrap(), &snapshots[step - 1]));
        }
        fresh.redo(&mut fresh_canvas).unwrap();
        assert!(states_identical(&snapshots[4], &persistence::to_project(&fresh_canvas)));
        for expected in snapshots.iter().rev().skip(1) {
            fresh.undo(&mut fresh_canvas).unwrap();
            assert!(states_identical(expected, &persistence::to_project(&fresh_canvas)));
        }
    }

    #[test]
    fn test_corrupt_import_leaves_history_intact() {
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        add(&mut canvas, 1);
        undo.save_state(&canvas).unwrap();

        let empty = HistoryBundle::new(0, 0, Vec::new());
        let result = undo.import_history(&mut canvas, &empty);
        assert!(matches!(result, Err(StrandError::HistoryCorrupt(_))));
        assert_eq!(undo.max_step(), 1);
        assert!(undo.state_path(1).exists());
        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn test_clear_history_and_cleanup() {
        let mut undo = UndoRedoManager::new().unwrap();
        let mut canvas = Canvas::new();
        add(&mut canvas, 1);
        undo.save_state(&canvas).unwrap();
        let old_session = undo.session_id();

        undo.clear_history(&canvas, true).unwrap();
        assert_ne!(undo.session_id(), old_session);
        assert_eq!((undo.current_step(), undo.max_step()), (1, 1));
        assert!(!undo.can_undo() || undo.current_step() == 1);

        let dir = undo.temp_dir().to_path_buf();
        undo.cleanup().unwrap();
        assert!(!dir.exists());
    }
}
