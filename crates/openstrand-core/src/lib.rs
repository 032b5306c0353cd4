//! OpenStrand Core Library
//!
//! Strand geometry, attachment, masking, grouping, persistence and undo
//! history. Rendering goes through the [`paint::Painter`] trait.

pub mod attach;
pub mod canvas;
pub mod editor;
pub mod error;
pub mod events;
pub mod geometry;
pub mod group;
pub mod input;
pub mod layer_state;
pub mod mask;
pub mod modes;
pub mod paint;
pub mod persistence;
pub mod settings;
pub mod snap;
pub mod strand;
pub mod undo;

pub use canvas::Canvas;
pub use editor::{Clock, Editor};
pub use error::{StrandError, StrandResult};
pub use events::{CanvasEvent, EventBus, ListenerId};
pub use geometry::{GeoRegionOps, Region, RegionOps, Spine};
pub use group::{Group, GroupOperation};
pub use input::{Key, Modifiers, MouseButton, PointerEvent};
pub use layer_state::LayerState;
pub use mask::{DeletionRect, MaskData};
pub use modes::{ModeKind, ModeManager, ModeOutcome, MutationKind};
pub use paint::{DrawContext, LineCap, LineStyle, PaintSettings, Painter, RecordingPainter};
pub use persistence::ProjectFile;
pub use settings::UserSettings;
pub use snap::{GRID_SIZE, snap_strand_end, snap_to_grid};
pub use strand::{End, Handle, Rgba, Strand, StrandId, StrandKind};
pub use undo::{HistoryBundle, SaveOutcome, UndoRedoManager, states_identical};
