//! OpenStrand Render Library
//!
//! Frame and export-scene building for OpenStrand canvases.
//! The default backend paints into a Vello scene.

mod renderer;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use renderer::{
    GRID_COLOR, GRID_LINE_WIDTH, GridStyle, LABEL_FONT_SIZE, LABEL_HALO_WIDTH, RenderContext, RenderResult, Renderer,
    RendererError, label_anchor, labels, paint_frame, paint_grid,
};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::{VelloPainter, VelloRenderer};
