//! Renderer trait abstraction.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use openstrand_core::canvas::Canvas;
use openstrand_core::paint::{LineStyle, Painter};
use openstrand_core::snap::GRID_SIZE;
use openstrand_core::strand::{End, Rgba, Strand, StrandId};
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Export failed: {0}")]
    ExportFailed(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Color of grid lines.
pub const GRID_COLOR: Rgba = Rgba::new(200, 200, 200, 100);
/// Grid line width in screen pixels.
pub const GRID_LINE_WIDTH: f64 = 0.5;

/// Label font size in canvas units.
pub const LABEL_FONT_SIZE: f32 = 12.0;
/// Width of the white outline drawn under label glyphs.
pub const LABEL_HALO_WIDTH: f64 = 6.0;

/// Grid display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    /// No grid.
    #[default]
    None,
    /// Full grid lines.
    Lines,
}

impl GridStyle {
    /// Cycle to the next grid style.
    pub fn next(self) -> Self {
        match self {
            GridStyle::None => GridStyle::Lines,
            GridStyle::Lines => GridStyle::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GridStyle::None => "None",
            GridStyle::Lines => "Lines",
        }
    }

    pub fn is_visible(self) -> bool {
        self != GridStyle::None
    }
}

/// Context for a single render frame.
pub struct RenderContext<'a> {
    /// The canvas to render.
    pub canvas: &'a Canvas,
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Current zoom level.
    pub zoom: f64,
    /// Screen-space offset of the canvas origin.
    pub pan: Vec2,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Background fill; `None` leaves the frame transparent.
    pub background_color: Option<Color>,
    pub grid_style: GridStyle,
    pub grid_size: f64,
    /// Strand being interacted with, for draw-only-affected painting.
    pub focus: Option<StrandId>,
    /// Paint each strand's layer name over it.
    pub draw_names: bool,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(canvas: &'a Canvas, viewport_size: Size) -> Self {
        Self {
            canvas,
            viewport_size,
            zoom: 1.0,
            pan: Vec2::ZERO,
            scale_factor: 1.0,
            background_color: Some(Color::from_rgba8(255, 255, 255, 255)),
            grid_style: GridStyle::None,
            grid_size: GRID_SIZE,
            focus: None,
            draw_names: false,
        }
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_pan(mut self, pan: Vec2) -> Self {
        self.pan = pan;
        self
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_background(mut self, color: Option<Color>) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_grid(mut self, style: GridStyle) -> Self {
        self.grid_style = style;
        self
    }

    pub fn with_focus(mut self, focus: Option<StrandId>) -> Self {
        self.focus = focus;
        self
    }

    pub fn with_names(mut self, draw_names: bool) -> Self {
        self.draw_names = draw_names;
        self
    }

    /// Canvas to physical pixel transform.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.scale_factor) * Affine::translate(self.pan) * Affine::scale(self.zoom)
    }

    /// Visible area in canvas coordinates.
    pub fn visible_world_rect(&self) -> Rect {
        let inv = self.transform().inverse();
        let tl = inv * Point::ZERO;
        let br = inv * Point::new(self.viewport_size.width, self.viewport_size.height);
        Rect::from_points(tl, br)
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Build the scene for a frame.
    fn build_scene(&mut self, ctx: &RenderContext);

    fn background_color(&self, ctx: &RenderContext) -> Option<Color> {
        ctx.background_color
    }
}

/// Paint grid lines covering `area`, in canvas coordinates.
pub fn paint_grid(painter: &mut dyn Painter, area: Rect, grid_size: f64, zoom: f64) {
    if grid_size <= 0.0 || area.is_zero_area() {
        return;
    }
    let style = LineStyle::solid(GRID_LINE_WIDTH / zoom.max(f64::EPSILON), GRID_COLOR);
    let start_x = (area.x0 / grid_size).floor() * grid_size;
    let start_y = (area.y0 / grid_size).floor() * grid_size;
    let end_x = (area.x1 / grid_size).ceil() * grid_size;
    let end_y = (area.y1 / grid_size).ceil() * grid_size;

    let mut x = start_x;
    while x <= end_x {
        painter.stroke_line(Point::new(x, start_y), Point::new(x, end_y), &style);
        x += grid_size;
    }
    let mut y = start_y;
    while y <= end_y {
        painter.stroke_line(Point::new(start_x, y), Point::new(end_x, y), &style);
        y += grid_size;
    }
}

/// Paint one frame through `painter`: the grid if visible, every strand in
/// layer order, then the in-progress strand.
pub fn paint_frame(painter: &mut dyn Painter, ctx: &RenderContext) {
    if ctx.grid_style.is_visible() {
        paint_grid(painter, ctx.visible_world_rect(), ctx.grid_size, ctx.zoom);
    }
    ctx.canvas.paint(painter, ctx.focus);
}

/// Where a strand's label is centered.
///
/// Masked strands use the center of their visible mask region, everything
/// else the middle of the start-end chord.
pub fn label_anchor(strand: &Strand) -> Point {
    let chord_mid = strand.endpoint(End::Start).midpoint(strand.endpoint(End::End));
    strand
        .mask()
        .and_then(|mask| mask.mask_region().bounds_center())
        .unwrap_or(chord_mid)
}

/// Layer names and label anchors, in layer order.
pub fn labels(canvas: &Canvas) -> Vec<(String, Point)> {
    canvas
        .strands()
        .map(|s| (s.layer_name().to_string(), label_anchor(s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use openstrand_core::paint::RecordingPainter;

    #[test]
    fn test_grid_style_cycle() {
        assert_eq!(GridStyle::default(), GridStyle::None);
        assert_eq!(GridStyle::None.next(), GridStyle::Lines);
        assert_eq!(GridStyle::Lines.next(), GridStyle::None);
        assert!(!GridStyle::None.is_visible());
    }

    #[test]
    fn test_visible_rect_follows_zoom_and_pan() {
        let canvas = Canvas::new();
        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0))
            .with_zoom(2.0)
            .with_pan(Vec2::new(100.0, 0.0));
        let rect = ctx.visible_world_rect();
        assert!((rect.x0 + 50.0).abs() < 1e-9);
        assert!((rect.x1 - 350.0).abs() < 1e-9);
        assert!((rect.y1 - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_lines_cover_viewport() {
        let mut painter = RecordingPainter::new();
        paint_grid(&mut painter, Rect::new(0.0, 0.0, 100.0, 40.0), 20.0, 1.0);
        // 6 vertical (0..=100) and 3 horizontal (0..=40).
        assert_eq!(painter.strokes().count(), 9);
        assert!(painter.strokes().all(|(_, s)| s.color == GRID_COLOR && s.width == GRID_LINE_WIDTH));
    }

    #[test]
    fn test_frame_without_grid_only_paints_strands() {
        let mut canvas = Canvas::new();
        let ctx_empty = RenderContext::new(&canvas, Size::new(200.0, 200.0));
        let mut painter = RecordingPainter::new();
        paint_frame(&mut painter, &ctx_empty);
        assert!(painter.ops.is_empty());

        canvas
            .create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0))
            .unwrap();
        let ctx = RenderContext::new(&canvas, Size::new(200.0, 200.0)).with_grid(GridStyle::Lines);
        let mut painter = RecordingPainter::new();
        paint_frame(&mut painter, &ctx);
        assert!(painter.strokes().any(|(_, s)| s.color == GRID_COLOR));
        assert!(painter.fills().count() > 0);
    }

    #[test]
    fn test_labels_follow_layer_order_and_mask_center() {
        let mut canvas = Canvas::new();
        let a = canvas
            .create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(200.0, 0.0))
            .unwrap();
        let b = canvas
            .create_new_strand(Some(2), Point::new(100.0, -100.0), Point::new(100.0, 100.0))
            .unwrap();
        canvas.create_mask(a, b).unwrap();

        let labels = labels(&canvas);
        let names: Vec<&str> = labels.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["1_1", "2_1", "1_1_2_1"]);
        assert_eq!(labels[0].1, Point::new(100.0, 0.0));
        assert_eq!(labels[1].1, Point::new(100.0, 0.0));
        // Both bodies are symmetric about the crossing.
        assert!(labels[2].1.distance(Point::new(100.0, 0.0)) < 1.0);
    }
}
