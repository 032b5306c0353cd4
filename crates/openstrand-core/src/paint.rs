//! Painter operations and the drawing of strands.
//!
//! Backends implement [`Painter`]; everything here is expressed in canvas
//! coordinates.

use crate::canvas::Canvas;
use crate::geometry::{self, unit_or_zero};
use crate::settings::UserSettings;
use crate::strand::{End, Rgba, Strand, StrandId};
use kurbo::{BezPath, Circle, Line, Point, Rect, Shape, Vec2};

/// Distance between an endpoint and its arrowhead.
pub const ARROW_GAP: f64 = 10.0;

/// Radius of control point handles.
const HANDLE_RADIUS: f64 = 5.0;

/// Cap style of stroked lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
}

/// How a path is stroked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub width: f64,
    pub color: Rgba,
    pub cap: LineCap,
    /// Dash and gap lengths.
    pub dash: Option<(f64, f64)>,
}

impl LineStyle {
    pub fn solid(width: f64, color: Rgba) -> Self {
        Self {
            width,
            color,
            cap: LineCap::Butt,
            dash: None,
        }
    }

    pub fn with_cap(mut self, cap: LineCap) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_dash(mut self, dash: f64, gap: f64) -> Self {
        self.dash = Some((dash, gap));
        self
    }
}

/// Drawing operations a rendering backend provides.
pub trait Painter {
    /// Fill a closed path (non-zero winding).
    fn fill_path(&mut self, path: &BezPath, color: Rgba);

    /// Stroke a path.
    fn stroke_path(&mut self, path: &BezPath, style: &LineStyle);

    fn fill_circle(&mut self, center: Point, radius: f64, color: Rgba) {
        self.fill_path(&Circle::new(center, radius).to_path(0.1), color);
    }

    fn stroke_line(&mut self, from: Point, to: Point, style: &LineStyle) {
        self.stroke_path(&Line::new(from, to).to_path(0.1), style);
    }
}

/// Sizes and colors used when painting strands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintSettings {
    pub shadow_color: Rgba,
    pub num_steps: u32,
    pub max_blur_radius: f64,
    pub extension_length: f64,
    pub extension_dash_count: u32,
    pub extension_dash_width: f64,
    pub arrow_head_length: f64,
    pub arrow_head_width: f64,
    pub draw_only_affected_strand: bool,
}

impl From<&UserSettings> for PaintSettings {
    fn from(settings: &UserSettings) -> Self {
        Self {
            shadow_color: settings.shadow_color,
            num_steps: settings.num_steps,
            max_blur_radius: settings.max_blur_radius,
            extension_length: settings.extension_length,
            extension_dash_count: settings.extension_dash_count,
            extension_dash_width: settings.extension_dash_width,
            arrow_head_length: settings.arrow_head_length,
            arrow_head_width: settings.arrow_head_width,
            draw_only_affected_strand: settings.draw_only_affected_strand,
        }
    }
}

impl Default for PaintSettings {
    fn default() -> Self {
        Self::from(&UserSettings::default())
    }
}

/// Canvas-wide flags for one paint pass.
#[derive(Debug, Clone, Copy)]
pub struct DrawContext<'a> {
    pub settings: &'a PaintSettings,
    pub shadow_enabled: bool,
    pub show_control_points: bool,
}

impl<'a> DrawContext<'a> {
    pub fn for_canvas(canvas: &'a Canvas) -> Self {
        Self {
            settings: &canvas.paint,
            shadow_enabled: canvas.shadow_enabled,
            show_control_points: canvas.show_control_points,
        }
    }
}

fn scale_alpha(color: Rgba, divisor: u32) -> Rgba {
    color.with_alpha((color.a as u32 / divisor.max(1)) as u8)
}

impl Strand {
    /// Paint the strand.
    ///
    /// Order: shadow, outline body, fill body, side lines, endpoint discs,
    /// then arrows and extensions. Hidden strands keep only the arrows and
    /// extensions; shadow-only strands keep only the shadow.
    pub fn draw(&self, painter: &mut dyn Painter, ctx: &DrawContext<'_>) {
        if self.is_masked() {
            self.draw_masked(painter);
            return;
        }
        let core = &self.core;
        let visibility = core.visibility;

        if ctx.shadow_enabled && core.should_draw_shadow && !visibility.is_hidden {
            self.draw_shadow(painter, ctx.settings);
        }
        if visibility.shadow_only {
            return;
        }

        if !visibility.is_hidden {
            painter.fill_path(&self.stroked_body(), core.stroke_color);
            painter.fill_path(&self.fill_body(), core.color);

            let outline = self.outline();
            let side = LineStyle::solid(core.stroke_width, core.stroke_color);
            if visibility.start_line_visible {
                painter.stroke_line(outline.side_line_start.0, outline.side_line_start.1, &side);
            }
            if visibility.end_line_visible {
                painter.stroke_line(outline.side_line_end.0, outline.side_line_end.1, &side);
            }

            for end in End::BOTH {
                if core.has_circles[end.index()] {
                    let center = self.endpoint(end);
                    let radius = core.width / 2.0;
                    painter.fill_circle(center, radius + core.stroke_width, core.circle_stroke_for(end));
                    painter.fill_circle(center, radius, core.color);
                }
            }
        }

        for end in End::BOTH {
            if visibility.extension_visible(end) {
                self.draw_extension(painter, ctx.settings, end);
            }
            if visibility.arrow_visible(end) {
                let dir = self.outward(end);
                let base = self.endpoint(end) + dir * ARROW_GAP;
                self.draw_arrow_head(painter, ctx.settings, base, dir);
            }
        }
        if visibility.full_arrow_visible {
            self.draw_full_arrow(painter, ctx.settings);
        }

        if ctx.show_control_points {
            self.draw_control_points(painter);
        }
    }

    /// Unit direction pointing away from the strand at `end`.
    fn outward(&self, end: End) -> Vec2 {
        match end {
            End::Start => -unit_or_zero(self.core.spine.start_tangent()),
            End::End => unit_or_zero(self.core.spine.end_tangent()),
        }
    }

    fn draw_shadow(&self, painter: &mut dyn Painter, settings: &PaintSettings) {
        let path = geometry::shadow_path(&self.core.spine);
        let steps = settings.num_steps.max(1);
        let base = self.core.width + 2.0 * self.core.stroke_width;
        let color = scale_alpha(self.core.shadow_color, steps);
        // Widest first so the narrower strokes darken the core.
        for step in (1..=steps).rev() {
            let width = base + settings.max_blur_radius * step as f64 / steps as f64;
            painter.stroke_path(&path, &LineStyle::solid(width, color).with_cap(LineCap::Round));
        }
    }

    fn draw_masked(&self, painter: &mut dyn Painter) {
        let Some(mask) = self.mask() else { return };
        if self.core.visibility.is_hidden {
            return;
        }
        let path = mask.mask_region().to_path();
        painter.fill_path(&path, self.core.color);
        painter.stroke_path(&path, &LineStyle::solid(self.core.stroke_width, self.core.stroke_color));
    }

    fn draw_extension(&self, painter: &mut dyn Painter, settings: &PaintSettings, end: End) {
        let count = settings.extension_dash_count.max(1);
        let dir = self.outward(end);
        let origin = self.endpoint(end);
        // Dashes and gaps share the length equally; the last gap is dropped.
        let segment = settings.extension_length / (2 * count - 1) as f64;
        let style = LineStyle::solid(settings.extension_dash_width, self.core.stroke_color);
        for i in 0..count {
            let from = origin + dir * (2.0 * i as f64 * segment);
            painter.stroke_line(from, from + dir * segment, &style);
        }
    }

    fn draw_arrow_head(&self, painter: &mut dyn Painter, settings: &PaintSettings, base: Point, dir: Vec2) {
        if dir == Vec2::ZERO {
            return;
        }
        let normal = Vec2::new(-dir.y, dir.x) * (settings.arrow_head_width / 2.0);
        let mut head = BezPath::new();
        head.move_to(base + dir * settings.arrow_head_length);
        head.line_to(base + normal);
        head.line_to(base - normal);
        head.close_path();
        painter.fill_path(&head, self.core.color);
        painter.stroke_path(&head, &LineStyle::solid(1.0, self.core.stroke_color));
    }

    fn draw_full_arrow(&self, painter: &mut dyn Painter, settings: &PaintSettings) {
        let style = LineStyle::solid(settings.extension_dash_width, self.core.stroke_color);
        painter.stroke_path(&self.core.spine.path(), &style);
        let dir = self.outward(End::End);
        self.draw_arrow_head(painter, settings, self.endpoint(End::End), dir);
    }

    fn draw_control_points(&self, painter: &mut dyn Painter) {
        let spine = &self.core.spine;
        let guide = LineStyle::solid(1.0, Rgba::new(128, 128, 128, 255)).with_dash(4.0, 4.0);
        painter.stroke_line(spine.start, spine.cp1, &guide);
        painter.stroke_line(spine.end, spine.cp2, &guide);
        let handle = Rgba::new(0, 120, 215, 255);
        painter.fill_circle(spine.cp1, HANDLE_RADIUS, handle);
        painter.fill_circle(spine.cp2, HANDLE_RADIUS, handle);
        if let (true, Some(center)) = (spine.cp_center_locked, spine.cp_center) {
            painter.fill_circle(center, HANDLE_RADIUS, Rgba::new(215, 60, 0, 255));
        }
    }
}

impl Canvas {
    /// Paint every layer in order, then the in-progress strand.
    ///
    /// With `draw_only_affected_strand` set and a `focus`, only that strand
    /// is painted.
    pub fn paint(&self, painter: &mut dyn Painter, focus: Option<StrandId>) {
        let ctx = DrawContext::for_canvas(self);
        let only = focus.filter(|_| self.paint.draw_only_affected_strand);
        for strand in self.strands() {
            if only.is_some_and(|id| id != strand.id()) {
                continue;
            }
            strand.draw(painter, &ctx);
        }
        if let Some(strand) = &self.in_progress {
            strand.draw(painter, &ctx);
        }
    }
}

/// One recorded painter call.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    Fill { bounds: Rect, color: Rgba },
    Stroke { bounds: Rect, style: LineStyle },
}

/// A painter that records calls; used by tests and headless tools.
#[derive(Debug, Clone, Default)]
pub struct RecordingPainter {
    pub ops: Vec<PaintOp>,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fills(&self) -> impl Iterator<Item = (&Rect, &Rgba)> {
        self.ops.iter().filter_map(|op| match op {
            PaintOp::Fill { bounds, color } => Some((bounds, color)),
            _ => None,
        })
    }

    pub fn strokes(&self) -> impl Iterator<Item = (&Rect, &LineStyle)> {
        self.ops.iter().filter_map(|op| match op {
            PaintOp::Stroke { bounds, style } => Some((bounds, style)),
            _ => None,
        })
    }
}

impl Painter for RecordingPainter {
    fn fill_path(&mut self, path: &BezPath, color: Rgba) {
        self.ops.push(PaintOp::Fill {
            bounds: path.bounding_box(),
            color,
        });
    }

    fn stroke_path(&mut self, path: &BezPath, style: &LineStyle) {
        self.ops.push(PaintOp::Stroke {
            bounds: path.bounding_box(),
            style: *style,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strand() -> Strand {
        let mut s = Strand::straight("1_1", 1, Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        s.core.width = 20.0;
        s.core.color = Rgba::new(200, 0, 0, 255);
        s.update_shape();
        s
    }

    fn settings() -> PaintSettings {
        PaintSettings::default()
    }

    #[test]
    fn test_paint_order() {
        let settings = settings();
        let ctx = DrawContext {
            settings: &settings,
            shadow_enabled: true,
            show_control_points: false,
        };
        let mut s = strand();
        s.core.has_circles = [true, false];
        let mut painter = RecordingPainter::new();
        s.draw(&mut painter, &ctx);

        // Three shadow strokes, then the two bodies.
        assert!(matches!(painter.ops[0], PaintOp::Stroke { style, .. } if style.color.a == 50));
        assert!(matches!(painter.ops[2], PaintOp::Stroke { .. }));
        assert!(matches!(painter.ops[3], PaintOp::Fill { color, .. } if color == Rgba::black()));
        assert!(matches!(painter.ops[4], PaintOp::Fill { color, .. } if color == Rgba::new(200, 0, 0, 255)));
        // Two side lines and one disc (outer + inner).
        assert_eq!(painter.strokes().count(), 5);
        assert_eq!(painter.fills().count(), 4);
    }

    #[test]
    fn test_shadow_respects_flags() {
        let settings = settings();
        let ctx = DrawContext {
            settings: &settings,
            shadow_enabled: false,
            show_control_points: false,
        };
        let mut painter = RecordingPainter::new();
        strand().draw(&mut painter, &ctx);
        assert!(matches!(painter.ops[0], PaintOp::Fill { .. }));

        let ctx = DrawContext { shadow_enabled: true, ..ctx };
        let mut s = strand();
        s.core.should_draw_shadow = false;
        let mut painter = RecordingPainter::new();
        s.draw(&mut painter, &ctx);
        assert!(matches!(painter.ops[0], PaintOp::Fill { .. }));
    }

    #[test]
    fn test_hidden_strand_keeps_arrows() {
        let settings = settings();
        let ctx = DrawContext {
            settings: &settings,
            shadow_enabled: true,
            show_control_points: false,
        };
        let mut s = strand();
        s.core.visibility.is_hidden = true;
        s.core.visibility.end_arrow_visible = true;
        let mut painter = RecordingPainter::new();
        s.draw(&mut painter, &ctx);
        // Arrow head fill plus its outline only.
        assert_eq!(painter.ops.len(), 2);
        let (bounds, _) = painter.fills().next().unwrap();
        assert!((bounds.x0 - 110.0).abs() < 1e-9);
        assert!((bounds.x1 - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_shadow_only() {
        let settings = settings();
        let ctx = DrawContext {
            settings: &settings,
            shadow_enabled: true,
            show_control_points: false,
        };
        let mut s = strand();
        s.core.visibility.shadow_only = true;
        let mut painter = RecordingPainter::new();
        s.draw(&mut painter, &ctx);
        assert_eq!(painter.ops.len(), 3);
        assert_eq!(painter.fills().count(), 0);
    }

    #[test]
    fn test_extension_dashes() {
        let settings = settings();
        let ctx = DrawContext {
            settings: &settings,
            shadow_enabled: false,
            show_control_points: false,
        };
        let mut s = strand();
        s.core.stroke_width = 2.0;
        s.core.visibility.start_extension_visible = true;
        let mut painter = RecordingPainter::new();
        s.draw(&mut painter, &ctx);
        let dashes: Vec<_> = painter
            .strokes()
            .filter(|(_, style)| style.width == settings.extension_dash_width)
            .collect();
        assert_eq!(dashes.len(), 10);
        let reach = dashes.iter().map(|(b, _)| b.x0).fold(f64::INFINITY, f64::min);
        assert!((reach + settings.extension_length).abs() < 1e-6);
    }

    #[test]
    fn test_control_points_drawn_when_enabled() {
        let settings = settings();
        let ctx = DrawContext {
            settings: &settings,
            shadow_enabled: false,
            show_control_points: true,
        };
        let mut painter = RecordingPainter::new();
        strand().draw(&mut painter, &ctx);
        assert_eq!(painter.strokes().filter(|(_, s)| s.dash.is_some()).count(), 2);
    }

    #[test]
    fn test_canvas_paints_in_layer_order() {
        let mut canvas = Canvas::new();
        canvas.shadow_enabled = false;
        let a = canvas.create_new_strand(Some(1), Point::new(0.0, 0.0), Point::new(100.0, 0.0)).unwrap();
        canvas.create_new_strand(Some(2), Point::new(0.0, 100.0), Point::new(100.0, 100.0)).unwrap();
        let mut painter = RecordingPainter::new();
        canvas.paint(&mut painter, None);
        let first_fill = painter.fills().next().unwrap();
        assert!(first_fill.0.y1 < 50.0);

        canvas.paint.draw_only_affected_strand = true;
        let mut focused = RecordingPainter::new();
        canvas.paint(&mut focused, Some(a));
        assert!(focused.fills().all(|(b, _)| b.y1 < 50.0));
    }
}
