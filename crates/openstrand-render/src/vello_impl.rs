//! Vello-based renderer implementation.

use crate::renderer::{
    LABEL_FONT_SIZE, LABEL_HALO_WIDTH, RenderContext, RenderResult, Renderer, RendererError, labels, paint_frame,
};
use kurbo::{Affine, BezPath, Cap, Circle, Point, Rect, Stroke};
use openstrand_core::paint::{LineCap, LineStyle, Painter};
use openstrand_core::strand::Rgba;
use parley::layout::PositionedLayoutItem;
use parley::{FontContext, LayoutContext, StyleProperty};
use peniko::{Brush, Color, Fill};
use vello::Scene;

/// A [`Painter`] that encodes into a Vello scene under a fixed transform.
pub struct VelloPainter<'s> {
    scene: &'s mut Scene,
    transform: Affine,
}

impl<'s> VelloPainter<'s> {
    pub fn new(scene: &'s mut Scene, transform: Affine) -> Self {
        Self { scene, transform }
    }
}

fn to_stroke(style: &LineStyle) -> Stroke {
    let cap = match style.cap {
        LineCap::Butt => Cap::Butt,
        LineCap::Round => Cap::Round,
    };
    let stroke = Stroke::new(style.width).with_caps(cap);
    match style.dash {
        Some((dash, gap)) => stroke.with_dashes(0.0, [dash, gap]),
        None => stroke,
    }
}

impl Painter for VelloPainter<'_> {
    fn fill_path(&mut self, path: &BezPath, color: Rgba) {
        self.scene
            .fill(Fill::NonZero, self.transform, Color::from(color), None, path);
    }

    fn stroke_path(&mut self, path: &BezPath, style: &LineStyle) {
        self.scene.stroke(
            &to_stroke(style),
            self.transform,
            Color::from(style.color),
            None,
            path,
        );
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Rgba) {
        self.scene.fill(
            Fill::NonZero,
            self.transform,
            Color::from(color),
            None,
            &Circle::new(center, radius),
        );
    }
}

/// Vello-based renderer.
pub struct VelloRenderer {
    /// The Vello scene being built.
    scene: Scene,
    /// Font context for labels (system fonts, discovered once).
    font_cx: FontContext,
    layout_cx: LayoutContext<Brush>,
}

impl Default for VelloRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloRenderer {
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
        }
    }

    /// Get the built scene for rendering.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Take ownership of the scene (resets internal scene).
    pub fn take_scene(&mut self) -> Scene {
        std::mem::take(&mut self.scene)
    }

    /// Build a scene for image export.
    ///
    /// The frame keeps the current zoom and pan, has a transparent
    /// background and covers the grid (if visible), every strand, the
    /// in-progress strand and, with `draw_names`, the layer names. Returns the scene and the output bounds in
    /// physical pixels.
    pub fn build_export_scene(&mut self, ctx: &RenderContext) -> RenderResult<(Scene, Rect)> {
        let width = ctx.viewport_size.width * ctx.scale_factor;
        let height = ctx.viewport_size.height * ctx.scale_factor;
        if !(width >= 1.0 && height >= 1.0) {
            return Err(RendererError::ExportFailed(format!(
                "viewport {}x{} is too small",
                ctx.viewport_size.width, ctx.viewport_size.height
            )));
        }
        if !(ctx.zoom.is_finite() && ctx.zoom > 0.0) {
            return Err(RendererError::ExportFailed(format!("invalid zoom {}", ctx.zoom)));
        }

        self.scene.reset();
        let transform = ctx.transform();
        let mut painter = VelloPainter::new(&mut self.scene, transform);
        paint_frame(&mut painter, ctx);
        if ctx.draw_names {
            self.paint_labels(ctx, transform);
        }
        log::info!("Built export scene {width}x{height} for {} strands", ctx.canvas.len());
        Ok((std::mem::take(&mut self.scene), Rect::new(0.0, 0.0, width, height)))
    }

    /// Paint every layer name centered on its anchor: white outline, then
    /// black glyphs. Returns the number of labels painted.
    fn paint_labels(&mut self, ctx: &RenderContext, transform: Affine) -> usize {
        let brush = Brush::Solid(Color::BLACK);
        let halo = Brush::Solid(Color::WHITE);
        let halo_stroke = Stroke::new(LABEL_HALO_WIDTH);
        let mut glyph_count = 0;
        let entries = labels(ctx.canvas);

        for (name, anchor) in &entries {
            let mut builder = self.layout_cx.ranged_builder(&mut self.font_cx, name, 1.0, false);
            builder.push_default(StyleProperty::FontSize(LABEL_FONT_SIZE));
            builder.push_default(StyleProperty::Brush(brush.clone()));
            let mut layout = builder.build(name);
            layout.break_all_lines(None);
            layout.align(None, parley::Alignment::Start, parley::AlignmentOptions::default());

            let width = f64::from(layout.width());
            let height = f64::from(layout.height());
            let origin = Point::new(anchor.x - width / 2.0, anchor.y - height / 2.0);
            let text_transform = transform * Affine::translate(origin.to_vec2());

            let mut drawn = 0;
            for line in layout.lines() {
                for item in line.items() {
                    let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                        continue;
                    };
                    let mut x = glyph_run.offset();
                    let y = glyph_run.baseline();
                    let run = glyph_run.run();
                    let glyphs: Vec<vello::Glyph> = glyph_run
                        .glyphs()
                        .map(|glyph| {
                            let gx = x + glyph.x;
                            let gy = y - glyph.y;
                            x += glyph.advance;
                            vello::Glyph { id: glyph.id, x: gx, y: gy }
                        })
                        .collect();
                    if glyphs.is_empty() {
                        continue;
                    }
                    drawn += glyphs.len();

                    self.scene
                        .draw_glyphs(run.font())
                        .brush(&halo)
                        .transform(text_transform)
                        .font_size(run.font_size())
                        .normalized_coords(run.normalized_coords())
                        .draw(&halo_stroke, glyphs.iter().copied());
                    self.scene
                        .draw_glyphs(run.font())
                        .brush(&brush)
                        .hint(true)
                        .transform(text_transform)
                        .font_size(run.font_size())
                        .normalized_coords(run.normalized_coords())
                        .draw(Fill::NonZero, glyphs.into_iter());
                }
            }

            // No usable font: mark the label area instead.
            if drawn == 0 {
                let size = f64::from(LABEL_FONT_SIZE);
                let w = (name.len() as f64 * size * 0.6).max(20.0);
                let h = size * 1.2;
                let rect = Rect::new(anchor.x - w / 2.0, anchor.y - h / 2.0, anchor.x + w / 2.0, anchor.y + h / 2.0);
                self.scene
                    .fill(Fill::NonZero, transform, Color::from_rgba8(255, 100, 100, 100), None, &rect);
            }
            glyph_count += drawn;
        }

        log::debug!("Painted {} labels with {glyph_count} glyphs", entries.len());
        entries.len()
    }
}

impl Renderer for VelloRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.scene.reset();
        let transform = ctx.transform();

        if let Some(background) = ctx.background_color {
            let bg_rect = Rect::new(
                0.0,
                0.0,
                ctx.viewport_size.width * ctx.scale_factor,
                ctx.viewport_size.height * ctx.scale_factor,
            );
            self.scene
                .fill(Fill::NonZero, Affine::IDENTITY, background, None, &bg_rect);
        }

        let mut painter = VelloPainter::new(&mut self.scene, transform);
        paint_frame(&mut painter, ctx);
        if ctx.draw_names {
            self.paint_labels(ctx, transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::GridStyle;
    use kurbo::Size;
    use openstrand_core::canvas::Canvas;

    #[test]
    fn test_renderer_creation() {
        let renderer = VelloRenderer::new();
        assert!(renderer.scene().encoding().is_empty());
    }

    #[test]
    fn test_build_scene_with_strands() {
        let mut renderer = VelloRenderer::new();
        let mut canvas = Canvas::new();
        canvas
            .create_new_strand(Some(1), Point::new(100.0, 100.0), Point::new(300.0, 100.0))
            .unwrap();

        let ctx = RenderContext::new(&canvas, Size::new(800.0, 600.0)).with_background(None);
        renderer.build_scene(&ctx);
        assert!(!renderer.scene().encoding().is_empty());
    }

    #[test]
    fn test_export_scene_is_transparent_and_sized() {
        let mut renderer = VelloRenderer::new();
        let canvas = Canvas::new();
        let ctx = RenderContext::new(&canvas, Size::new(400.0, 300.0))
            .with_grid(GridStyle::Lines)
            .with_scale_factor(2.0);
        let (scene, bounds) = renderer.build_export_scene(&ctx).unwrap();
        assert_eq!(bounds, Rect::new(0.0, 0.0, 800.0, 600.0));
        // Only the grid was encoded.
        assert!(!scene.encoding().is_empty());
    }

    #[test]
    fn test_export_with_names_paints_labels() {
        let mut canvas = Canvas::new();
        canvas
            .create_new_strand(Some(1), Point::new(100.0, 100.0), Point::new(300.0, 100.0))
            .unwrap();
        canvas
            .create_new_strand(Some(2), Point::new(100.0, 200.0), Point::new(300.0, 200.0))
            .unwrap();

        let mut renderer = VelloRenderer::new();
        let plain = RenderContext::new(&canvas, Size::new(400.0, 300.0));
        let (plain_scene, _) = renderer.build_export_scene(&plain).unwrap();

        let named = RenderContext::new(&canvas, Size::new(400.0, 300.0)).with_names(true);
        assert_eq!(renderer.paint_labels(&named, named.transform()), 2);
        let (named_scene, _) = renderer.build_export_scene(&named).unwrap();
        assert!(named_scene.encoding().draw_tags.len() > plain_scene.encoding().draw_tags.len());
    }

    #[test]
    fn test_export_rejects_empty_viewport() {
        let mut renderer = VelloRenderer::new();
        let canvas = Canvas::new();
        let ctx = RenderContext::new(&canvas, Size::ZERO);
        assert!(matches!(
            renderer.build_export_scene(&ctx),
            Err(RendererError::ExportFailed(_))
        ));
    }

    #[test]
    fn test_dashed_round_stroke_conversion() {
        let style = LineStyle::solid(4.0, Rgba::black())
            .with_cap(LineCap::Round)
            .with_dash(6.0, 3.0);
        let stroke = to_stroke(&style);
        assert_eq!(stroke.width, 4.0);
        assert_eq!(stroke.start_cap, Cap::Round);
        assert_eq!(stroke.dash_pattern.as_slice(), &[6.0, 3.0]);
    }
}
