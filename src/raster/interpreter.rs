//! Fallback rasterizer for a static subset of SVG.
//!
//! Shapes, paths and text are painted straight onto a tiny-skia pixmap with
//! their cascaded fill and stroke. Markers, gradients, patterns, masks,
//! clipping and filters are skipped. The document is drawn at base size first
//! and then copied contain-fitted into the destination canvas.

use std::collections::HashMap;
use std::str::FromStr;

use resvg::tiny_skia::{
    FillRule, FilterQuality, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, PixmapPaint,
    Rect, Stroke, StrokeDash, Transform,
};
use roxmltree::Node;
use svgtypes::{PointsParser, SimplePathSegment, SimplifyingPathParser};
use usvg::fontdb::Database;

use super::{CanvasPlan, PreparedDocument, Rasterizer, to_skia_transform};
use crate::color::resolve_color;
use crate::css::{Cascade, StyleSources};
use crate::error::RasterError;
use crate::flatten::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, font_size_px, font_weight_of, parse_css_length};
use crate::geometry::fit_contain;
use crate::text_metrics::{FALLBACK_ADVANCE, query_face};

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const MAX_USE_DEPTH: u32 = 8;
const CIRCLE_KAPPA: f32 = 0.552_284_8;

/// Interprets the document element by element with tiny-skia primitives.
pub struct InterpreterRasterizer;

impl Rasterizer for InterpreterRasterizer {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn draw(
        &self,
        doc: &PreparedDocument,
        plan: &CanvasPlan,
        canvas: &mut Pixmap,
    ) -> Result<(), RasterError> {
        let xml = roxmltree::Document::parse(&doc.svg)
            .map_err(|err| RasterError::Parse(err.to_string()))?;

        let (base_w, base_h) = (plan.base_width, plan.base_height);
        let mut offscreen = Pixmap::new(base_w, base_h).ok_or(RasterError::Pixmap {
            width: base_w,
            height: base_h,
        })?;

        let source = doc.source_box();
        let (src_w, src_h) = (source.w.max(1.0), source.h.max(1.0));
        let fit = fit_contain(src_w, src_h, base_w as f64, base_h as f64);
        let s = fit.dw / src_w;
        let root_ts = Transform::from_row(
            s as f32,
            0.0,
            0.0,
            s as f32,
            (fit.dx - source.x * s) as f32,
            (fit.dy - source.y * s) as f32,
        );

        let styles = StyleSources::collect(&xml);
        let painter = Painter::new(&xml, &styles, &doc.fonts);
        painter.draw_children(xml.root_element(), root_ts, &mut offscreen, 1.0, 0);
        log::debug!("interpreter painted {} element(s)", painter.painted.get());

        let dst = fit_contain(base_w as f64, base_h as f64, plan.width as f64, plan.height as f64)
            .snapped();
        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        let ts = Transform::from_row(
            dst.width as f32 / base_w as f32,
            0.0,
            0.0,
            dst.height as f32 / base_h as f32,
            dst.x as f32,
            dst.y as f32,
        );
        canvas.draw_pixmap(0, 0, offscreen.as_ref(), &paint, ts, None);
        Ok(())
    }
}

struct Painter<'a> {
    cascade: Cascade<'a>,
    ids: HashMap<&'a str, Node<'a, 'a>>,
    fonts: &'a Database,
    painted: std::cell::Cell<usize>,
}

impl<'a> Painter<'a> {
    fn new(
        xml: &'a roxmltree::Document<'a>,
        styles: &'a StyleSources,
        fonts: &'a Database,
    ) -> Self {
        let ids = xml
            .descendants()
            .filter_map(|node| node.attribute("id").map(|id| (id, node)))
            .collect();
        Self {
            cascade: Cascade::new(styles),
            ids,
            fonts,
            painted: std::cell::Cell::new(0),
        }
    }

    fn draw_children(
        &self,
        parent: Node<'a, 'a>,
        ts: Transform,
        pixmap: &mut Pixmap,
        opacity: f32,
        depth: u32,
    ) {
        for child in parent.children().filter(Node::is_element) {
            self.draw_node(child, ts, pixmap, opacity, depth);
        }
    }

    fn draw_node(
        &self,
        node: Node<'a, 'a>,
        ts: Transform,
        pixmap: &mut Pixmap,
        opacity: f32,
        depth: u32,
    ) {
        if self
            .cascade
            .specified(node, "display")
            .is_some_and(|v| v.trim() == "none")
        {
            return;
        }

        let mut ts = ts;
        if let Some(local) = node
            .attribute("transform")
            .and_then(|v| svgtypes::Transform::from_str(v).ok())
        {
            ts = ts.pre_concat(to_skia_transform(local));
        }
        let opacity = opacity
            * self
                .cascade
                .specified(node, "opacity")
                .map_or(1.0, |v| parse_opacity(&v));
        if opacity <= 0.0 {
            return;
        }

        match node.tag_name().name() {
            "g" | "a" | "switch" => self.draw_children(node, ts, pixmap, opacity, depth),
            "svg" => {
                let ts = ts.pre_translate(length_attr(node, "x"), length_attr(node, "y"));
                self.draw_children(node, ts, pixmap, opacity, depth);
            }
            "use" => self.draw_use(node, ts, pixmap, opacity, depth),
            "text" => {
                if self.visible(node) {
                    self.draw_text(node, ts, pixmap, opacity);
                }
            }
            "rect" | "circle" | "ellipse" | "line" | "polyline" | "polygon" | "path" => {
                if !self.visible(node) {
                    return;
                }
                if let Some(path) = shape_path(node) {
                    self.paint_path(node, &path, ts, pixmap, opacity);
                }
            }
            // Containers and resources that never paint directly.
            _ => {}
        }
    }

    fn visible(&self, node: Node) -> bool {
        !matches!(
            self.cascade.computed(node, "visibility").as_deref().map(str::trim),
            Some("hidden") | Some("collapse")
        )
    }

    fn draw_use(
        &self,
        node: Node<'a, 'a>,
        ts: Transform,
        pixmap: &mut Pixmap,
        opacity: f32,
        depth: u32,
    ) {
        if depth >= MAX_USE_DEPTH {
            log::debug!("use nesting deeper than {MAX_USE_DEPTH}, skipping");
            return;
        }
        let href = node
            .attribute("href")
            .or_else(|| node.attribute((XLINK_NS, "href")));
        let Some(target) = href
            .and_then(|h| h.strip_prefix('#'))
            .and_then(|id| self.ids.get(id))
        else {
            return;
        };
        let ts = ts.pre_translate(length_attr(node, "x"), length_attr(node, "y"));
        if target.tag_name().name() == "symbol" {
            self.draw_children(*target, ts, pixmap, opacity, depth + 1);
        } else {
            self.draw_node(*target, ts, pixmap, opacity, depth + 1);
        }
    }

    fn paint_path(&self, node: Node, path: &Path, ts: Transform, pixmap: &mut Pixmap, opacity: f32) {
        if let Some(paint) = self.paint_of(node, "fill", "fill-opacity", Some("black"), opacity) {
            let rule = match self.cascade.computed(node, "fill-rule").as_deref().map(str::trim) {
                Some("evenodd") => FillRule::EvenOdd,
                _ => FillRule::Winding,
            };
            pixmap.fill_path(path, &paint, rule, ts, None);
            self.painted.set(self.painted.get() + 1);
        }
        if let Some(paint) = self.paint_of(node, "stroke", "stroke-opacity", None, opacity)
            && let Some(stroke) = self.stroke_of(node)
        {
            pixmap.stroke_path(path, &paint, &stroke, ts, None);
            self.painted.set(self.painted.get() + 1);
        }
    }

    /// Solid paint for `property`. `none` and paint servers without a fallback color yield `None`.
    fn paint_of(
        &self,
        node: Node,
        property: &str,
        opacity_property: &str,
        default: Option<&str>,
        opacity: f32,
    ) -> Option<Paint<'static>> {
        let value = self
            .cascade
            .computed(node, property)
            .or_else(|| default.map(str::to_string))?;
        let mut value = value.trim();
        if let Some(rest) = value.strip_prefix("url(") {
            let fallback = rest.split_once(')').map_or("", |(_, tail)| tail.trim());
            if fallback.is_empty() {
                log::debug!("paint server for {property} is not supported, skipping");
                return None;
            }
            value = fallback;
        }
        if value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("transparent") {
            return None;
        }
        let color = if value.eq_ignore_ascii_case("currentcolor") {
            resolve_color(
                self.cascade
                    .computed(node, "color")
                    .as_deref()
                    .unwrap_or("black"),
            )
        } else {
            resolve_color(value)
        };

        let property_opacity = self
            .cascade
            .computed(node, opacity_property)
            .map_or(1.0, |v| parse_opacity(&v));
        let alpha = color.alpha as f32 * property_opacity * opacity;
        if alpha <= 0.0 {
            return None;
        }
        let (r, g, b) = color.rgb();
        let mut paint = Paint {
            anti_alias: true,
            ..Paint::default()
        };
        paint.set_color_rgba8(r, g, b, (alpha.min(1.0) * 255.0).round() as u8);
        Some(paint)
    }

    fn stroke_of(&self, node: Node) -> Option<Stroke> {
        let number = |name: &str| {
            self.cascade
                .computed(node, name)
                .and_then(|v| parse_css_length(&v, DEFAULT_FONT_SIZE))
                .map(|v| v as f32)
        };
        let width = number("stroke-width").unwrap_or(1.0);
        if width <= 0.0 {
            return None;
        }
        let line_cap = match self.cascade.computed(node, "stroke-linecap").as_deref().map(str::trim) {
            Some("round") => LineCap::Round,
            Some("square") => LineCap::Square,
            _ => LineCap::Butt,
        };
        let line_join = match self.cascade.computed(node, "stroke-linejoin").as_deref().map(str::trim) {
            Some("round") => LineJoin::Round,
            Some("bevel") => LineJoin::Bevel,
            Some("miter-clip") => LineJoin::MiterClip,
            _ => LineJoin::Miter,
        };
        let dash = self
            .cascade
            .computed(node, "stroke-dasharray")
            .and_then(|v| dash_pattern(&v))
            .and_then(|values| {
                StrokeDash::new(values, number("stroke-dashoffset").unwrap_or(0.0))
            });
        Some(Stroke {
            width,
            miter_limit: number("stroke-miterlimit").unwrap_or(4.0).max(1.0),
            line_cap,
            line_join,
            dash,
        })
    }

    fn draw_text(&self, node: Node<'a, 'a>, ts: Transform, pixmap: &mut Pixmap, opacity: f32) {
        let mut pen = (length_attr(node, "x"), length_attr(node, "y"));
        pen.0 += length_attr(node, "dx");
        pen.1 += length_attr(node, "dy");
        self.draw_text_content(node, &mut pen, ts, pixmap, opacity);
    }

    fn draw_text_content(
        &self,
        element: Node<'a, 'a>,
        pen: &mut (f32, f32),
        ts: Transform,
        pixmap: &mut Pixmap,
        opacity: f32,
    ) {
        for child in element.children() {
            if child.is_text() {
                let text = collapse_whitespace(child.text().unwrap_or_default());
                if !text.is_empty() {
                    pen.0 += self.draw_run(element, &text, *pen, ts, pixmap, opacity);
                }
            } else if child.is_element() && child.tag_name().name() == "tspan" {
                if !self.visible(child) {
                    continue;
                }
                if let Some(x) = child.attribute("x").and_then(parse_number) {
                    pen.0 = x;
                }
                if let Some(y) = child.attribute("y").and_then(parse_number) {
                    pen.1 = y;
                }
                pen.0 += length_attr(child, "dx");
                pen.1 += length_attr(child, "dy");
                self.draw_text_content(child, pen, ts, pixmap, opacity);
            }
        }
    }

    /// Paints one run of text and returns its advance.
    fn draw_run(
        &self,
        element: Node,
        text: &str,
        (x, y): (f32, f32),
        ts: Transform,
        pixmap: &mut Pixmap,
        opacity: f32,
    ) -> f32 {
        let size = font_size_px(&self.cascade, element) as f32;
        let fallback_advance = size * FALLBACK_ADVANCE as f32;
        let fallback_width = text.chars().count() as f32 * fallback_advance;
        let family = self
            .cascade
            .computed(element, "font-family")
            .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());
        let weight = font_weight_of(&self.cascade, element);
        let Some(id) = query_face(self.fonts, &family, weight) else {
            log::debug!("no face for '{family}', text is not painted");
            return fallback_width;
        };

        let anchor = self.cascade.computed(element, "text-anchor");
        let baseline = self.cascade.computed(element, "dominant-baseline");
        let paint = self.paint_of(element, "fill", "fill-opacity", Some("black"), opacity);

        let drawn = self.fonts.with_face_data(id, |data, index| {
            let face = ttf_parser::Face::parse(data, index).ok()?;
            let scale = size / face.units_per_em().max(1) as f32;
            let advances: Vec<(Option<ttf_parser::GlyphId>, f32)> = text
                .chars()
                .map(|ch| {
                    let glyph = face.glyph_index(ch);
                    let advance = glyph
                        .and_then(|g| face.glyph_hor_advance(g))
                        .map_or(fallback_advance, |a| a as f32 * scale);
                    (glyph, advance)
                })
                .collect();
            let width: f32 = advances.iter().map(|(_, a)| a).sum();

            let Some(paint) = paint.as_ref() else {
                return Some(width);
            };
            let mut pen_x = match anchor.as_deref().map(str::trim) {
                Some("middle") => x - width / 2.0,
                Some("end") => x - width,
                _ => x,
            };
            let pen_y = y + baseline_offset(baseline.as_deref(), &face, scale);
            for (glyph, advance) in advances {
                if let Some(glyph) = glyph {
                    let mut outline = GlyphOutline::new(pen_x, pen_y, scale);
                    if face.outline_glyph(glyph, &mut outline).is_some()
                        && let Some(path) = outline.builder.finish()
                    {
                        pixmap.fill_path(&path, paint, FillRule::Winding, ts, None);
                    }
                }
                pen_x += advance;
            }
            self.painted.set(self.painted.get() + 1);
            Some(width)
        });
        drawn.flatten().unwrap_or(fallback_width)
    }
}

/// Outline sink that places glyph contours at a pen position in user space.
struct GlyphOutline {
    builder: PathBuilder,
    x: f32,
    y: f32,
    scale: f32,
}

impl GlyphOutline {
    fn new(x: f32, y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            x,
            y,
            scale,
        }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.scale, self.y - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for GlyphOutline {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn baseline_offset(baseline: Option<&str>, face: &ttf_parser::Face, scale: f32) -> f32 {
    let ascender = face.ascender() as f32;
    let descender = face.descender() as f32;
    match baseline.map(str::trim) {
        Some("middle") => face.x_height().map_or(ascender * 0.5, f32::from) * scale / 2.0,
        Some("central") => (ascender + descender) * scale / 2.0,
        Some("hanging") | Some("text-before-edge") => ascender * scale,
        Some("text-after-edge") | Some("ideographic") => descender * scale,
        _ => 0.0,
    }
}

fn shape_path(node: Node) -> Option<Path> {
    match node.tag_name().name() {
        "rect" => {
            let (x, y) = (length_attr(node, "x"), length_attr(node, "y"));
            let (w, h) = (length_attr(node, "width"), length_attr(node, "height"));
            if w <= 0.0 || h <= 0.0 {
                return None;
            }
            let rx = node.attribute("rx").and_then(parse_number);
            let ry = node.attribute("ry").and_then(parse_number);
            let (rx, ry) = match (rx, ry) {
                (Some(rx), Some(ry)) => (rx, ry),
                (Some(r), None) | (None, Some(r)) => (r, r),
                (None, None) => (0.0, 0.0),
            };
            let (rx, ry) = (rx.clamp(0.0, w / 2.0), ry.clamp(0.0, h / 2.0));
            if rx > 0.0 && ry > 0.0 {
                rounded_rect(x, y, w, h, rx, ry)
            } else {
                Rect::from_xywh(x, y, w, h).map(PathBuilder::from_rect)
            }
        }
        "circle" => {
            let r = length_attr(node, "r");
            if r <= 0.0 {
                return None;
            }
            PathBuilder::from_circle(length_attr(node, "cx"), length_attr(node, "cy"), r)
        }
        "ellipse" => {
            let (rx, ry) = (length_attr(node, "rx"), length_attr(node, "ry"));
            if rx <= 0.0 || ry <= 0.0 {
                return None;
            }
            let (cx, cy) = (length_attr(node, "cx"), length_attr(node, "cy"));
            Rect::from_xywh(cx - rx, cy - ry, rx * 2.0, ry * 2.0).and_then(PathBuilder::from_oval)
        }
        "line" => {
            let mut pb = PathBuilder::new();
            pb.move_to(length_attr(node, "x1"), length_attr(node, "y1"));
            pb.line_to(length_attr(node, "x2"), length_attr(node, "y2"));
            pb.finish()
        }
        "polyline" | "polygon" => {
            let mut pb = PathBuilder::new();
            for (idx, (x, y)) in PointsParser::from(node.attribute("points")?).enumerate() {
                if idx == 0 {
                    pb.move_to(x as f32, y as f32);
                } else {
                    pb.line_to(x as f32, y as f32);
                }
            }
            if node.tag_name().name() == "polygon" {
                pb.close();
            }
            pb.finish()
        }
        "path" => {
            let mut pb = PathBuilder::new();
            for segment in SimplifyingPathParser::from(node.attribute("d")?) {
                match segment {
                    Ok(SimplePathSegment::MoveTo { x, y }) => pb.move_to(x as f32, y as f32),
                    Ok(SimplePathSegment::LineTo { x, y }) => pb.line_to(x as f32, y as f32),
                    Ok(SimplePathSegment::Quadratic { x1, y1, x, y }) => {
                        pb.quad_to(x1 as f32, y1 as f32, x as f32, y as f32)
                    }
                    Ok(SimplePathSegment::CurveTo {
                        x1,
                        y1,
                        x2,
                        y2,
                        x,
                        y,
                    }) => pb.cubic_to(
                        x1 as f32, y1 as f32, x2 as f32, y2 as f32, x as f32, y as f32,
                    ),
                    Ok(SimplePathSegment::ClosePath) => pb.close(),
                    // Render everything up to the first error.
                    Err(_) => break,
                }
            }
            pb.finish()
        }
        _ => None,
    }
}

fn rounded_rect(x: f32, y: f32, w: f32, h: f32, rx: f32, ry: f32) -> Option<Path> {
    let (kx, ky) = (rx * CIRCLE_KAPPA, ry * CIRCLE_KAPPA);
    let (right, bottom) = (x + w, y + h);
    let mut pb = PathBuilder::new();
    pb.move_to(x + rx, y);
    pb.line_to(right - rx, y);
    pb.cubic_to(right - rx + kx, y, right, y + ry - ky, right, y + ry);
    pb.line_to(right, bottom - ry);
    pb.cubic_to(right, bottom - ry + ky, right - rx + kx, bottom, right - rx, bottom);
    pb.line_to(x + rx, bottom);
    pb.cubic_to(x + rx - kx, bottom, x, bottom - ry + ky, x, bottom - ry);
    pb.line_to(x, y + ry);
    pb.cubic_to(x, y + ry - ky, x + rx - kx, y, x + rx, y);
    pb.close();
    pb.finish()
}

fn parse_number(value: &str) -> Option<f32> {
    parse_css_length(value, DEFAULT_FONT_SIZE).map(|v| v as f32)
}

fn length_attr(node: Node, name: &str) -> f32 {
    node.attribute(name).and_then(parse_number).unwrap_or(0.0)
}

fn parse_opacity(value: &str) -> f32 {
    let value = value.trim();
    let parsed = match value.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().map(|v| v / 100.0),
        None => value.parse::<f32>(),
    };
    parsed.map_or(1.0, |v| v.clamp(0.0, 1.0))
}

/// An even-length dash list, or `None` when dashing is off.
fn dash_pattern(value: &str) -> Option<Vec<f32>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return None;
    }
    let mut values = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(parse_number)
        .collect::<Option<Vec<f32>>>()?;
    if values.is_empty() || values.iter().any(|v| *v < 0.0) || values.iter().sum::<f32>() <= 0.0 {
        return None;
    }
    if values.len() % 2 == 1 {
        values.extend_from_within(..);
    }
    Some(values)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn render(svg: &str, scale: f64, aspect: Option<f64>) -> Pixmap {
        let doc = PreparedDocument::new(svg.to_string(), Arc::new(Database::new())).unwrap();
        let mut plan = CanvasPlan::for_scale(doc.size, scale);
        if let Some(aspect) = aspect {
            plan = plan.with_min_aspect(aspect);
        }
        let mut canvas = Pixmap::new(plan.width, plan.height).unwrap();
        canvas.fill(resvg::tiny_skia::Color::WHITE);
        InterpreterRasterizer.draw(&doc, &plan, &mut canvas).unwrap();
        canvas
    }

    fn rgb(pixmap: &Pixmap, x: u32, y: u32) -> (u8, u8, u8) {
        let p = pixmap.pixel(x, y).unwrap();
        (p.red(), p.green(), p.blue())
    }

    fn near(actual: (u8, u8, u8), expected: (u8, u8, u8)) -> bool {
        let d = |a: u8, b: u8| (a as i16 - b as i16).abs() <= 3;
        d(actual.0, expected.0) && d(actual.1, expected.1) && d(actual.2, expected.2)
    }

    #[test]
    fn paints_rect_through_view_box() {
        let pixmap = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="10 10 20 20"><rect x="20" y="10" width="10" height="20" fill="#ff0000"/></svg>"##,
            2.0,
            None,
        );
        assert_eq!((pixmap.width(), pixmap.height()), (40, 40));
        assert!(near(rgb(&pixmap, 30, 20), (255, 0, 0)));
        assert!(near(rgb(&pixmap, 8, 20), (255, 255, 255)));
    }

    #[test]
    fn stylesheet_and_current_color_apply() {
        let pixmap = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 20 10">
<style>.node rect { fill: #00ff00; } .edge { color: #0000ff; }</style>
<g class="node"><rect width="10" height="10" rx="2"/></g>
<g class="edge"><rect x="10" width="10" height="10" fill="currentColor"/></g>
</svg>"##,
            1.0,
            None,
        );
        assert!(near(rgb(&pixmap, 5, 5), (0, 255, 0)));
        assert!(near(rgb(&pixmap, 15, 5), (0, 0, 255)));
    }

    #[test]
    fn skips_defs_paint_servers_and_hidden_nodes() {
        let pixmap = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 30 10">
<defs><rect id="box" width="10" height="10" fill="#ff0000"/></defs>
<rect x="10" width="10" height="10" fill="url(#grad)"/>
<rect x="20" width="10" height="10" fill="#000000" style="display:none"/>
</svg>"##,
            1.0,
            None,
        );
        assert!(near(rgb(&pixmap, 5, 5), (255, 255, 255)));
        assert!(near(rgb(&pixmap, 15, 5), (255, 255, 255)));
        assert!(near(rgb(&pixmap, 25, 5), (255, 255, 255)));
    }

    #[test]
    fn use_references_are_followed() {
        let pixmap = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 20 10">
<defs><rect id="box" width="10" height="10" fill="#0000ff"/></defs>
<use xlink:href="#box" x="10"/>
</svg>"##,
            1.0,
            None,
        );
        assert!(near(rgb(&pixmap, 5, 5), (255, 255, 255)));
        assert!(near(rgb(&pixmap, 15, 5), (0, 0, 255)));
    }

    #[test]
    fn strokes_paths_and_group_opacity() {
        let pixmap = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 20 20">
<path d="M 0 10 L 20 10" stroke="#000000" stroke-width="4" fill="none"/>
<g opacity="0.5"><circle cx="10" cy="3" r="2" fill="#000000"/></g>
</svg>"##,
            1.0,
            None,
        );
        assert!(near(rgb(&pixmap, 5, 10), (0, 0, 0)));
        let half = rgb(&pixmap, 10, 3);
        assert!(half.0 > 100 && half.0 < 160, "got {half:?}");
        assert!(near(rgb(&pixmap, 5, 17), (255, 255, 255)));
    }

    #[test]
    fn aspect_padding_centers_the_drawing() {
        let pixmap = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><rect width="10" height="10" fill="#ff0000"/></svg>"##,
            1.0,
            Some(2.0),
        );
        assert_eq!((pixmap.width(), pixmap.height()), (20, 10));
        assert!(near(rgb(&pixmap, 2, 5), (255, 255, 255)));
        assert!(near(rgb(&pixmap, 10, 5), (255, 0, 0)));
        assert!(near(rgb(&pixmap, 17, 5), (255, 255, 255)));
    }

    #[test]
    fn text_without_fonts_is_skipped() {
        let pixmap = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 40 20"><text x="20" y="10" text-anchor="middle">Hi <tspan x="20" y="15">there</tspan></text></svg>"##,
            1.0,
            None,
        );
        assert!(near(rgb(&pixmap, 20, 10), (255, 255, 255)));
    }

    #[test]
    fn rejects_malformed_markup() {
        let doc = PreparedDocument {
            svg: "<svg><g></svg>".to_string(),
            size: Default::default(),
            view_box: None,
            fonts: Arc::new(Database::new()),
        };
        let plan = CanvasPlan::for_scale(doc.size, 1.0);
        let mut canvas = Pixmap::new(plan.width, plan.height).unwrap();
        let err = InterpreterRasterizer.draw(&doc, &plan, &mut canvas).unwrap_err();
        assert!(matches!(err, RasterError::Parse(_)));
    }

    #[test]
    fn dash_lists_are_normalized() {
        assert_eq!(dash_pattern("4"), Some(vec![4.0, 4.0]));
        assert_eq!(dash_pattern("3, 1 2"), Some(vec![3.0, 1.0, 2.0, 3.0, 1.0, 2.0]));
        assert_eq!(dash_pattern("none"), None);
        assert_eq!(dash_pattern("0 0"), None);
        assert_eq!(parse_opacity("50%"), 0.5);
        assert_eq!(parse_opacity("2"), 1.0);
    }
}
