//! Replaces `<foreignObject>` HTML labels with primitive SVG text.
//!
//! Standalone rasterizers do not lay out HTML, so every label island is
//! resolved statically: its computed style comes from the CSS cascade of the
//! document, its text is split into lines, and the island is swapped for a
//! `<g>` carrying an optional background `<rect>` and a centered `<text>`.
//! The document is parsed once and the output is produced by splicing the
//! replacements into the original text, so bytes outside the islands are
//! kept as they were.

mod label;
mod style;

pub use label::{first_element_descendant, label_lines};
pub use style::{
    DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, DEFAULT_FONT_WEIGHT, ResolvedLabelStyle,
    font_size_px, font_weight_of, parse_css_length, resolve_label_style,
};

use xmlwriter::{Indent, XmlWriter};

use crate::color::{blend_over, resolve_color};
use crate::css::{Cascade, StyleSources};
use crate::error::ExportError;
use crate::text_metrics::TextMeasurer;

pub const DEFAULT_LINE_HEIGHT: f64 = 1.2;
const CONTRAST_OUTLINE_OPACITY: f64 = 0.15;

#[derive(Debug, Clone)]
pub struct FlattenOptions {
    /// Color the label backgrounds are pre-composited against.
    pub canvas_background: String,
    pub precompose: bool,
    /// Lower bound for label background alpha. `0.0` keeps authored alpha.
    pub min_background_alpha: f64,
    pub line_height: f64,
    /// Faint outline around label backgrounds that declare no border.
    pub contrast_outline: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            canvas_background: "#ffffff".to_string(),
            precompose: true,
            min_background_alpha: 0.0,
            line_height: DEFAULT_LINE_HEIGHT,
            contrast_outline: true,
        }
    }
}

/// Returns `svg` with every label island replaced. Documents without islands come back unchanged.
pub fn flatten_foreign_objects(
    svg: &str,
    options: &FlattenOptions,
    measurer: &mut TextMeasurer,
) -> Result<String, ExportError> {
    let doc = roxmltree::Document::parse(svg)?;
    let islands: Vec<roxmltree::Node> = doc
        .descendants()
        .filter(|n| is_island(*n))
        .filter(|n| !n.ancestors().skip(1).any(is_island))
        .collect();
    if islands.is_empty() {
        return Ok(svg.to_string());
    }

    let styles = StyleSources::collect(&doc);
    let cascade = Cascade::new(&styles);
    let canvas_hex = resolve_color(&options.canvas_background).hex;
    let mut out = String::with_capacity(svg.len());
    let mut cursor = 0usize;
    let mut removed = 0usize;

    for island in &islands {
        let range = island.range();
        out.push_str(&svg[cursor..range.start]);
        cursor = range.end;

        let lines = label_lines(*island);
        if lines.is_empty() {
            removed += 1;
            continue;
        }
        let style = resolve_label_style(&cascade, first_element_descendant(*island));
        let geometry = IslandGeometry::of(*island);
        out.push_str(&replacement_group(
            &geometry, &lines, &style, options, &canvas_hex, measurer,
        ));
    }
    out.push_str(&svg[cursor..]);

    log::debug!(
        "flattened {} label(s), removed {} empty",
        islands.len() - removed,
        removed
    );
    Ok(out)
}

fn is_island(node: roxmltree::Node) -> bool {
    node.is_element() && node.tag_name().name() == "foreignObject"
}

struct IslandGeometry<'a> {
    width: f64,
    height: f64,
    transform: Option<&'a str>,
}

impl<'a> IslandGeometry<'a> {
    fn of(island: roxmltree::Node<'a, '_>) -> Self {
        let dimension = |name: &str| {
            island
                .attribute(name)
                .and_then(|v| parse_css_length(v, DEFAULT_FONT_SIZE))
                .filter(|v| *v > 0.0)
                .unwrap_or(0.0)
        };
        Self {
            width: dimension("width"),
            height: dimension("height"),
            transform: island.attribute("transform"),
        }
    }

    fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

fn replacement_group(
    geometry: &IslandGeometry,
    lines: &[String],
    style: &ResolvedLabelStyle,
    options: &FlattenOptions,
    canvas_hex: &str,
    measurer: &mut TextMeasurer,
) -> String {
    let (cx, cy) = geometry.center();
    let line_height = style.line_height(options.line_height);

    let mut w = XmlWriter::new(xmlwriter::Options {
        use_single_quote: false,
        indent: Indent::None,
        attributes_indent: Indent::None,
    });
    w.start_element("g");
    if let Some(transform) = geometry.transform {
        w.write_attribute("transform", &escape_attribute(transform));
    }

    if style.background.is_visible() {
        let text_width = measurer
            .max_line_width(lines, style.font_size, &style.font_family, style.font_weight)
            .ceil();
        let text_height = line_height.max(lines.len() as f64 * line_height).ceil();
        let [pad_top, pad_right, pad_bottom, pad_left] = style.padding;
        let bw = text_width + pad_left + pad_right;
        let bh = text_height + pad_top + pad_bottom;
        if bw > 0.0 && bh > 0.0 {
            write_background(&mut w, (cx, cy), (bw, bh), style, options, canvas_hex);
        }
    }

    w.start_element("text");
    w.write_attribute("x", &cx);
    w.write_attribute("y", &cy);
    w.write_attribute("text-anchor", "middle");
    w.write_attribute("dominant-baseline", "middle");
    w.write_attribute("fill", &style.color.hex);
    if !style.color.is_opaque() {
        w.write_attribute("fill-opacity", &style.color.alpha);
    }
    w.write_attribute("font-family", &escape_attribute(&style.font_family));
    w.write_attribute("font-size", &format!("{}px", style.font_size));
    w.write_attribute("font-weight", &style.font_weight);
    w.write_attribute("opacity", "1");
    if let [line] = lines {
        w.write_text(&escape_text(line));
    } else {
        let y_start = cy - (lines.len() - 1) as f64 * line_height / 2.0;
        for (idx, line) in lines.iter().enumerate() {
            w.start_element("tspan");
            w.write_attribute("x", &cx);
            w.write_attribute("y", &(y_start + idx as f64 * line_height));
            w.write_text(&escape_text(line));
            w.end_element();
        }
    }
    w.end_element();
    w.end_element();
    w.end_document()
}

// xmlwriter escapes `<` in text and the quote in attributes, nothing else.
fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;")
}

fn write_background(
    w: &mut XmlWriter,
    (cx, cy): (f64, f64),
    (bw, bh): (f64, f64),
    style: &ResolvedLabelStyle,
    options: &FlattenOptions,
    canvas_hex: &str,
) {
    let alpha = style
        .background
        .alpha
        .max(options.min_background_alpha)
        .min(1.0);
    let (fill, fill_opacity) = if options.precompose && alpha < 1.0 {
        (blend_over(&style.background.hex, canvas_hex, alpha), 1.0)
    } else {
        (style.background.hex.clone(), alpha)
    };

    w.start_element("rect");
    w.write_attribute("x", &(cx - bw / 2.0));
    w.write_attribute("y", &(cy - bh / 2.0));
    w.write_attribute("width", &bw);
    w.write_attribute("height", &bh);
    if style.radius > 0.0 {
        w.write_attribute("rx", &style.radius);
        w.write_attribute("ry", &style.radius);
    }
    w.write_attribute("fill", &fill);
    w.write_attribute("opacity", "1");
    if fill_opacity < 1.0 {
        w.write_attribute("fill-opacity", &fill_opacity);
    }
    if style.has_border() {
        w.write_attribute("stroke", &style.border_color.hex);
        if !style.border_color.is_opaque() {
            w.write_attribute("stroke-opacity", &style.border_color.alpha);
        }
        w.write_attribute("stroke-width", &style.border_width);
    } else if options.contrast_outline {
        w.write_attribute("stroke", "#000000");
        w.write_attribute("stroke-opacity", &CONTRAST_OUTLINE_OPACITY);
        w.write_attribute("stroke-width", "1");
    }
    w.end_element();
}
