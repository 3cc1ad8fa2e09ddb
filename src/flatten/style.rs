use crate::color::{ResolvedColor, resolve_color};
use crate::css::{Cascade, split_css_tokens};

pub const DEFAULT_FONT_FAMILY: &str = "system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif";
pub const DEFAULT_FONT_SIZE: f64 = 14.0;
pub const DEFAULT_FONT_WEIGHT: u16 = 400;

/// The visual style of one label, resolved once per flatten call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLabelStyle {
    pub color: ResolvedColor,
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: u16,
    pub background: ResolvedColor,
    /// Top, right, bottom, left.
    pub padding: [f64; 4],
    pub radius: f64,
    pub border_width: f64,
    pub border_color: ResolvedColor,
}

impl Default for ResolvedLabelStyle {
    fn default() -> Self {
        Self {
            color: ResolvedColor::opaque_black(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            font_weight: DEFAULT_FONT_WEIGHT,
            background: ResolvedColor::transparent(),
            padding: [0.0; 4],
            radius: 0.0,
            border_width: 0.0,
            border_color: ResolvedColor::transparent(),
        }
    }
}

impl ResolvedLabelStyle {
    pub fn line_height(&self, factor: f64) -> f64 {
        self.font_size * factor
    }

    pub fn has_border(&self) -> bool {
        self.border_width > 0.0 && self.border_color.is_visible()
    }
}

/// Resolves the style of `node`, or the defaults when the island has no element content.
pub fn resolve_label_style(cascade: &Cascade, node: Option<roxmltree::Node>) -> ResolvedLabelStyle {
    let Some(node) = node else {
        return ResolvedLabelStyle::default();
    };

    let color = resolve_text_color(cascade, node);
    let font_family = cascade
        .computed(node, "font-family")
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());
    let font_size = font_size_px(cascade, node);
    let font_weight = font_weight_of(cascade, node);

    let own = |name: &str| cascade.computed(node, name);
    let length = |name: &str| {
        own(name)
            .and_then(|v| parse_css_length(&v, font_size))
            .unwrap_or(0.0)
            .max(0.0)
    };
    let color_of = |value: Option<String>| match value {
        Some(v) if v.trim().eq_ignore_ascii_case("currentcolor") => color.clone(),
        Some(v) => resolve_color(&v),
        None => ResolvedColor::transparent(),
    };

    let background = color_of(own("background-color"));
    let padding = [
        length("padding-top"),
        length("padding-right"),
        length("padding-bottom"),
        length("padding-left"),
    ];
    let radius = own("border-top-left-radius")
        .or_else(|| own("border-radius"))
        .and_then(|v| {
            split_css_tokens(&v)
                .first()
                .and_then(|first| parse_css_length(first, font_size))
        })
        .unwrap_or(0.0)
        .max(0.0);

    let border_style = own("border-top-style")
        .or_else(|| own("border-style"))
        .unwrap_or_else(|| "none".to_string());
    let border_width = if matches!(border_style.trim(), "none" | "hidden") {
        0.0
    } else {
        own("border-top-width")
            .or_else(|| own("border-width"))
            .and_then(|v| border_width_px(&v, font_size))
            .unwrap_or(3.0)
    };
    let border_color = match own("border-top-color").or_else(|| own("border-color")) {
        None if border_width > 0.0 => color.clone(),
        other => color_of(other),
    };

    ResolvedLabelStyle {
        color,
        font_family,
        font_size,
        font_weight,
        background,
        padding,
        radius,
        border_width,
        border_color,
    }
}

fn resolve_text_color(cascade: &Cascade, node: roxmltree::Node) -> ResolvedColor {
    let mut current = Some(node);
    while let Some(element) = current {
        match cascade.computed(element, "color") {
            Some(v) if v.trim().eq_ignore_ascii_case("currentcolor") => {
                current = element.parent_element();
            }
            Some(v) => return resolve_color(&v),
            None => break,
        }
    }
    ResolvedColor::opaque_black()
}

/// Computed font size in pixels. Relative units resolve against the parent's size.
pub fn font_size_px(cascade: &Cascade, node: roxmltree::Node) -> f64 {
    let parent = || {
        node.parent_element()
            .map(|p| font_size_px(cascade, p))
            .unwrap_or(DEFAULT_FONT_SIZE)
    };
    let Some(value) = cascade.specified_with_vars(node, "font-size") else {
        return parent();
    };
    let value = value.trim().to_ascii_lowercase();
    let keyword = match value.as_str() {
        "inherit" | "unset" => return parent(),
        "initial" | "medium" => Some(16.0),
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "xxx-large" => Some(48.0),
        "smaller" => Some(parent() / 1.2),
        "larger" => Some(parent() * 1.2),
        _ => None,
    };
    if let Some(px) = keyword {
        return px;
    }
    let base = if value.ends_with("rem") {
        DEFAULT_FONT_SIZE
    } else {
        parent()
    };
    match parse_css_length(&value, base) {
        Some(px) if px > 0.0 => px,
        _ => {
            log::debug!("unsupported font-size '{value}', inheriting");
            parent()
        }
    }
}

/// Computed numeric font weight, following CSS `bolder`/`lighter` rules.
pub fn font_weight_of(cascade: &Cascade, node: roxmltree::Node) -> u16 {
    let parent = || {
        node.parent_element()
            .map(|p| font_weight_of(cascade, p))
            .unwrap_or(DEFAULT_FONT_WEIGHT)
    };
    let Some(value) = cascade.specified_with_vars(node, "font-weight") else {
        return parent();
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "inherit" | "unset" => parent(),
        "normal" | "initial" => 400,
        "bold" => 700,
        "bolder" => match parent() {
            w if w < 350 => 400,
            w if w < 550 => 700,
            w if w < 900 => 900,
            w => w,
        },
        "lighter" => match parent() {
            w if w < 100 => w,
            w if w < 550 => 100,
            w if w < 750 => 400,
            _ => 700,
        },
        other => match other.parse::<f64>() {
            Ok(w) if (1.0..=1000.0).contains(&w) => w.round() as u16,
            _ => parent(),
        },
    }
}

fn border_width_px(value: &str, font_size: f64) -> Option<f64> {
    let first = split_css_tokens(value).first().copied()?;
    match first {
        "thin" => Some(1.0),
        "medium" => Some(3.0),
        "thick" => Some(5.0),
        other => parse_css_length(other, font_size),
    }
}

/// Parses a CSS length into pixels. `em` and `%` are relative to `font_size`.
pub fn parse_css_length(value: &str, font_size: f64) -> Option<f64> {
    let value = value.trim().to_ascii_lowercase();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e'))
        .unwrap_or(value.len());
    // An 'e' may belong to the unit ("em"), so retry without it.
    let (number, unit) = match value[..split].parse::<f64>() {
        Ok(n) => (n, &value[split..]),
        Err(_) => {
            let split = value
                .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
                .unwrap_or(value.len());
            (value[..split].parse::<f64>().ok()?, &value[split..])
        }
    };
    let px = match unit {
        "" | "px" => number,
        "pt" => number * 4.0 / 3.0,
        "pc" => number * 16.0,
        "in" => number * 96.0,
        "cm" => number * 96.0 / 2.54,
        "mm" => number * 96.0 / 25.4,
        "em" => number * font_size,
        "rem" => number * DEFAULT_FONT_SIZE,
        "%" => number * font_size / 100.0,
        _ => return None,
    };
    px.is_finite().then_some(px)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style_of(svg: &str, id: &str) -> ResolvedLabelStyle {
        let doc = roxmltree::Document::parse(svg).unwrap();
        let styles = crate::css::StyleSources::collect(&doc);
        let cascade = Cascade::new(&styles);
        let node = doc.descendants().find(|n| n.attribute("id") == Some(id));
        resolve_label_style(&cascade, node)
    }

    #[test]
    fn defaults_without_any_styling() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><foreignObject><div xmlns="http://www.w3.org/1999/xhtml" id="d">x</div></foreignObject></svg>"#;
        assert_eq!(style_of(svg, "d"), ResolvedLabelStyle::default());
        assert_eq!(style_of(svg, "missing"), ResolvedLabelStyle::default());
    }

    #[test]
    fn mermaid_like_node_label() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" id="m">
<style>#m{font-family:"trebuchet ms",verdana,arial,sans-serif;font-size:16px;fill:#333;}
#m .label{color:#333;}
#m .labelBkg{background-color:rgba(232,232,232, 0.5);}
#m .edgeLabel .label span{font-weight:bold;padding:2px 4px;border-radius:3px;}</style>
<g class="edgeLabel"><g class="label"><foreignObject width="40" height="24">
<div xmlns="http://www.w3.org/1999/xhtml" class="labelBkg"><span id="s" class="edgeLabel">yes</span></div>
</foreignObject></g></g></svg>"#;
        let style = style_of(svg, "s");
        assert_eq!(style.color.hex, "#333333");
        assert_eq!(style.font_family, "\"trebuchet ms\",verdana,arial,sans-serif");
        assert_eq!(style.font_size, 16.0);
        assert_eq!(style.font_weight, 700);
        assert_eq!(style.padding, [2.0, 4.0, 2.0, 4.0]);
        assert_eq!(style.radius, 3.0);
        assert!(!style.background.is_visible());
        assert!(!style.has_border());
    }

    #[test]
    fn relative_font_sizes_and_weights() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" font-size="20" font-weight="600">
<g style="font-size: 150%"><foreignObject>
<div xmlns="http://www.w3.org/1999/xhtml" id="a" style="font-size: 0.5em; font-weight: bolder">x</div>
<div xmlns="http://www.w3.org/1999/xhtml" id="b" style="font-size: 12pt; font-weight: lighter">x</div>
<div xmlns="http://www.w3.org/1999/xhtml" id="c" style="font-size: 2rem; font-weight: 350">x</div>
</foreignObject></g></svg>"#;
        let a = style_of(svg, "a");
        assert_eq!(a.font_size, 15.0);
        assert_eq!(a.font_weight, 900);
        let b = style_of(svg, "b");
        assert_eq!(b.font_size, 16.0);
        assert_eq!(b.font_weight, 400);
        let c = style_of(svg, "c");
        assert_eq!(c.font_size, 28.0);
        assert_eq!(c.font_weight, 350);
    }

    #[test]
    fn background_and_border() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><foreignObject>
<p xmlns="http://www.w3.org/1999/xhtml" id="p" style="color: rgba(10, 20, 30, 0.5); background: rgba(0,0,0,0.2); border: 2px solid currentColor; padding: 1px 2px 3px 4px">x</p>
</foreignObject></svg>"#;
        let style = style_of(svg, "p");
        assert_eq!(style.color.hex, "#0a141e");
        assert!((style.color.alpha - 0.5).abs() < 1e-9);
        assert_eq!(style.background.hex, "#000000");
        assert!((style.background.alpha - 0.2).abs() < 1e-9);
        assert_eq!(style.padding, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(style.border_width, 2.0);
        assert_eq!(style.border_color.hex, "#0a141e");
        assert!(style.has_border());
    }

    #[test]
    fn lengths() {
        assert_eq!(parse_css_length("12px", 14.0), Some(12.0));
        assert_eq!(parse_css_length("1.5em", 10.0), Some(15.0));
        assert_eq!(parse_css_length("1e1px", 10.0), Some(10.0));
        assert_eq!(parse_css_length("0", 10.0), Some(0.0));
        assert_eq!(parse_css_length("auto", 10.0), None);
    }
}
