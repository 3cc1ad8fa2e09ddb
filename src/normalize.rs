use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ExportError;
use crate::geometry::{DEFAULT_HEIGHT, DEFAULT_WIDTH};

static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([^\s=/>]+)\s*=\s*("[^"]*"|'[^']*')"#).unwrap());

/// Makes the root element self-describing for standalone rasterizers.
///
/// Adds `viewBox="0 0 w h"` when only pixel width/height are declared, fills
/// in missing or empty width/height with 800x600, and adds a
/// `text-rendering` hint. Only the root start tag is rewritten.
pub fn normalize_svg(svg: &str) -> Result<String, ExportError> {
    let doc = roxmltree::Document::parse(svg)?;
    let root = doc.root_element();
    let start = root.range().start;
    let end = start_tag_end(svg, start)
        .ok_or_else(|| ExportError::InvalidSvg("unterminated root start tag".to_string()))?;
    let tag = &svg[start..end];
    let self_closing = tag.ends_with("/>");

    let mut attrs: Vec<(String, String)> = ATTR_RE
        .captures_iter(tag)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();
    let value_of = |attrs: &[(String, String)], name: &str| -> Option<String> {
        attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v[1..v.len() - 1].to_string())
    };

    let width = value_of(&attrs, "width");
    let height = value_of(&attrs, "height");
    let mut changed = false;

    if value_of(&attrs, "viewBox").is_none()
        && let (Some(w), Some(h)) = (width.as_deref().and_then(pixels), height.as_deref().and_then(pixels))
    {
        attrs.push(("viewBox".to_string(), format!("\"0 0 {w} {h}\"")));
        changed = true;
    }
    for (name, default, current) in [
        ("width", DEFAULT_WIDTH, &width),
        ("height", DEFAULT_HEIGHT, &height),
    ] {
        let quoted = format!("\"{default}\"");
        match current.as_deref() {
            None => attrs.push((name.to_string(), quoted)),
            Some(v) if v.trim().is_empty() => {
                if let Some(slot) = attrs.iter_mut().find(|(n, _)| n == name) {
                    slot.1 = quoted;
                }
            }
            Some(_) => continue,
        }
        changed = true;
    }
    if value_of(&attrs, "text-rendering").is_none_or(|v| v.trim().is_empty()) {
        attrs.retain(|(n, _)| n != "text-rendering");
        attrs.push(("text-rendering".to_string(), "\"optimizeLegibility\"".to_string()));
        changed = true;
    }

    if !changed {
        return Ok(svg.to_string());
    }

    let mut rebuilt = String::with_capacity(tag.len() + 64);
    rebuilt.push('<');
    rebuilt.push_str(&tag_name_of(tag));
    for (name, value) in &attrs {
        rebuilt.push(' ');
        rebuilt.push_str(name);
        rebuilt.push('=');
        rebuilt.push_str(value);
    }
    rebuilt.push_str(if self_closing { "/>" } else { ">" });

    let mut out = String::with_capacity(svg.len() + 64);
    out.push_str(&svg[..start]);
    out.push_str(&rebuilt);
    out.push_str(&svg[end..]);
    Ok(out)
}

fn pixels(raw: &str) -> Option<f64> {
    let value = raw.trim().replace("px", "").parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

fn tag_name_of(tag: &str) -> String {
    tag.trim_start_matches('<')
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '/' && *c != '>')
        .collect()
}

fn start_tag_end(svg: &str, start: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in svg[start..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => return Some(start + idx + 1),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{parse_declared_size, parse_view_box};

    #[test]
    fn adds_view_box_from_pixel_size() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="420px" height="60"><rect/></svg>"#;
        let out = normalize_svg(svg).unwrap();
        assert_eq!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="420px" height="60" viewBox="0 0 420 60" text-rendering="optimizeLegibility"><rect/></svg>"#
        );
        let vb = parse_view_box(&out).unwrap();
        assert_eq!((vb.w, vb.h), (420.0, 60.0));
    }

    #[test]
    fn defaults_missing_dimensions() {
        let svg = "<?xml version=\"1.0\"?>\n<svg xmlns='http://www.w3.org/2000/svg' width=\"\"/>";
        let out = normalize_svg(svg).unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\"?>\n<svg "));
        assert!(out.contains(r#"width="800""#));
        assert!(out.contains(r#"height="600""#));
        assert!(out.ends_with("/>"));
        assert!(!out.contains("viewBox"));
        let size = parse_declared_size(&out);
        assert_eq!((size.width, size.height), (800.0, 600.0));
    }

    #[test]
    fn keeps_existing_view_box_and_hint() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100%" viewBox="0 0 10 10" style="max-width: 10px;" height="5" text-rendering="geometricPrecision"></svg>"#;
        assert_eq!(normalize_svg(svg).unwrap(), svg);
    }

    #[test]
    fn percent_width_gets_no_view_box() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100%" height="50"/>"#;
        let out = normalize_svg(svg).unwrap();
        assert!(!out.contains("viewBox"));
        assert!(out.contains("text-rendering=\"optimizeLegibility\""));
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="16"><g transform="translate(1 2)"/></svg>"#;
        let once = normalize_svg(svg).unwrap();
        assert_eq!(normalize_svg(&once).unwrap(), once);
    }
}
