use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

static HEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^#([0-9a-f]{3}|[0-9a-f]{6})$").unwrap());
static RGB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^rgba?\(\s*(\d+(?:\.\d+)?)\s*,\s*(\d+(?:\.\d+)?)\s*,\s*(\d+(?:\.\d+)?)\s*(?:,\s*(\d*\.?\d+)\s*)?\)$",
    )
    .unwrap()
});

/// A color normalized to `#rrggbb` plus a separate alpha channel in `0..=1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColor {
    pub hex: String,
    pub alpha: f64,
}

impl ResolvedColor {
    pub fn opaque_black() -> Self {
        Self {
            hex: "#000000".to_string(),
            alpha: 1.0,
        }
    }

    pub fn transparent() -> Self {
        Self {
            hex: "#000000".to_string(),
            alpha: 0.0,
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.alpha >= 1.0
    }

    pub fn is_visible(&self) -> bool {
        self.alpha > 0.0
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        hex_to_rgb(&self.hex).unwrap_or((0, 0, 0))
    }
}

/// Resolves any CSS color expression. Unresolvable input yields opaque black.
pub fn resolve_color(input: &str) -> ResolvedColor {
    let value = input.trim();

    if HEX_RE.is_match(value) {
        if let Some((r, g, b)) = hex_to_rgb(value) {
            return ResolvedColor {
                hex: rgb_to_hex(r as f64, g as f64, b as f64),
                alpha: 1.0,
            };
        }
    }

    if let Some(color) = match_rgb_function(value) {
        return color;
    }

    // Named colors, hex4/hex8, hsl() and friends.
    match svgtypes::Color::from_str(value) {
        Ok(color) => ResolvedColor {
            hex: rgb_to_hex(color.red as f64, color.green as f64, color.blue as f64),
            alpha: color.alpha as f64 / 255.0,
        },
        Err(_) => {
            if !value.is_empty() {
                log::debug!("unresolvable color '{value}', using black");
            }
            ResolvedColor::opaque_black()
        }
    }
}

/// Shorthand for [`resolve_color`] when only the hex value matters.
pub fn color_to_hex(input: &str) -> String {
    resolve_color(input).hex
}

/// Composites `fg` at `alpha` over `bg` and returns an opaque `#rrggbb`.
pub fn blend_over(fg_hex: &str, bg_hex: &str, alpha: f64) -> String {
    let a = if alpha.is_finite() {
        alpha.clamp(0.0, 1.0)
    } else {
        1.0
    };
    let fg = hex_to_rgb(fg_hex).unwrap_or_else(|| resolve_color(fg_hex).rgb());
    let bg = hex_to_rgb(bg_hex).unwrap_or_else(|| resolve_color(bg_hex).rgb());
    let channel = |f: u8, b: u8| f as f64 * a + b as f64 * (1.0 - a);
    rgb_to_hex(channel(fg.0, bg.0), channel(fg.1, bg.1), channel(fg.2, bg.2))
}

fn match_rgb_function(value: &str) -> Option<ResolvedColor> {
    let caps = RGB_RE.captures(value)?;
    let channel = |idx: usize| -> Option<f64> { caps.get(idx)?.as_str().parse::<f64>().ok() };
    let r = channel(1)?;
    let g = channel(2)?;
    let b = channel(3)?;
    let alpha = match caps.get(4) {
        Some(m) => m.as_str().parse::<f64>().ok()?.clamp(0.0, 1.0),
        None => 1.0,
    };
    Some(ResolvedColor {
        hex: rgb_to_hex(r, g, b),
        alpha,
    })
}

pub(crate) fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let s = hex.trim().strip_prefix('#')?;
    if !s.is_ascii() {
        return None;
    }
    match s.len() {
        3 => {
            let digit = |idx: usize| u8::from_str_radix(&s[idx..idx + 1].repeat(2), 16).ok();
            Some((digit(0)?, digit(1)?, digit(2)?))
        }
        6 => {
            let pair = |idx: usize| u8::from_str_radix(&s[idx..idx + 2], 16).ok();
            Some((pair(0)?, pair(2)?, pair(4)?))
        }
        _ => None,
    }
}

pub(crate) fn rgb_to_hex(r: f64, g: f64, b: f64) -> String {
    let h = |x: f64| x.round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", h(r), h(g), h(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_inputs_keep_full_alpha() {
        assert_eq!(resolve_color("#1C2430").hex, "#1c2430");
        assert_eq!(resolve_color("#abc").hex, "#aabbcc");
        assert_eq!(resolve_color("#abc").alpha, 1.0);
    }

    #[test]
    fn rgb_and_rgba_functions() {
        let c = resolve_color("rgb(255, 0, 16)");
        assert_eq!(c.hex, "#ff0010");
        assert_eq!(c.alpha, 1.0);

        let c = resolve_color("rgba(232,232,232, 0.8)");
        assert_eq!(c.hex, "#e8e8e8");
        assert!((c.alpha - 0.8).abs() < 1e-9);
    }

    #[test]
    fn named_and_modern_syntax_resolve() {
        assert_eq!(resolve_color("white").hex, "#ffffff");
        assert_eq!(resolve_color("cornflowerblue").hex, "#6495ed");
        let t = resolve_color("transparent");
        assert_eq!(t.alpha, 0.0);
        assert_eq!(resolve_color("hsl(0, 100%, 50%)").hex, "#ff0000");
    }

    #[test]
    fn garbage_falls_back_to_black() {
        for input in ["", "   ", "not-a-color", "rgb(", "#12345", "url(#grad)", "ü"] {
            let c = resolve_color(input);
            assert_eq!(c, ResolvedColor::opaque_black(), "input {input:?}");
            assert!(HEX_RE.is_match(&c.hex));
        }
    }

    #[test]
    fn blend_black_over_white() {
        assert_eq!(blend_over("#000000", "#ffffff", 0.2), "#cccccc");
        assert_eq!(blend_over("#000", "#fff", 1.0), "#000000");
        assert_eq!(blend_over("#ff0000", "#0000ff", 0.0), "#0000ff");
        assert_eq!(blend_over("#ff0000", "#0000ff", 0.5), "#800080");
    }
}
