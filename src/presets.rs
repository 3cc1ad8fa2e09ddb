use std::fmt;
use std::str::FromStr;

use crate::theme::ThemeName;

/// Diagram shown when nothing else is supplied.
pub const SAMPLE: &str = "graph TD
  A[Input] --> B[Process]
  B --> C{OK?}
  C -- Yes --> D[Done]
  C -- No  --> B
";

pub const DEFAULT_THEME: ThemeName = ThemeName::Default;
pub const DEFAULT_BACKGROUND: &str = "#ffffff";
pub const DEFAULT_PREVIEW_SCALE: f64 = 1.0;
pub const DEFAULT_EXPORT_SCALE: f64 = 2.0;
pub const DEFAULT_FILENAME: &str = "diagram";
/// Range offered by the export scale slider.
pub const EXPORT_SCALE_RANGE: (f64, f64) = (1.0, 6.0);

/// Minimum width/height ratios offered for padded exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectPreset {
    ThreeTwo,
    FourThree,
    SixteenNine,
}

impl AspectPreset {
    pub const ALL: [AspectPreset; 3] = [
        AspectPreset::ThreeTwo,
        AspectPreset::FourThree,
        AspectPreset::SixteenNine,
    ];

    pub fn ratio(&self) -> f64 {
        match self {
            AspectPreset::ThreeTwo => 3.0 / 2.0,
            AspectPreset::FourThree => 4.0 / 3.0,
            AspectPreset::SixteenNine => 16.0 / 9.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectPreset::ThreeTwo => "3:2",
            AspectPreset::FourThree => "4:3",
            AspectPreset::SixteenNine => "16:9",
        }
    }
}

impl fmt::Display for AspectPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AspectPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectPreset::ALL
            .into_iter()
            .find(|preset| preset.label() == s.trim())
            .ok_or_else(|| format!("unknown aspect preset '{s}', expected 3:2, 4:3 or 16:9"))
    }
}

/// Parses a preset label, any `w:h` pair, or a plain ratio such as `1.5`.
pub fn parse_aspect(raw: &str) -> Result<f64, String> {
    let raw = raw.trim();
    if let Ok(preset) = raw.parse::<AspectPreset>() {
        return Ok(preset.ratio());
    }
    let ratio = match raw.split_once(':') {
        Some((w, h)) => {
            let w: f64 = w.trim().parse().map_err(|_| format!("invalid aspect '{raw}'"))?;
            let h: f64 = h.trim().parse().map_err(|_| format!("invalid aspect '{raw}'"))?;
            w / h
        }
        None => raw.parse().map_err(|_| format!("invalid aspect '{raw}'"))?,
    };
    if ratio.is_finite() && ratio > 0.0 {
        Ok(ratio)
    } else {
        Err(format!("invalid aspect '{raw}', expected a positive ratio"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_ratios() {
        assert_eq!(AspectPreset::ThreeTwo.ratio(), 1.5);
        assert!((AspectPreset::FourThree.ratio() - 1.333_333).abs() < 1e-6);
        assert!((AspectPreset::SixteenNine.ratio() - 1.777_777).abs() < 1e-6);
    }

    #[test]
    fn aspect_strings() {
        assert_eq!(parse_aspect("16:9"), Ok(16.0 / 9.0));
        assert_eq!(parse_aspect("21:9"), Ok(21.0 / 9.0));
        assert_eq!(parse_aspect(" 1.25 "), Ok(1.25));
        assert!(parse_aspect("0").is_err());
        assert!(parse_aspect("1:0").is_err());
        assert!(parse_aspect("wide").is_err());
    }

    #[test]
    fn sample_is_a_flowchart() {
        assert!(SAMPLE.starts_with("graph TD"));
        assert!(SAMPLE.contains("A[Input] --> B[Process]"));
    }
}
