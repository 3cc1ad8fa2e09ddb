use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Theme offered to the user. `Custom` renders with Mermaid's `base` theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Default,
    Dark,
    Forest,
    Neutral,
    Custom,
}

impl ThemeName {
    pub const ALL: [ThemeName; 5] = [
        ThemeName::Default,
        ThemeName::Dark,
        ThemeName::Forest,
        ThemeName::Neutral,
        ThemeName::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeName::Default => "default",
            ThemeName::Dark => "dark",
            ThemeName::Forest => "forest",
            ThemeName::Neutral => "neutral",
            ThemeName::Custom => "custom",
        }
    }

    /// Name understood by the diagram renderer.
    pub fn renderer_theme(&self) -> &'static str {
        match self {
            ThemeName::Custom => "base",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "mermaid" => Ok(ThemeName::Default),
            "dark" => Ok(ThemeName::Dark),
            "forest" => Ok(ThemeName::Forest),
            "neutral" => Ok(ThemeName::Neutral),
            "custom" | "base" => Ok(ThemeName::Custom),
            other => Err(format!(
                "unknown theme '{other}', expected one of default, dark, forest, neutral, custom"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_maps_to_base() {
        assert_eq!(ThemeName::Custom.renderer_theme(), "base");
        assert_eq!(ThemeName::Forest.renderer_theme(), "forest");
        assert_eq!("BASE".parse::<ThemeName>(), Ok(ThemeName::Custom));
        assert!("solarized".parse::<ThemeName>().is_err());
    }

    #[test]
    fn names_round_trip_through_display() {
        for theme in ThemeName::ALL {
            assert_eq!(theme.to_string().parse::<ThemeName>(), Ok(theme));
        }
    }
}
