use crate::export::ExportFormat;
use crate::flatten::FlattenOptions;
use crate::presets::{DEFAULT_BACKGROUND, DEFAULT_EXPORT_SCALE, DEFAULT_FILENAME, parse_aspect};
use crate::theme::ThemeName;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_FONT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_JPEG_QUALITY: u8 = 100;
pub const DEFAULT_RENDER_FONT_FAMILY: &str = "Inter, Pretendard, system-ui, sans-serif";
pub const DEFAULT_SECURITY_LEVEL: &str = "strict";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub scale: f64,
    pub background: String,
    /// Minimum width/height ratio; `None` exports at the diagram's own ratio.
    pub aspect: Option<f64>,
    pub filename: String,
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            scale: DEFAULT_EXPORT_SCALE,
            background: DEFAULT_BACKGROUND.to_string(),
            aspect: None,
            filename: DEFAULT_FILENAME.to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontConfig {
    pub load_system_fonts: bool,
    pub font_dirs: Vec<PathBuf>,
    pub font_files: Vec<PathBuf>,
    /// Upper bound on waiting for the font database, in milliseconds.
    pub timeout_ms: u64,
    /// Family used for the generic `sans-serif`.
    pub sans_serif_family: Option<String>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            load_system_fonts: true,
            font_dirs: Vec::new(),
            font_files: Vec::new(),
            timeout_ms: DEFAULT_FONT_TIMEOUT_MS,
            sans_serif_family: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub theme: ThemeName,
    pub font_family: String,
    pub security_level: String,
    /// External program that turns diagram source into SVG.
    pub command: String,
    pub args: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            theme: ThemeName::default(),
            font_family: DEFAULT_RENDER_FONT_FAMILY.to_string(),
            security_level: DEFAULT_SECURITY_LEVEL.to_string(),
            command: "mmdr".to_string(),
            args: vec!["-e".to_string(), "svg".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub export: ExportConfig,
    pub flatten: FlattenOptions,
    pub fonts: FontConfig,
    pub render: RenderConfig,
}

impl Config {
    /// Flatten options pre-compositing label backgrounds against `background`.
    pub fn flatten_options(&self, background: &str) -> FlattenOptions {
        FlattenOptions {
            canvas_background: background.to_string(),
            ..self.flatten.clone()
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    export: Option<ExportConfigFile>,
    labels: Option<LabelConfigFile>,
    fonts: Option<FontConfigFile>,
    render: Option<RenderConfigFile>,
    // Shortcuts for the most common settings.
    theme: Option<String>,
    background: Option<String>,
    scale: Option<NumberOrString>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ExportConfigFile {
    format: Option<String>,
    scale: Option<NumberOrString>,
    background: Option<String>,
    aspect: Option<NumberOrString>,
    filename: Option<String>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LabelConfigFile {
    precompose: Option<bool>,
    min_background_alpha: Option<f64>,
    line_height: Option<f64>,
    contrast_outline: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FontConfigFile {
    load_system_fonts: Option<bool>,
    dirs: Option<Vec<PathBuf>>,
    files: Option<Vec<PathBuf>>,
    timeout_ms: Option<u64>,
    sans_serif: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    theme: Option<String>,
    font_family: Option<String>,
    security_level: Option<String>,
    command: Option<String>,
    args: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(val) => Some(*val),
            NumberOrString::String(val) => val.trim().parse::<f64>().ok(),
        }
    }

    fn as_aspect(&self) -> anyhow::Result<f64> {
        match self {
            NumberOrString::Number(val) => Ok(*val),
            NumberOrString::String(val) => parse_aspect(val).map_err(anyhow::Error::msg),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let parsed = parse_config_file(&contents)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    apply_config_file(&mut config, parsed)?;
    Ok(config)
}

/// Loads a config from a JSON string, accepting JSON5 as a fallback.
pub fn config_from_str(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    apply_config_file(&mut config, parse_config_file(contents)?)?;
    Ok(config)
}

fn parse_config_file(contents: &str) -> anyhow::Result<ConfigFile> {
    match serde_json::from_str::<ConfigFile>(contents) {
        Ok(parsed) => Ok(parsed),
        Err(json_err) => json5::from_str::<ConfigFile>(contents)
            .map_err(|_| anyhow::Error::new(json_err)),
    }
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) -> anyhow::Result<()> {
    if let Some(theme) = parsed.theme.as_deref() {
        config.render.theme = theme.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(background) = parsed.background {
        config.export.background = background;
    }
    if let Some(scale) = parsed.scale.as_ref().and_then(NumberOrString::as_f64) {
        config.export.scale = scale;
    }

    if let Some(export) = parsed.export {
        if let Some(format) = export.format.as_deref() {
            config.export.format = format.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(scale) = export.scale.as_ref().and_then(NumberOrString::as_f64) {
            config.export.scale = scale;
        }
        if let Some(v) = export.background {
            config.export.background = v;
        }
        if let Some(aspect) = export.aspect {
            config.export.aspect = Some(aspect.as_aspect()?);
        }
        if let Some(v) = export.filename {
            config.export.filename = v;
        }
        if let Some(v) = export.jpeg_quality {
            config.export.jpeg_quality = v.clamp(1, 100);
        }
    }

    if let Some(labels) = parsed.labels {
        if let Some(v) = labels.precompose {
            config.flatten.precompose = v;
        }
        if let Some(v) = labels.min_background_alpha {
            config.flatten.min_background_alpha = v.clamp(0.0, 1.0);
        }
        if let Some(v) = labels.line_height
            && v > 0.0
        {
            config.flatten.line_height = v;
        }
        if let Some(v) = labels.contrast_outline {
            config.flatten.contrast_outline = v;
        }
    }

    if let Some(fonts) = parsed.fonts {
        if let Some(v) = fonts.load_system_fonts {
            config.fonts.load_system_fonts = v;
        }
        if let Some(v) = fonts.dirs {
            config.fonts.font_dirs = v;
        }
        if let Some(v) = fonts.files {
            config.fonts.font_files = v;
        }
        if let Some(v) = fonts.timeout_ms {
            config.fonts.timeout_ms = v;
        }
        if let Some(v) = fonts.sans_serif {
            config.fonts.sans_serif_family = Some(v);
        }
    }

    if let Some(render) = parsed.render {
        if let Some(theme) = render.theme.as_deref() {
            config.render.theme = theme.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = render.font_family {
            config.render.font_family = v;
        }
        if let Some(v) = render.security_level {
            config.render.security_level = v;
        }
        if let Some(v) = render.command {
            config.render.command = v;
        }
        if let Some(v) = render.args {
            config.render.args = v;
        }
    }

    Ok(())
}
