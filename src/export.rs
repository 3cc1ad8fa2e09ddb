//! Export orchestration: markup in, finished artifact out.
//!
//! Raster exports run flatten, normalize, font gate and composite in that
//! order and only yield an [`ExportArtifact`] once the image is fully encoded.
//! Handing the artifact to a destination is a separate [`ArtifactSink`] step.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use usvg::fontdb::Database;

use crate::config::Config;
use crate::error::ExportError;
use crate::flatten::{FlattenOptions, flatten_foreign_objects};
use crate::fonts::{FontLibrary, FontReadiness};
use crate::geometry::parse_declared_size;
use crate::normalize::normalize_svg;
use crate::presets::DEFAULT_FILENAME;
use crate::raster::{CanvasPlan, Compositor, PreparedDocument, encode_jpeg, encode_png};
use crate::text_metrics::TextMeasurer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Svg,
    Png,
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Svg, ExportFormat::Png, ExportFormat::Jpeg];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Svg => "svg",
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn is_raster(self) -> bool {
        !matches!(self, ExportFormat::Svg)
    }

    fn accepts_extension(self, ext: &str) -> bool {
        match self {
            ExportFormat::Jpeg => ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"),
            other => ext.eq_ignore_ascii_case(other.extension()),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(ExportFormat::Svg),
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpeg),
            other => Err(format!(
                "unknown export format '{other}' (expected svg, png or jpg)"
            )),
        }
    }
}

/// Everything one export needs besides the markup.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTarget {
    pub format: ExportFormat,
    pub scale: f64,
    pub background: String,
    pub aspect: Option<f64>,
    pub filename: String,
}

impl ExportTarget {
    pub fn from_config(config: &Config) -> Self {
        let export = &config.export;
        Self {
            format: export.format,
            scale: export.scale,
            background: export.background.clone(),
            aspect: export.aspect,
            filename: export.filename.clone(),
        }
    }
}

/// Settings for [`Exporter::export_raster_with_aspect`].
#[derive(Debug, Clone, PartialEq)]
pub struct AspectOptions {
    pub aspect: f64,
    pub scale: f64,
    pub background: String,
}

/// A complete export result.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Appends the format's extension unless `filename` already carries it.
pub fn ensure_extension(filename: &str, format: ExportFormat) -> String {
    let filename = filename.trim();
    let filename = if filename.is_empty() {
        DEFAULT_FILENAME
    } else {
        filename
    };
    let has_extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| format.accepts_extension(ext));
    if has_extension {
        filename.to_string()
    } else {
        format!("{filename}.{}", format.extension())
    }
}

pub struct Exporter {
    config: Config,
    fonts: FontLibrary,
    compositor: Compositor,
}

impl Exporter {
    /// Builds an exporter and starts loading fonts in the background.
    pub fn new(config: Config) -> Self {
        let fonts = FontLibrary::new(config.fonts.clone());
        fonts.request_load();
        Self::with_fonts(config, fonts)
    }

    pub fn with_fonts(config: Config, fonts: FontLibrary) -> Self {
        Self {
            config,
            fonts,
            compositor: Compositor::default(),
        }
    }

    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fonts(&self) -> &FontLibrary {
        &self.fonts
    }

    /// Flattens and normalizes `svg` for drawing over `background`.
    pub fn prepare(&self, svg: &str, background: &str) -> Result<PreparedDocument, ExportError> {
        self.prepare_with_report(svg, background).map(|(doc, _)| doc)
    }

    /// Like [`Exporter::prepare`], also returning which font families were found.
    pub fn prepare_with_report(
        &self,
        svg: &str,
        background: &str,
    ) -> Result<(PreparedDocument, FontReadiness), ExportError> {
        let options = self.config.flatten_options(background);
        let current = self.fonts.wait_ready(Duration::ZERO);
        let measured_with = current.clone().unwrap_or_else(|| Arc::new(Database::new()));
        let normalized = self.flatten_and_normalize(svg, &options, &measured_with)?;

        let loaded = self.fonts.wait_for_fonts(&normalized);
        // Fonts that arrived during the wait change label widths; measure again.
        let normalized = if current.is_none() && !loaded.database.is_empty() {
            log::debug!("remeasuring labels with {} loaded face(s)", loaded.database.len());
            self.flatten_and_normalize(svg, &options, &loaded.database)?
        } else {
            normalized
        };
        let doc = PreparedDocument::new(normalized, loaded.database)?;
        Ok((doc, loaded.readiness))
    }

    fn flatten_and_normalize(
        &self,
        svg: &str,
        options: &FlattenOptions,
        database: &Arc<Database>,
    ) -> Result<String, ExportError> {
        let mut measurer = TextMeasurer::new(Arc::clone(database));
        let flattened = flatten_foreign_objects(svg, options, &mut measurer)?;
        normalize_svg(&flattened)
    }

    /// The markup exactly as rendered. No flattening or normalization.
    pub fn export_vector(&self, svg: &str, filename: &str) -> ExportArtifact {
        let size = parse_declared_size(svg);
        ExportArtifact {
            filename: ensure_extension(filename, ExportFormat::Svg),
            mime: ExportFormat::Svg.mime(),
            bytes: svg.as_bytes().to_vec(),
            width: size.width.ceil() as u32,
            height: size.height.ceil() as u32,
        }
    }

    pub fn export_raster(
        &self,
        svg: &str,
        format: ExportFormat,
        filename: &str,
        scale: f64,
        background: &str,
    ) -> Result<ExportArtifact, ExportError> {
        if !format.is_raster() {
            return Ok(self.export_vector(svg, filename));
        }
        validate_scale(scale)?;
        let doc = self.prepare(svg, background)?;
        let plan = CanvasPlan::for_scale(doc.size, scale);
        self.rasterize(&doc, &plan, format, filename, background)
    }

    pub fn export_raster_with_aspect(
        &self,
        svg: &str,
        filename: &str,
        format: ExportFormat,
        options: &AspectOptions,
    ) -> Result<ExportArtifact, ExportError> {
        if !format.is_raster() {
            return Ok(self.export_vector(svg, filename));
        }
        validate_scale(options.scale)?;
        validate_aspect(options.aspect)?;
        let doc = self.prepare(svg, &options.background)?;
        let plan = CanvasPlan::for_scale(doc.size, options.scale).with_min_aspect(options.aspect);
        self.rasterize(&doc, &plan, format, filename, &options.background)
    }

    /// Dispatches on the target's format and aspect.
    pub fn export(&self, svg: &str, target: &ExportTarget) -> Result<ExportArtifact, ExportError> {
        match (target.format, target.aspect) {
            (ExportFormat::Svg, _) => Ok(self.export_vector(svg, &target.filename)),
            (format, Some(aspect)) => self.export_raster_with_aspect(
                svg,
                &target.filename,
                format,
                &AspectOptions {
                    aspect,
                    scale: target.scale,
                    background: target.background.clone(),
                },
            ),
            (format, None) => self.export_raster(
                svg,
                format,
                &target.filename,
                target.scale,
                &target.background,
            ),
        }
    }

    fn rasterize(
        &self,
        doc: &PreparedDocument,
        plan: &CanvasPlan,
        format: ExportFormat,
        filename: &str,
        background: &str,
    ) -> Result<ExportArtifact, ExportError> {
        let pixmap = self.compositor.compose(doc, plan, background)?;
        let bytes = match format {
            ExportFormat::Jpeg => encode_jpeg(&pixmap, self.config.export.jpeg_quality)?,
            _ => encode_png(&pixmap)?,
        };
        log::debug!(
            "exported {}x{} {format} ({} bytes)",
            plan.width,
            plan.height,
            bytes.len()
        );
        Ok(ExportArtifact {
            filename: ensure_extension(filename, format),
            mime: format.mime(),
            bytes,
            width: plan.width,
            height: plan.height,
        })
    }
}

fn validate_scale(scale: f64) -> Result<(), ExportError> {
    if scale.is_finite() && scale >= 1.0 {
        Ok(())
    } else {
        Err(ExportError::InvalidScale(scale))
    }
}

fn validate_aspect(aspect: f64) -> Result<(), ExportError> {
    if aspect.is_finite() && aspect > 0.0 {
        Ok(())
    } else {
        Err(ExportError::InvalidAspect(aspect))
    }
}

/// Destination for finished artifacts.
pub trait ArtifactSink {
    fn deliver(&mut self, artifact: &ExportArtifact) -> Result<(), ExportError>;
}

/// Writes each artifact to `<dir>/<filename>`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn path_for(&self, artifact: &ExportArtifact) -> PathBuf {
        self.dir.join(&artifact.filename)
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ArtifactSink for DirectorySink {
    fn deliver(&mut self, artifact: &ExportArtifact) -> Result<(), ExportError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(artifact);
        std::fs::write(&path, &artifact.bytes)?;
        log::info!("wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Streams artifact bytes to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl ArtifactSink for StdoutSink {
    fn deliver(&mut self, artifact: &ExportArtifact) -> Result<(), ExportError> {
        let mut out = std::io::stdout().lock();
        out.write_all(&artifact.bytes)?;
        out.flush()?;
        Ok(())
    }
}

/// Keeps artifacts in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub artifacts: Vec<ExportArtifact>,
}

impl ArtifactSink for MemorySink {
    fn deliver(&mut self, artifact: &ExportArtifact) -> Result<(), ExportError> {
        self.artifacts.push(artifact.clone());
        Ok(())
    }
}
