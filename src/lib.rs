#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod config;
pub mod css;
pub mod error;
pub mod export;
pub mod flatten;
pub mod fonts;
pub mod geometry;
pub mod normalize;
pub mod presets;
pub mod raster;
pub mod renderer;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use error::{ExportError, RasterError, RenderError};
pub use export::{
    ArtifactSink, AspectOptions, DirectorySink, ExportArtifact, ExportFormat, ExportTarget,
    Exporter, MemorySink, StdoutSink, ensure_extension,
};
pub use flatten::{FlattenOptions, flatten_foreign_objects};
pub use fonts::{FontLibrary, FontReadiness};
pub use normalize::normalize_svg;
pub use raster::{Compositor, InterpreterRasterizer, NativeRasterizer, Rasterizer};
pub use renderer::{CommandRenderer, DiagramRenderer, RenderSettings, render_or_placeholder};
pub use theme::ThemeName;
