use thiserror::Error;

/// Failures of a single rasterization strategy.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("failed to parse SVG: {0}")]
    Parse(String),
    #[error("unsupported content: {0}")]
    Unsupported(String),
    #[error("failed to allocate a {width}x{height} pixmap")]
    Pixmap { width: u32, height: u32 },
    #[error("rasterizer panicked: {0}")]
    Panicked(String),
}

/// Failures of the external diagram renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to start renderer '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("renderer produced no SVG")]
    EmptyOutput,
    #[error("renderer output is not valid UTF-8")]
    InvalidUtf8,
    #[error("renderer I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid SVG markup: {0}")]
    InvalidSvg(String),
    #[error("invalid export scale {0}, expected a finite value >= 1")]
    InvalidScale(f64),
    #[error("invalid aspect ratio {0}, expected a finite value > 0")]
    InvalidAspect(f64),
    #[error("drawing surface unavailable for a {width}x{height} canvas")]
    SurfaceUnavailable { width: u32, height: u32 },
    #[error("rasterization failed (primary: {primary}; fallback: {fallback})")]
    RasterFailed {
        primary: RasterError,
        fallback: RasterError,
    },
    #[error("failed to encode {format}: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },
    #[error("failed to deliver artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl From<roxmltree::Error> for ExportError {
    fn from(err: roxmltree::Error) -> Self {
        ExportError::InvalidSvg(err.to_string())
    }
}
