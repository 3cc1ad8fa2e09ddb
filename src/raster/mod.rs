//! Two-tier rasterization.
//!
//! A [`Compositor`] fills a destination canvas with the background and asks
//! its primary [`Rasterizer`] to draw the document contain-fitted into it.
//! When the primary fails, a fresh canvas is handed to the fallback. Both
//! strategies see the same [`PreparedDocument`] and [`CanvasPlan`].

#![forbid(unsafe_code)]

mod encode;
mod interpreter;
mod native;

pub use encode::{encode_jpeg, encode_png};
pub use interpreter::InterpreterRasterizer;
pub use native::NativeRasterizer;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use resvg::tiny_skia::{self, Pixmap};
use usvg::fontdb::Database;

use crate::color::resolve_color;
use crate::error::{ExportError, RasterError};
use crate::geometry::{DeclaredSize, ViewBox, declared_size_of, view_box_of};

/// Minimum accepted target aspect ratio.
pub const MIN_ASPECT: f64 = 0.1;

/// A flattened, normalized document ready to be drawn.
#[derive(Clone)]
pub struct PreparedDocument {
    pub svg: String,
    pub size: DeclaredSize,
    pub view_box: Option<ViewBox>,
    pub fonts: Arc<Database>,
}

impl PreparedDocument {
    pub fn new(svg: String, fonts: Arc<Database>) -> Result<Self, ExportError> {
        let (size, view_box) = {
            let doc = roxmltree::Document::parse(&svg)?;
            let root = doc.root_element();
            (declared_size_of(root), view_box_of(root))
        };
        Ok(Self {
            svg,
            size,
            view_box,
            fonts,
        })
    }

    /// The user-space box that gets fitted into the canvas.
    pub fn source_box(&self) -> ViewBox {
        self.view_box.unwrap_or(ViewBox {
            x: 0.0,
            y: 0.0,
            w: self.size.width,
            h: self.size.height,
        })
    }
}

/// Pixel dimensions of one raster export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasPlan {
    /// Declared size times scale.
    pub base_width: u32,
    pub base_height: u32,
    /// Destination canvas; wider than the base when aspect padding applies.
    pub width: u32,
    pub height: u32,
}

impl CanvasPlan {
    pub fn for_scale(size: DeclaredSize, scale: f64) -> Self {
        let px = |v: f64| (v * scale).floor().clamp(1.0, u32::MAX as f64) as u32;
        let (w, h) = (px(size.width), px(size.height));
        Self {
            base_width: w,
            base_height: h,
            width: w,
            height: h,
        }
    }

    /// Widens the canvas until width/height reaches `aspect`. Never crops.
    pub fn with_min_aspect(self, aspect: f64) -> Self {
        let target = aspect.max(MIN_ASPECT);
        let current = self.base_width as f64 / self.base_height as f64;
        let width = if current < target {
            (self.base_height as f64 * target).round() as u32
        } else {
            self.base_width
        };
        Self {
            width: width.max(self.base_width),
            height: self.base_height,
            ..self
        }
    }
}

pub trait Rasterizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Draws `doc` onto `canvas`, which is already filled with the background.
    fn draw(
        &self,
        doc: &PreparedDocument,
        plan: &CanvasPlan,
        canvas: &mut Pixmap,
    ) -> Result<(), RasterError>;
}

pub struct Compositor {
    primary: Box<dyn Rasterizer>,
    fallback: Box<dyn Rasterizer>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(Box::new(NativeRasterizer), Box::new(InterpreterRasterizer))
    }
}

impl Compositor {
    pub fn new(primary: Box<dyn Rasterizer>, fallback: Box<dyn Rasterizer>) -> Self {
        Self { primary, fallback }
    }

    pub fn compose(
        &self,
        doc: &PreparedDocument,
        plan: &CanvasPlan,
        background: &str,
    ) -> Result<Pixmap, ExportError> {
        let fill = background_color(background);

        let mut canvas = new_canvas(plan, fill)?;
        let primary = match run_guarded(self.primary.as_ref(), doc, plan, &mut canvas) {
            Ok(()) => return Ok(canvas),
            Err(err) => err,
        };
        log::warn!(
            "{} rasterizer failed ({primary}), retrying with {}",
            self.primary.name(),
            self.fallback.name()
        );

        let mut canvas = new_canvas(plan, fill)?;
        match run_guarded(self.fallback.as_ref(), doc, plan, &mut canvas) {
            Ok(()) => Ok(canvas),
            Err(fallback) => Err(ExportError::RasterFailed { primary, fallback }),
        }
    }
}

fn run_guarded(
    rasterizer: &dyn Rasterizer,
    doc: &PreparedDocument,
    plan: &CanvasPlan,
    canvas: &mut Pixmap,
) -> Result<(), RasterError> {
    match catch_unwind(AssertUnwindSafe(|| rasterizer.draw(doc, plan, canvas))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(RasterError::Panicked(message))
        }
    }
}

fn new_canvas(plan: &CanvasPlan, fill: tiny_skia::Color) -> Result<Pixmap, ExportError> {
    let mut canvas =
        Pixmap::new(plan.width, plan.height).ok_or(ExportError::SurfaceUnavailable {
            width: plan.width,
            height: plan.height,
        })?;
    canvas.fill(fill);
    Ok(canvas)
}

/// Any CSS color; unresolvable input paints black.
pub fn background_color(css: &str) -> tiny_skia::Color {
    let color = resolve_color(css);
    let (r, g, b) = color.rgb();
    let a = (color.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

pub(crate) fn to_skia_transform(ts: svgtypes::Transform) -> tiny_skia::Transform {
    tiny_skia::Transform::from_row(
        ts.a as f32,
        ts.b as f32,
        ts.c as f32,
        ts.d as f32,
        ts.e as f32,
        ts.f as f32,
    )
}
