use std::sync::Arc;

use resvg::tiny_skia::{Pixmap, Transform};

use super::{CanvasPlan, PreparedDocument, Rasterizer};
use crate::error::RasterError;
use crate::geometry::{FitRect, fit_contain};

/// Full SVG renderer backed by `usvg` + `resvg`.
pub struct NativeRasterizer;

impl Rasterizer for NativeRasterizer {
    fn name(&self) -> &'static str {
        "native"
    }

    fn draw(
        &self,
        doc: &PreparedDocument,
        plan: &CanvasPlan,
        canvas: &mut Pixmap,
    ) -> Result<(), RasterError> {
        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::clone(&doc.fonts);

        let tree = usvg::Tree::from_str(&doc.svg, &opt)
            .map_err(|err| RasterError::Parse(err.to_string()))?;

        let source = doc.source_box();
        let fit = fit_contain(
            source.w.max(1.0),
            source.h.max(1.0),
            plan.width as f64,
            plan.height as f64,
        )
        .snapped();

        // usvg lays the viewBox out inside width x height (xMidYMid meet);
        // map that inner rectangle, not the whole size, onto the snapped box.
        let size = tree.size();
        let (w, h) = (size.width() as f64, size.height() as f64);
        let inner = match doc.view_box {
            Some(vb) => fit_contain(vb.w.max(1.0), vb.h.max(1.0), w, h),
            None => FitRect {
                dx: 0.0,
                dy: 0.0,
                dw: w,
                dh: h,
            },
        };
        let sx = fit.width as f64 / inner.dw.max(f64::EPSILON);
        let sy = fit.height as f64 / inner.dh.max(f64::EPSILON);
        let transform = Transform::from_row(
            sx as f32,
            0.0,
            0.0,
            sy as f32,
            (fit.x as f64 - inner.dx * sx) as f32,
            (fit.y as f64 - inner.dy * sy) as f32,
        );

        resvg::render(&tree, transform, &mut canvas.as_mut());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usvg::fontdb::Database;

    fn prepared(svg: &str) -> PreparedDocument {
        PreparedDocument::new(svg.to_string(), Arc::new(Database::new())).unwrap()
    }

    #[test]
    fn draws_scaled_content() {
        let doc = prepared(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10"><rect x="5" width="5" height="10" fill="#ff0000"/></svg>"##,
        );
        let plan = CanvasPlan::for_scale(doc.size, 2.0);
        let mut canvas = Pixmap::new(plan.width, plan.height).unwrap();
        canvas.fill(resvg::tiny_skia::Color::WHITE);
        NativeRasterizer.draw(&doc, &plan, &mut canvas).unwrap();
        let left = canvas.pixel(4, 10).unwrap();
        let right = canvas.pixel(15, 10).unwrap();
        assert_eq!((left.red(), left.green()), (255, 255));
        assert_eq!((right.red(), right.green()), (255, 0));
    }

    #[test]
    fn padded_canvas_centers_content() {
        let doc = prepared(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10"><rect width="10" height="10" fill="#0000ff"/></svg>"##,
        );
        let plan = CanvasPlan::for_scale(doc.size, 1.0).with_min_aspect(2.0);
        assert_eq!((plan.width, plan.height), (20, 10));
        let mut canvas = Pixmap::new(plan.width, plan.height).unwrap();
        canvas.fill(resvg::tiny_skia::Color::WHITE);
        NativeRasterizer.draw(&doc, &plan, &mut canvas).unwrap();
        assert_eq!(canvas.pixel(2, 5).unwrap().blue(), 255);
        assert_eq!(canvas.pixel(2, 5).unwrap().red(), 255);
        assert_eq!(canvas.pixel(10, 5).unwrap().red(), 0);
        assert_eq!(canvas.pixel(17, 5).unwrap().red(), 255);
    }

    #[test]
    fn mismatched_size_keeps_view_box_proportions() {
        // Normalized renderer output: percentage width, default height.
        let doc = prepared(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100%" height="600" viewBox="0 0 20 10"><rect width="10" height="10" fill="#ff0000"/></svg>"##,
        );
        let plan = CanvasPlan::for_scale(doc.size, 1.0);
        assert_eq!((plan.width, plan.height), (20, 10));
        let mut canvas = Pixmap::new(plan.width, plan.height).unwrap();
        canvas.fill(resvg::tiny_skia::Color::WHITE);
        NativeRasterizer.draw(&doc, &plan, &mut canvas).unwrap();
        assert_eq!(canvas.pixel(5, 1).unwrap().green(), 0);
        assert_eq!(canvas.pixel(5, 8).unwrap().green(), 0);
        assert_eq!(canvas.pixel(15, 5).unwrap().green(), 255);
    }

    #[test]
    fn rejects_unparseable_markup() {
        let doc = PreparedDocument {
            svg: "<svg".to_string(),
            size: Default::default(),
            view_box: None,
            fonts: Arc::new(Database::new()),
        };
        let plan = CanvasPlan::for_scale(doc.size, 1.0);
        let mut canvas = Pixmap::new(plan.width, plan.height).unwrap();
        let err = NativeRasterizer.draw(&doc, &plan, &mut canvas).unwrap_err();
        assert!(matches!(err, RasterError::Parse(_)));
    }
}
