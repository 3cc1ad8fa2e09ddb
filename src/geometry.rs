use std::str::FromStr;

pub const DEFAULT_WIDTH: f64 = 800.0;
pub const DEFAULT_HEIGHT: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeclaredSize {
    pub width: f64,
    pub height: f64,
}

impl Default for DeclaredSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// The root `viewBox` of a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Destination rectangle produced by [`fit_contain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRect {
    pub dx: f64,
    pub dy: f64,
    pub dw: f64,
    pub dh: f64,
}

impl FitRect {
    /// Snaps the rectangle to whole pixels, keeping at least one pixel per side.
    pub fn snapped(&self) -> PixelRect {
        PixelRect {
            x: self.dx.round() as i32,
            y: self.dy.round() as i32,
            width: (self.dw.round() as u32).max(1),
            height: (self.dh.round() as u32).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Size of the document in user units: viewBox first, then width/height, then 800x600.
pub fn parse_declared_size(svg: &str) -> DeclaredSize {
    match roxmltree::Document::parse(svg) {
        Ok(doc) => declared_size_of(doc.root_element()),
        Err(_) => DeclaredSize::default(),
    }
}

/// The root viewBox, or `None` when it is absent or degenerate.
pub fn parse_view_box(svg: &str) -> Option<ViewBox> {
    let doc = roxmltree::Document::parse(svg).ok()?;
    view_box_of(doc.root_element())
}

pub fn declared_size_of(root: roxmltree::Node) -> DeclaredSize {
    if let Some(vb) = view_box_of(root) {
        return DeclaredSize {
            width: vb.w,
            height: vb.h,
        };
    }
    DeclaredSize {
        width: root
            .attribute("width")
            .and_then(parse_length_px)
            .unwrap_or(DEFAULT_WIDTH),
        height: root
            .attribute("height")
            .and_then(parse_length_px)
            .unwrap_or(DEFAULT_HEIGHT),
    }
}

pub fn view_box_of(root: roxmltree::Node) -> Option<ViewBox> {
    let raw = root.attribute("viewBox")?;
    let mut nums = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().ok());
    let x = nums.next()??;
    let y = nums.next()??;
    let w = nums.next()??;
    let h = nums.next()??;
    if nums.next().is_some() {
        return None;
    }
    let finite = [x, y, w, h].iter().all(|v| v.is_finite());
    if finite && w > 0.0 && h > 0.0 {
        Some(ViewBox { x, y, w, h })
    } else {
        None
    }
}

/// Parses an absolute length in CSS pixels. Percentages and font-relative units are rejected.
pub fn parse_length_px(raw: &str) -> Option<f64> {
    let length = svgtypes::Length::from_str(raw.trim()).ok()?;
    let factor = match length.unit {
        svgtypes::LengthUnit::None | svgtypes::LengthUnit::Px => 1.0,
        svgtypes::LengthUnit::In => 96.0,
        svgtypes::LengthUnit::Cm => 96.0 / 2.54,
        svgtypes::LengthUnit::Mm => 96.0 / 25.4,
        svgtypes::LengthUnit::Pt => 4.0 / 3.0,
        svgtypes::LengthUnit::Pc => 16.0,
        _ => return None,
    };
    let value = length.number * factor;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Uniformly scales `src` into `dst` and centers it (`xMidYMid meet`).
pub fn fit_contain(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> FitRect {
    let s = (dst_w / src_w).min(dst_h / src_h);
    let dw = src_w * s;
    let dh = src_h * s;
    FitRect {
        dx: (dst_w - dw) / 2.0,
        dy: (dst_h - dh) / 2.0,
        dw,
        dh,
    }
}
