use image::ExtendedColorType;
use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use resvg::tiny_skia::Pixmap;

use crate::error::ExportError;

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, ExportError> {
    pixmap.encode_png().map_err(|err| ExportError::Encode {
        format: "png",
        message: err.to_string(),
    })
}

/// JPEG has no alpha channel, so translucent pixels are flattened onto white first.
pub fn encode_jpeg(pixmap: &Pixmap, quality: u8) -> Result<Vec<u8>, ExportError> {
    let mut rgb = Vec::with_capacity(pixmap.width() as usize * pixmap.height() as usize * 3);
    for pixel in pixmap.pixels() {
        // Premultiplied channels plus the uncovered share of white.
        let white = 255 - pixel.alpha();
        rgb.push(pixel.red().saturating_add(white));
        rgb.push(pixel.green().saturating_add(white));
        rgb.push(pixel.blue().saturating_add(white));
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .write_image(&rgb, pixmap.width(), pixmap.height(), ExtendedColorType::Rgb8)
        .map_err(|err| ExportError::Encode {
            format: "jpeg",
            message: err.to_string(),
        })?;
    Ok(out)
}
