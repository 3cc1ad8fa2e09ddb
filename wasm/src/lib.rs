use mermaid_export::{AspectOptions, Config, ExportFormat, Exporter, FontLibrary};
use serde::Deserialize;
use usvg::fontdb::Database;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportOptions {
    format: Option<String>,
    scale: Option<f64>,
    background: Option<String>,
    aspect: Option<f64>,
    precompose: Option<bool>,
}

fn parse_options(options_json: Option<String>) -> Result<ExportOptions, JsValue> {
    match options_json {
        Some(raw) => serde_json::from_str::<ExportOptions>(&raw)
            .map_err(|error| JsValue::from_str(&error.to_string())),
        None => Ok(ExportOptions::default()),
    }
}

/// The browser host supplies no font files, so labels are measured with fallback advances.
fn build_exporter(options: &ExportOptions) -> Exporter {
    let mut config = Config::default();
    if let Some(precompose) = options.precompose {
        config.flatten.precompose = precompose;
    }
    config.fonts.load_system_fonts = false;
    Exporter::with_fonts(config, FontLibrary::with_database(Database::new()))
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// Flattened, normalized markup ready for a canvas-free rasterizer.
#[wasm_bindgen]
pub fn flatten_svg(svg: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = parse_options(options_json)?;
    let exporter = build_exporter(&options);
    let background = options
        .background
        .clone()
        .unwrap_or_else(|| exporter.config().export.background.clone());
    let doc = exporter.prepare(svg, &background).map_err(to_js)?;
    Ok(doc.svg)
}

/// Encoded PNG or JPEG bytes.
#[wasm_bindgen]
pub fn export_raster(svg: &str, options_json: Option<String>) -> Result<Vec<u8>, JsValue> {
    let options = parse_options(options_json)?;
    let exporter = build_exporter(&options);
    let defaults = &exporter.config().export;
    let format = match options.format.as_deref() {
        Some(raw) => raw.parse::<ExportFormat>().map_err(to_js)?,
        None => ExportFormat::Png,
    };
    let scale = options.scale.unwrap_or(defaults.scale);
    let background = options
        .background
        .clone()
        .unwrap_or_else(|| defaults.background.clone());

    let artifact = match options.aspect {
        Some(aspect) => exporter.export_raster_with_aspect(
            svg,
            &defaults.filename,
            format,
            &AspectOptions {
                aspect,
                scale,
                background,
            },
        ),
        None => exporter.export_raster(svg, format, &defaults.filename, scale, &background),
    }
    .map_err(to_js)?;
    Ok(artifact.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 40 20"><foreignObject width="40" height="20"><div xmlns="http://www.w3.org/1999/xhtml">Hi</div></foreignObject></svg>"#;

    #[test]
    fn flattens_labels() {
        let out = flatten_svg(SVG, None).expect("flatten should succeed");
        assert!(!out.contains("foreignObject"));
        assert!(out.contains(">Hi</text>"));
    }

    #[test]
    fn exports_png_with_aspect() {
        let bytes = export_raster(SVG, Some(r#"{"scale": 2, "aspect": 3}"#.to_string()))
            .expect("export should succeed");
        assert_eq!(&bytes[1..4], b"PNG");
        let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        assert_eq!(width, 120);
    }
}
