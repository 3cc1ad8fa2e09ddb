use std::collections::HashMap;
use std::sync::Arc;

use ttf_parser::Face;
use usvg::fontdb::{Database, Family, ID, Query, Stretch, Style, Weight};

/// Advance used per character when no face covers it, as a fraction of the font size.
pub const FALLBACK_ADVANCE: f64 = 0.56;

/// Measures label text against the font database shared with the rasterizers.
pub struct TextMeasurer {
    db: Arc<Database>,
    cache: HashMap<(String, u16), Option<FontFace>>,
}

impl TextMeasurer {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            cache: HashMap::new(),
        }
    }

    /// Width of a single line in pixels.
    pub fn measure(&mut self, text: &str, font_size: f64, font_family: &str, weight: u16) -> f64 {
        if text.is_empty() || font_size <= 0.0 {
            return 0.0;
        }
        let normalized = text.replace('\t', "    ");
        let key = (normalize_family_key(font_family), weight);
        if !self.cache.contains_key(&key) {
            let face = self.load_face(font_family, weight);
            if face.is_none() {
                log::debug!("no face for '{font_family}' at weight {weight}, estimating width");
            }
            self.cache.insert(key.clone(), face);
        }
        match self.cache.get_mut(&key).and_then(|face| face.as_mut()) {
            Some(face) => face.measure_width(&normalized, font_size),
            None => normalized.chars().count() as f64 * font_size * FALLBACK_ADVANCE,
        }
    }

    /// Width of the widest line.
    pub fn max_line_width(
        &mut self,
        lines: &[String],
        font_size: f64,
        font_family: &str,
        weight: u16,
    ) -> f64 {
        lines
            .iter()
            .map(|line| self.measure(line, font_size, font_family, weight))
            .fold(0.0, f64::max)
    }

    fn load_face(&self, font_family: &str, weight: u16) -> Option<FontFace> {
        let id = query_face(&self.db, font_family, weight)?;
        self.db
            .with_face_data(id, |data, index| FontFace::parse(data, index))
            .flatten()
    }
}

/// Resolves a CSS font-family list to a face in `db`, mapping generic and UI aliases.
pub fn query_face(db: &Database, font_family: &str, weight: u16) -> Option<ID> {
    let names = split_families(font_family);
    let mut families: Vec<Family<'_>> = names
        .iter()
        .map(|name| match name.to_ascii_lowercase().as_str() {
            "serif" => Family::Serif,
            "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => Family::SansSerif,
            "monospace" | "ui-monospace" => Family::Monospace,
            "cursive" => Family::Cursive,
            "fantasy" => Family::Fantasy,
            _ => Family::Name(name.as_str()),
        })
        .collect();
    if families.is_empty() {
        families.push(Family::SansSerif);
    }
    let query = Query {
        families: &families,
        weight: Weight(weight),
        stretch: Stretch::Normal,
        style: Style::Normal,
    };
    db.query(&query)
}

/// Splits a font-family list, stripping quotes and empty entries.
pub fn split_families(font_family: &str) -> Vec<String> {
    font_family
        .split(',')
        .map(|part| part.trim().trim_matches('"').trim_matches('\'').trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn parse(data: &[u8], index: u32) -> Option<Self> {
        let face = Face::parse(data, index).ok()?;
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph_id) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph_id).unwrap_or(0);
            }
        }
        Some(Self {
            data: data.to_vec(),
            index,
            units_per_em: face.units_per_em().max(1),
            ascii_advances,
            advance_cache: HashMap::new(),
        })
    }

    fn measure_width(&mut self, text: &str, font_size: f64) -> f64 {
        let scale = font_size / self.units_per_em as f64;
        let fallback = font_size * FALLBACK_ADVANCE;

        if text.is_ascii() {
            return text
                .bytes()
                .filter(|b| *b != b'\n')
                .map(|b| match self.ascii_advances[b as usize] {
                    0 => fallback,
                    advance => advance as f64 * scale,
                })
                .sum::<f64>()
                .max(0.0);
        }

        let missing: Vec<char> = text
            .chars()
            .filter(|ch| !self.advance_cache.contains_key(ch))
            .collect();
        if !missing.is_empty()
            && let Ok(face) = Face::parse(&self.data, self.index)
        {
            for ch in missing {
                let advance = face
                    .glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph));
                self.advance_cache.insert(ch, advance);
            }
        }

        text.chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| match self.advance_cache.get(&ch).copied().flatten() {
                Some(advance) => advance as f64 * scale,
                None => fallback,
            })
            .sum::<f64>()
            .max(0.0)
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}
