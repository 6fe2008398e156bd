use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use std::collections::HashMap;

use crate::error::StudioError;

/// Advance width per character, as a fraction of the font size, used when no
/// font is registered for a family.
const FALLBACK_ADVANCE: f32 = 0.6;

/// Fonts registered by the host, keyed by lowercase family name.
///
/// Text measurement always succeeds: with no usable font it falls back to
/// fixed per-character metrics so hit-testing stays deterministic.
#[derive(Clone, Default)]
pub struct FontBook {
    fonts: HashMap<String, FontArc>,
    /// Family used when a layer names one that was never registered.
    fallback: Option<String>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("families", &self.fonts.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a TrueType/OpenType font under `family`. The first font
    /// registered becomes the fallback.
    pub fn register(&mut self, family: &str, bytes: Vec<u8>) -> Result<(), StudioError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| StudioError::Font(format!("{}: {}", family, e)))?;
        let key = family.trim().to_lowercase();
        if self.fallback.is_none() {
            self.fallback = Some(key.clone());
        }
        crate::log_info!("Registered font family '{}'", family);
        self.fonts.insert(key, font);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn resolve(&self, family: &str) -> Option<&FontArc> {
        self.fonts
            .get(&family.trim().to_lowercase())
            .or_else(|| self.fallback.as_ref().and_then(|f| self.fonts.get(f)))
    }

    /// Width and height of a single-line run at `size`. Height is the font
    /// size itself.
    pub fn measure(&self, family: &str, text: &str, size: f32) -> (f32, f32) {
        let width = match self.resolve(family) {
            Some(font) => layout_text(font, text, size).1,
            None => text.chars().count() as f32 * size * FALLBACK_ADVANCE,
        };
        (width, size)
    }

    /// True when the resolved font has an outline for every character.
    pub fn covers(&self, family: &str, text: &str) -> bool {
        match self.resolve(family) {
            Some(font) => !text.is_empty() && text.chars().all(|c| font.glyph_id(c) != GlyphId(0)),
            None => false,
        }
    }
}

/// Lay out a single line of text, center-aligned on x = 0.
/// Returns `(glyphs, total_width, ascent, descent)`; glyph y is the baseline
/// measured from the top of the line box.
pub fn layout_text(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32, f32)>, f32, f32, f32) {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();
    let descent = scaled.descent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    let total_width = cursor_x;
    let offset = -total_width * 0.5;
    for glyph in &mut glyphs {
        glyph.1 += offset;
    }

    (glyphs, total_width, ascent, descent)
}

/// RGBA pixels for a rasterized run plus their placement on the surface.
pub struct RasterizedText {
    pub buf: Vec<u8>,
    pub buf_w: u32,
    pub buf_h: u32,
    pub off_x: i32,
    pub off_y: i32,
}

impl RasterizedText {
    fn empty() -> Self {
        Self { buf: Vec::new(), buf_w: 0, buf_h: 0, off_x: 0, off_y: 0 }
    }
}

/// Rasterize a single line of text centered on `(center_x, center_y)` in
/// surface coordinates.
pub fn rasterize_text(
    font: &FontArc,
    text: &str,
    font_size: f32,
    center_x: f32,
    center_y: f32,
    color: [u8; 4],
    surface_w: u32,
    surface_h: u32,
) -> RasterizedText {
    let (glyphs, _, ascent, descent) = layout_text(font, text, font_size);
    if glyphs.is_empty() {
        return RasterizedText::empty();
    }
    let origin_x = center_x;
    let origin_y = center_y - (ascent - descent) * 0.5;

    let mut outlined = Vec::with_capacity(glyphs.len());
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(glyph_id, gx, gy) in &glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(origin_x + gx, origin_y + gy));
        if let Some(o) = font.outline_glyph(glyph) {
            let b = o.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
            outlined.push(o);
        }
    }
    if outlined.is_empty() || min_x >= max_x || min_y >= max_y {
        return RasterizedText::empty();
    }

    let x0 = (min_x.floor() as i32).max(0);
    let y0 = (min_y.floor() as i32).max(0);
    let x1 = (max_x.ceil() as i32).min(surface_w as i32);
    let y1 = (max_y.ceil() as i32).min(surface_h as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;
    if buf_w == 0 || buf_h == 0 {
        return RasterizedText::empty();
    }

    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];
    for o in &outlined {
        let b = o.px_bounds();
        o.draw(|px, py, cov| {
            let ix = b.min.x as i32 + px as i32 - x0;
            let iy = b.min.y as i32 + py as i32 - y0;
            if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                let idx = iy as usize * buf_w as usize + ix as usize;
                coverage[idx] = coverage[idx].max(cov.min(1.0));
            }
        });
    }

    let mut buf = vec![0u8; coverage.len() * 4];
    for (i, &cov) in coverage.iter().enumerate() {
        if cov > 0.001 {
            let idx = i * 4;
            buf[idx] = color[0];
            buf[idx + 1] = color[1];
            buf[idx + 2] = color[2];
            buf[idx + 3] = (color[3] as f32 * cov).round().min(255.0) as u8;
        }
    }

    RasterizedText { buf, buf_w, buf_h, off_x: x0, off_y: y0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_without_fonts_uses_fallback_metrics() {
        let book = FontBook::new();
        assert_eq!(book.measure("Inter", "ABCD", 50.0), (120.0, 50.0));
        assert_eq!(book.measure("Inter", "", 50.0), (0.0, 50.0));
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut book = FontBook::new();
        let err = book.register("Broken", vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, StudioError::Font(_)));
        assert!(book.is_empty());
        assert!(!book.covers("Broken", "A"));
    }
}
