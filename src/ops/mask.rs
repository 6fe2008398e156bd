use image::{GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::Point;

/// Opacity of a single brush stamp. Overlapping stamps build up coverage.
const STAMP_ALPHA: f32 = 0.5;

/// Marker colour used when none is configured.
pub const DEFAULT_MASK_COLOR: [u8; 4] = [239, 68, 68, 255];

/// Accumulated brush coverage over the base image, one byte per pixel.
///
/// Painting is purely additive; the only way back is [`MaskPainter::clear`].
#[derive(Clone, Debug)]
pub struct MaskPainter {
    coverage: GrayImage,
    color: [u8; 4],
}

impl MaskPainter {
    pub fn new(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self { coverage: GrayImage::new(width, height), color }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.coverage.dimensions()
    }

    pub fn color(&self) -> [u8; 4] {
        self.color
    }

    pub fn coverage(&self) -> &GrayImage {
        &self.coverage
    }

    pub fn is_empty(&self) -> bool {
        self.coverage.as_raw().iter().all(|&v| v == 0)
    }

    /// Stamp a translucent disk of `diameter` surface pixels centred at `center`.
    pub fn paint_stroke(&mut self, center: Point, diameter: f32) {
        let r = diameter * 0.5;
        if r <= 0.0 {
            return;
        }
        let (w, h) = self.coverage.dimensions();
        let x0 = ((center.x - r - 1.0).floor() as i64).max(0) as u32;
        let y0 = ((center.y - r - 1.0).floor() as i64).max(0) as u32;
        let x1 = ((center.x + r + 1.0).ceil() as i64).clamp(0, w as i64) as u32;
        let y1 = ((center.y + r + 1.0).ceil() as i64).clamp(0, h as i64) as u32;
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        for y in y0..y1 {
            let dy = y as f32 + 0.5 - center.y;
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - center.x;
                let dist = (dx * dx + dy * dy).sqrt();
                // 1px anti-aliased rim
                let edge = (r + 0.5 - dist).clamp(0.0, 1.0);
                if edge <= 0.0 {
                    continue;
                }
                let a = STAMP_ALPHA * edge;
                let px = self.coverage.get_pixel_mut(x, y);
                let old = px.0[0] as f32;
                let new = old + (255.0 - old) * a;
                *px = Luma([new.round().min(255.0) as u8]);
            }
        }
    }

    /// Reset to the never-painted state.
    pub fn clear(&mut self) {
        self.coverage.as_mut().fill(0);
    }

    /// Blend the marker colour over `target` at the painted coverage, as shown
    /// live while the mask tool is active.
    pub fn overlay_onto(&self, target: &mut RgbaImage) {
        if target.dimensions() != self.coverage.dimensions() {
            return;
        }
        let color = self.color;
        let width = target.width() as usize;
        let cov = self.coverage.as_raw();
        target
            .as_mut()
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(row, row_buf)| {
                let cov_row = &cov[row * width..(row + 1) * width];
                for (x, &c) in cov_row.iter().enumerate() {
                    if c == 0 {
                        continue;
                    }
                    let a = c as f32 / 255.0 * (color[3] as f32 / 255.0);
                    let i = x * 4;
                    for ch in 0..3 {
                        let dst = row_buf[i + ch] as f32;
                        row_buf[i + ch] = (color[ch] as f32 * a + dst * (1.0 - a)).round() as u8;
                    }
                    let da = row_buf[i + 3] as f32 / 255.0;
                    row_buf[i + 3] = ((a + da * (1.0 - a)) * 255.0).round().min(255.0) as u8;
                }
            });
    }

    /// Opaque marker strokes on a transparent background.
    pub fn flatten_for_export(&self) -> RgbaImage {
        let (w, h) = self.coverage.dimensions();
        let c = self.color;
        RgbaImage::from_fn(w, h, |x, y| {
            if self.coverage.get_pixel(x, y).0[0] > 0 {
                Rgba([c[0], c[1], c[2], 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    /// Opaque marker strokes painted over a copy of `base`, the form sent to
    /// the editing collaborator for region erasure.
    pub fn flatten_over(&self, base: &RgbaImage) -> RgbaImage {
        let mut out = base.clone();
        if out.dimensions() != self.coverage.dimensions() {
            return out;
        }
        let c = self.color;
        for (x, y, px) in out.enumerate_pixels_mut() {
            if self.coverage.get_pixel(x, y).0[0] > 0 {
                *px = Rgba([c[0], c[1], c[2], 255]);
            }
        }
        out
    }
}
