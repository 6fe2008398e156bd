// ============================================================================
// COMPOSITOR: base image, layers, selection affordance, mask overlay
// ============================================================================
//
// `render` is a pure function of its inputs. The surface is always the base
// image's intrinsic size; layer geometry is logical and multiplied by a single
// scale factor (surface width / logical width).

use image::imageops::{self, FilterType};
use image::RgbaImage;
use rayon::prelude::*;

use crate::assets::AssetStore;
use crate::canvas::{Layer, LayerId, LayerKind, Point, Rect};
use crate::ops::hit::{self, HitSlop};
use crate::ops::mask::MaskPainter;
use crate::ops::shapes::{rasterize_shape, smoothstep, PlacedShape};
use crate::ops::text::{rasterize_text, FontBook};
use crate::settings::EngineConfig;

const DELETE_HANDLE_COLOR: [u8; 4] = [239, 68, 68, 255];
const DASH_ON: f32 = 8.0;
const DASH_OFF: f32 = 6.0;

/// What to draw.
pub struct Frame<'a> {
    pub base: &'a RgbaImage,
    pub layers: &'a [Layer],
    pub selected: Option<LayerId>,
    pub mask: Option<&'a MaskPainter>,
    /// False while a final result is on display.
    pub show_affordance: bool,
    /// True while the mask tool is active.
    pub show_mask: bool,
    /// Surface pixels per logical unit.
    pub scale: f32,
}

/// What to draw it with.
pub struct RenderContext<'a> {
    pub fonts: &'a FontBook,
    pub assets: &'a AssetStore,
    pub config: &'a EngineConfig,
    pub slop: HitSlop,
}

pub fn render(frame: &Frame, ctx: &RenderContext) -> RgbaImage {
    let mut surface = frame.base.clone();
    let s = frame.scale;

    for layer in frame.layers {
        draw_layer(&mut surface, layer, s, ctx);
    }

    if frame.show_affordance
        && let Some(layer) = frame.selected.and_then(|id| frame.layers.iter().find(|l| l.id == id))
    {
        draw_affordance(&mut surface, layer, s, ctx);
    }

    if frame.show_mask
        && let Some(mask) = frame.mask
    {
        mask.overlay_onto(&mut surface);
    }

    surface
}

fn draw_layer(surface: &mut RgbaImage, layer: &Layer, s: f32, ctx: &RenderContext) {
    let alpha = layer.alpha();
    if alpha <= 0.0 {
        return;
    }
    let center = Point::new(layer.x * s, layer.y * s);
    let (sw, sh) = surface.dimensions();

    match &layer.kind {
        LayerKind::Text { content, font_family, background } => {
            if background.active && ctx.config.allow_text_highlight {
                let (w, h) = ctx.fonts.measure(font_family, content, layer.size);
                let rect = Rect::from_center_size(layer.position(), w, h)
                    .expand(ctx.config.highlight_padding)
                    .scale(s);
                let bg_alpha = alpha * background.opacity.min(100) as f32 / 100.0;
                fill_rect(surface, rect, background.color, bg_alpha);
            }
            let size = layer.size * s;
            match ctx.fonts.resolve(font_family) {
                Some(font) => {
                    let t = rasterize_text(font, content, size, center.x, center.y, layer.color, sw, sh);
                    composite_buffer(surface, &t.buf, t.buf_w, t.buf_h, t.off_x, t.off_y, alpha);
                }
                None => draw_placeholder_text(surface, content, size, center, layer.color, alpha),
            }
        }
        LayerKind::Sticker { glyph } => {
            let size = layer.size * s;
            match ctx.fonts.resolve("") {
                Some(font) if ctx.fonts.covers("", glyph) => {
                    let t = rasterize_text(font, glyph, size, center.x, center.y, layer.color, sw, sh);
                    composite_buffer(surface, &t.buf, t.buf_w, t.buf_h, t.off_x, t.off_y, alpha);
                }
                // No font carries this glyph: mark the spot with a disc.
                _ => fill_disc(surface, center, size * 0.5, layer.color, alpha),
            }
        }
        LayerKind::Shape { shape } => {
            let (w, h) = layer.dimensions();
            let placed = PlacedShape {
                cx: center.x,
                cy: center.y,
                hw: w * s * 0.5,
                hh: h * s * 0.5,
                kind: *shape,
                color: layer.color,
            };
            let (buf, bw, bh, x0, y0) = rasterize_shape(&placed, sw, sh);
            composite_buffer(surface, &buf, bw, bh, x0, y0, alpha);
        }
        LayerKind::Logo { asset } => {
            // Pending or failed decode: skip this frame.
            let Some(raster) = ctx.assets.get_ready(*asset) else { return };
            let (w, h) = layer.dimensions();
            draw_logo(surface, raster, center, w * s, h * s, alpha);
        }
    }
}

/// Place `raster` scaled to `tw x th` pixels around `center`.
///
/// A logo no larger than twice the surface each way is resampled whole with
/// a triangle filter. Anything bigger is sampled bilinearly over the visible
/// window only, so memory stays bounded by the surface.
fn draw_logo(surface: &mut RgbaImage, raster: &RgbaImage, center: Point, tw: f32, th: f32, alpha: f32) {
    let (sw, sh) = surface.dimensions();
    if !(tw.is_finite() && th.is_finite()) || raster.width() == 0 || raster.height() == 0 {
        return;
    }
    let tw = tw.round().max(1.0);
    let th = th.round().max(1.0);
    let left = center.x - tw * 0.5;
    let top = center.y - th * 0.5;

    if tw <= 2.0 * sw as f32 && th <= 2.0 * sh as f32 {
        let (iw, ih) = (tw as u32, th as u32);
        let resized;
        let src: &RgbaImage = if raster.dimensions() == (iw, ih) {
            raster
        } else {
            resized = imageops::resize(raster, iw, ih, FilterType::Triangle);
            &resized
        };
        composite_buffer(surface, src.as_raw(), iw, ih, left.round() as i32, top.round() as i32, alpha);
        return;
    }

    let x_start = left.floor().max(0.0);
    let x_end = (left + tw).ceil().min(sw as f32);
    let y_start = top.floor().max(0.0);
    let y_end = (top + th).ceil().min(sh as f32);
    if x_start >= x_end || y_start >= y_end {
        return;
    }
    let (x_start, x_end) = (x_start as u32, x_end as u32);
    let (y_start, y_end) = (y_start as usize, y_end as usize);
    let (rw, rh) = (raster.width() as f32, raster.height() as f32);
    let kx = rw / tw;
    let ky = rh / th;

    surface
        .as_mut()
        .par_chunks_mut(sw as usize * 4)
        .enumerate()
        .skip(y_start)
        .take(y_end - y_start)
        .for_each(|(y, row)| {
            let v = (y as f32 + 0.5 - top) * ky - 0.5;
            if v < -0.5 || v > rh - 0.5 {
                return;
            }
            for x in x_start..x_end {
                let u = (x as f32 + 0.5 - left) * kx - 0.5;
                if u < -0.5 || u > rw - 0.5 {
                    continue;
                }
                let src = sample_bilinear(raster, u, v);
                if src[3] == 0 {
                    continue;
                }
                let di = x as usize * 4;
                blend_pixel(&mut row[di..di + 4], src, alpha);
            }
        });
}

fn sample_bilinear(img: &RgbaImage, u: f32, v: f32) -> [u8; 4] {
    let (w, h) = img.dimensions();
    let u = u.clamp(0.0, (w - 1) as f32);
    let v = v.clamp(0.0, (h - 1) as f32);
    let (x0, y0) = (u.floor() as u32, v.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (u - x0 as f32, v - y0 as f32);
    let (p00, p10) = (img.get_pixel(x0, y0).0, img.get_pixel(x1, y0).0);
    let (p01, p11) = (img.get_pixel(x0, y1).0, img.get_pixel(x1, y1).0);
    let mut out = [0u8; 4];
    for c in 0..4 {
        let upper = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let lower = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (upper * (1.0 - fy) + lower * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Dashed padded box plus the delete handle at its top-right corner.
fn draw_affordance(surface: &mut RgbaImage, layer: &Layer, s: f32, ctx: &RenderContext) {
    let color = ctx.config.affordance_color;
    let rect = hit::padded_bounds(layer, ctx.fonts, ctx.slop).scale(s);
    let thickness = (2.0 * s).max(1.0);
    draw_dashed_rect(surface, rect, thickness, color);

    let handle = hit::delete_handle_center(layer, ctx.fonts, ctx.slop);
    let hc = Point::new(handle.x * s, handle.y * s);
    let r = ctx.slop.handle_radius * s;
    fill_disc(surface, hc, r, DELETE_HANDLE_COLOR, 1.0);
    let arm = r * 0.45;
    let t = (r * 0.12).max(1.0);
    draw_segment(surface, Point::new(hc.x - arm, hc.y - arm), Point::new(hc.x + arm, hc.y + arm), t, [255, 255, 255, 255]);
    draw_segment(surface, Point::new(hc.x - arm, hc.y + arm), Point::new(hc.x + arm, hc.y - arm), t, [255, 255, 255, 255]);
}

// ============================================================================
// PIXEL HELPERS
// ============================================================================

/// Straight-alpha "over" of `src` scaled by `alpha` onto one RGBA pixel.
#[inline]
fn blend_pixel(dst: &mut [u8], src: [u8; 4], alpha: f32) {
    let sa = src[3] as f32 / 255.0 * alpha;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Blend an RGBA buffer placed at (x0, y0) onto the surface, clipping to it.
fn composite_buffer(surface: &mut RgbaImage, buf: &[u8], w: u32, h: u32, x0: i32, y0: i32, alpha: f32) {
    if w == 0 || h == 0 || buf.len() < w as usize * h as usize * 4 {
        return;
    }
    let (sw, sh) = surface.dimensions();
    let row_bytes = sw as usize * 4;
    let y_start = y0.max(0) as usize;
    let y_end = (y0 as i64 + h as i64).clamp(0, sh as i64) as usize;
    let x_start = x0.max(0);
    let x_end = (x0 as i64 + w as i64).min(sw as i64) as i32;
    if y_start >= y_end || x_start >= x_end {
        return;
    }
    surface
        .as_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y_start)
        .take(y_end - y_start)
        .for_each(|(y, row)| {
            let by = (y as i32 - y0) as usize;
            for x in x_start..x_end {
                let bx = (x - x0) as usize;
                let si = (by * w as usize + bx) * 4;
                let src = [buf[si], buf[si + 1], buf[si + 2], buf[si + 3]];
                if src[3] == 0 {
                    continue;
                }
                let di = x as usize * 4;
                blend_pixel(&mut row[di..di + 4], src, alpha);
            }
        });
}

fn fill_rect(surface: &mut RgbaImage, rect: Rect, color: [u8; 4], alpha: f32) {
    let (sw, sh) = surface.dimensions();
    let x0 = (rect.min_x.round() as i64).clamp(0, sw as i64) as u32;
    let y0 = (rect.min_y.round() as i64).clamp(0, sh as i64) as u32;
    let x1 = (rect.max_x.round() as i64).clamp(0, sw as i64) as u32;
    let y1 = (rect.max_y.round() as i64).clamp(0, sh as i64) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            blend_pixel(&mut surface.get_pixel_mut(x, y).0, color, alpha);
        }
    }
}

/// Anti-aliased filled circle.
fn fill_disc(surface: &mut RgbaImage, center: Point, radius: f32, color: [u8; 4], alpha: f32) {
    if radius <= 0.0 {
        return;
    }
    let (sw, sh) = surface.dimensions();
    let x0 = ((center.x - radius - 1.0).floor() as i64).clamp(0, sw as i64) as u32;
    let y0 = ((center.y - radius - 1.0).floor() as i64).clamp(0, sh as i64) as u32;
    let x1 = ((center.x + radius + 1.0).ceil() as i64).clamp(0, sw as i64) as u32;
    let y1 = ((center.y + radius + 1.0).ceil() as i64).clamp(0, sh as i64) as u32;
    for y in y0..y1 {
        for x in x0..x1 {
            let d = Point::new(x as f32 + 0.5, y as f32 + 0.5).distance_sq(center).sqrt() - radius;
            let cov = smoothstep(0.5, -0.5, d);
            if cov > 0.001 {
                blend_pixel(&mut surface.get_pixel_mut(x, y).0, color, alpha * cov);
            }
        }
    }
}

/// Thick anti-aliased line segment.
fn draw_segment(surface: &mut RgbaImage, a: Point, b: Point, thickness: f32, color: [u8; 4]) {
    let (sw, sh) = surface.dimensions();
    let half = thickness * 0.5;
    let x0 = ((a.x.min(b.x) - half - 1.0).floor() as i64).clamp(0, sw as i64) as u32;
    let y0 = ((a.y.min(b.y) - half - 1.0).floor() as i64).clamp(0, sh as i64) as u32;
    let x1 = ((a.x.max(b.x) + half + 1.0).ceil() as i64).clamp(0, sw as i64) as u32;
    let y1 = ((a.y.max(b.y) + half + 1.0).ceil() as i64).clamp(0, sh as i64) as u32;
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = (dx * dx + dy * dy).max(1e-6);
    for y in y0..y1 {
        for x in x0..x1 {
            let p = Point::new(x as f32 + 0.5, y as f32 + 0.5);
            let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
            let q = Point::new(a.x + dx * t, a.y + dy * t);
            let cov = smoothstep(0.5, -0.5, p.distance_sq(q).sqrt() - half);
            if cov > 0.001 {
                blend_pixel(&mut surface.get_pixel_mut(x, y).0, color, cov);
            }
        }
    }
}

fn draw_dashed_rect(surface: &mut RgbaImage, rect: Rect, thickness: f32, color: [u8; 4]) {
    let corners = [
        Point::new(rect.min_x, rect.min_y),
        Point::new(rect.max_x, rect.min_y),
        Point::new(rect.max_x, rect.max_y),
        Point::new(rect.min_x, rect.max_y),
    ];
    for i in 0..4 {
        let (a, b) = (corners[i], corners[(i + 1) % 4]);
        let len = a.distance_sq(b).sqrt();
        if len <= 0.0 {
            continue;
        }
        let (ux, uy) = ((b.x - a.x) / len, (b.y - a.y) / len);
        let mut t = 0.0;
        while t < len {
            let end = (t + DASH_ON).min(len);
            draw_segment(
                surface,
                Point::new(a.x + ux * t, a.y + uy * t),
                Point::new(a.x + ux * end, a.y + uy * end),
                thickness,
                color,
            );
            t += DASH_ON + DASH_OFF;
        }
    }
}

/// Block per visible character, used when no font is registered so text
/// layers still show where they are.
fn draw_placeholder_text(surface: &mut RgbaImage, text: &str, size: f32, center: Point, color: [u8; 4], alpha: f32) {
    let (w, _) = FontBook::new().measure("", text, size);
    let count = text.chars().count();
    if count == 0 {
        return;
    }
    let advance = w / count as f32;
    let left = center.x - w * 0.5;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let x = left + advance * i as f32 + advance * 0.1;
        let rect = Rect::from_min_size(x, center.y - size * 0.35, advance * 0.8, size * 0.7);
        fill_rect(surface, rect, color, alpha);
    }
}
