use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Shape primitives available to shape layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    /// Isosceles, vertex up, base down.
    Triangle,
}

impl ShapeKind {
    pub fn all() -> &'static [ShapeKind] {
        &[ShapeKind::Rectangle, ShapeKind::Ellipse, ShapeKind::Triangle]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Ellipse => "Ellipse",
            ShapeKind::Triangle => "Triangle",
        }
    }

    /// Stable lowercase name used in settings files and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Triangle => "triangle",
        }
    }

    pub fn parse(s: &str) -> Option<ShapeKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rectangle" | "rect" => Some(ShapeKind::Rectangle),
            "ellipse" | "circle" => Some(ShapeKind::Ellipse),
            "triangle" => Some(ShapeKind::Triangle),
            _ => None,
        }
    }
}

/// A shape positioned in surface pixels, ready to rasterize.
#[derive(Clone, Debug)]
pub struct PlacedShape {
    /// Center x in surface pixels
    pub cx: f32,
    /// Center y in surface pixels
    pub cy: f32,
    /// Half-width
    pub hw: f32,
    /// Half-height
    pub hh: f32,
    pub kind: ShapeKind,
    pub color: [u8; 4],
}

// ============================================================================
// SDF functions: return signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for an ellipse (approximation).
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

/// Signed distance to a convex polygon.
fn sdf_convex_polygon(verts: &[(f32, f32)], px: f32, py: f32) -> f32 {
    let n = verts.len();
    let mut d = (px - verts[0].0) * (px - verts[0].0) + (py - verts[0].1) * (py - verts[0].1);
    let mut s: f32 = 1.0;
    let mut j = n - 1;
    for i in 0..n {
        let ex = verts[j].0 - verts[i].0;
        let ey = verts[j].1 - verts[i].1;
        let wx = px - verts[i].0;
        let wy = py - verts[i].1;
        let t = (wx * ex + wy * ey) / (ex * ex + ey * ey);
        let t = t.clamp(0.0, 1.0);
        let bx = wx - ex * t;
        let by = wy - ey * t;
        d = d.min(bx * bx + by * by);
        // Crossing test
        let c1 = py >= verts[i].1;
        let c2 = py < verts[j].1;
        let c3 = ex * wy > ey * wx;
        if (c1 && c2 && c3) || (!c1 && !c2 && !c3) {
            s = -s;
        }
        j = i;
    }
    s * d.sqrt()
}

/// SDF for the vertex-up triangle filling the box (hx, hy).
#[inline]
fn sdf_triangle(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let verts = [(0.0, -hy), (hx, hy), (-hx, hy)];
    sdf_convex_polygon(&verts, px, py)
}

/// Compute the SDF value for a shape kind at local coordinates (centered at origin).
pub fn shape_sdf(kind: ShapeKind, px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    match kind {
        ShapeKind::Rectangle => sdf_box(px, py, hx, hy),
        ShapeKind::Ellipse => sdf_ellipse(px, py, hx, hy),
        ShapeKind::Triangle => sdf_triangle(px, py, hx, hy),
    }
}

/// Rasterize a filled shape into an RGBA buffer.
///
/// Returns `(buf, buf_w, buf_h, offset_x, offset_y)` where offset is the
/// top-left corner of the buffer in surface coordinates. Pixels outside the
/// surface are clipped.
pub fn rasterize_shape(
    placed: &PlacedShape,
    surface_w: u32,
    surface_h: u32,
) -> (Vec<u8>, u32, u32, i32, i32) {
    if placed.hw <= 0.0 || placed.hh <= 0.0 {
        return (Vec::new(), 0, 0, 0, 0);
    }
    // Room for the anti-aliased edge
    let pad = 2.0;
    let x0 = ((placed.cx - placed.hw - pad).floor() as i32).max(0);
    let y0 = ((placed.cy - placed.hh - pad).floor() as i32).max(0);
    let x1 = ((placed.cx + placed.hw + pad).ceil() as i32).min(surface_w as i32);
    let y1 = ((placed.cy + placed.hh + pad).ceil() as i32).min(surface_h as i32);
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;

    if buf_w == 0 || buf_h == 0 {
        return (Vec::new(), 0, 0, 0, 0);
    }

    let row_bytes = buf_w as usize * 4;
    let mut buf = vec![0u8; row_bytes * buf_h as usize];

    let color = placed.color;
    let (hx, hy) = (placed.hw, placed.hh);
    let (cx, cy) = (placed.cx, placed.cy);
    let kind = placed.kind;

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = (y0 + row as i32) as f32 + 0.5 - cy;
            for col in 0..buf_w as usize {
                let px = (x0 + col as i32) as f32 + 0.5 - cx;
                let d = shape_sdf(kind, px, py, hx, hy);
                let coverage = smoothstep(0.5, -0.5, d);
                if coverage > 0.001 {
                    let idx = col * 4;
                    row_buf[idx] = color[0];
                    row_buf[idx + 1] = color[1];
                    row_buf[idx + 2] = color[2];
                    row_buf[idx + 3] = (color[3] as f32 * coverage).round().min(255.0) as u8;
                }
            }
        });

    (buf, buf_w, buf_h, x0, y0)
}

/// Smoothstep between edge0 and edge1.
#[inline]
pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
