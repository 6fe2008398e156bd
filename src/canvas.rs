use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::AssetId;
use crate::ops::mask::MaskPainter;
use crate::ops::shapes::ShapeKind;

/// Width of the logical coordinate space layers live in. Layer positions and
/// sizes are expressed in these units regardless of the base image resolution.
pub const DEFAULT_LOGICAL_WIDTH: f32 = 1000.0;

// ============================================================================
// GEOMETRY
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Axis-aligned rectangle, min inclusive / max inclusive for hit purposes.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Rect {
    pub fn from_min_size(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { min_x: x, min_y: y, max_x: x + w, max_y: y + h }
    }

    pub fn from_center_size(center: Point, w: f32, h: f32) -> Self {
        Self {
            min_x: center.x - w * 0.5,
            min_y: center.y - h * 0.5,
            max_x: center.x + w * 0.5,
            max_y: center.y + h * 0.5,
        }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn expand(&self, pad: f32) -> Self {
        Self {
            min_x: self.min_x - pad,
            min_y: self.min_y - pad,
            max_x: self.max_x + pad,
            max_y: self.max_y + pad,
        }
    }

    pub fn scale(&self, factor: f32) -> Self {
        Self {
            min_x: self.min_x * factor,
            min_y: self.min_y * factor,
            max_x: self.max_x * factor,
            max_y: self.max_y * factor,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn top_right(&self) -> Point {
        Point::new(self.max_x, self.min_y)
    }
}

// ============================================================================
// COORDINATE MAPPING
// ============================================================================

/// Where the canvas surface currently sits on screen.
///
/// `display` is the on-screen bounding rectangle in device pixels;
/// `intrinsic_*` are the surface's own pixel dimensions (equal to the base
/// image). CSS-style scaling of the element only changes `display`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub display: Rect,
    pub intrinsic_width: u32,
    pub intrinsic_height: u32,
}

impl Viewport {
    pub fn new(display: Rect, intrinsic_width: u32, intrinsic_height: u32) -> Self {
        Self { display, intrinsic_width, intrinsic_height }
    }

    /// Identity mapping: the surface is shown at its native size at the origin.
    pub fn native(intrinsic_width: u32, intrinsic_height: u32) -> Self {
        Self::new(
            Rect::from_min_size(0.0, 0.0, intrinsic_width as f32, intrinsic_height as f32),
            intrinsic_width,
            intrinsic_height,
        )
    }

    /// Intrinsic pixels per displayed pixel (horizontal). `None` before layout.
    pub fn display_ratio(&self) -> Option<f32> {
        let w = self.display.width();
        if w > 0.0 {
            Some(self.intrinsic_width as f32 / w)
        } else {
            None
        }
    }

    pub fn to_image_space(&self, device: Point) -> Option<Point> {
        to_image_space(device, self.display, (self.intrinsic_width, self.intrinsic_height))
    }
}

/// Map a pointer position in device pixels into the surface's intrinsic pixel
/// space. Horizontal and vertical factors are computed independently.
///
/// Returns `None` while the element has no display size (before first layout).
pub fn to_image_space(device: Point, displayed: Rect, intrinsic: (u32, u32)) -> Option<Point> {
    let dw = displayed.width();
    let dh = displayed.height();
    if dw <= 0.0 || dh <= 0.0 {
        return None;
    }
    let sx = intrinsic.0 as f32 / dw;
    let sy = intrinsic.1 as f32 / dh;
    Some(Point::new(
        (device.x - displayed.min_x) * sx,
        (device.y - displayed.min_y) * sy,
    ))
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` into RGBA.
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => {
            let nib = |i: usize| {
                let v = u8::from_str_radix(hex.get(i..i + 1)?, 16).ok()?;
                Some(v * 17)
            };
            Some([nib(0)?, nib(1)?, nib(2)?, 255])
        }
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

// ============================================================================
// LAYER MODEL
// ============================================================================

pub type LayerId = Uuid;

/// Optional highlight box drawn behind a text run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextBackground {
    pub active: bool,
    pub color: [u8; 4],
    /// 0–100
    pub opacity: u8,
}

impl Default for TextBackground {
    fn default() -> Self {
        Self { active: false, color: [0, 0, 0, 255], opacity: 60 }
    }
}

/// Per-kind payload. Only the attributes meaningful to a kind exist on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LayerKind {
    Text {
        content: String,
        font_family: String,
        background: TextBackground,
    },
    Sticker {
        glyph: String,
    },
    Shape {
        shape: ShapeKind,
    },
    Logo {
        asset: AssetId,
    },
}

impl LayerKind {
    pub fn label(&self) -> &'static str {
        match self {
            LayerKind::Text { .. } => "text",
            LayerKind::Sticker { .. } => "sticker",
            LayerKind::Shape { .. } => "shape",
            LayerKind::Logo { .. } => "logo",
        }
    }

    /// Shapes and logos use explicit width/height; text and stickers ignore them.
    pub fn has_explicit_dimensions(&self) -> bool {
        matches!(self, LayerKind::Shape { .. } | LayerKind::Logo { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub kind: LayerKind,
    /// Center, in logical units.
    pub x: f32,
    pub y: f32,
    /// Base size: glyph size for text/stickers, fallback dimension otherwise.
    pub size: f32,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub color: [u8; 4],
    /// 0–100
    pub opacity: u8,
}

impl Layer {
    pub fn new(kind: LayerKind, at: Point, size: f32, color: [u8; 4], opacity: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            x: at.x,
            y: at.y,
            size,
            width: None,
            height: None,
            color,
            opacity: opacity.min(100),
        }
    }

    pub fn with_dimensions(mut self, width: f32, height: f32) -> Self {
        if self.kind.has_explicit_dimensions() {
            self.width = Some(width);
            self.height = Some(height);
        }
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Width/height for shape and logo layers, falling back to `size`.
    pub fn dimensions(&self) -> (f32, f32) {
        if self.kind.has_explicit_dimensions() {
            (self.width.unwrap_or(self.size), self.height.unwrap_or(self.size))
        } else {
            (self.size, self.size)
        }
    }

    pub fn alpha(&self) -> f32 {
        self.opacity.min(100) as f32 / 100.0
    }
}

/// Partial attribute update. Fields that do not apply to the target layer's
/// kind are ignored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub size: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub color: Option<[u8; 4]>,
    pub opacity: Option<u8>,
    /// Text content or sticker glyph.
    pub content: Option<String>,
    pub font_family: Option<String>,
    pub background_active: Option<bool>,
    pub background_color: Option<[u8; 4]>,
    pub background_opacity: Option<u8>,
    pub shape: Option<ShapeKind>,
}

impl LayerPatch {
    pub fn position(p: Point) -> Self {
        Self { x: Some(p.x), y: Some(p.y), ..Default::default() }
    }

    pub fn opacity(opacity: u8) -> Self {
        Self { opacity: Some(opacity), ..Default::default() }
    }

    fn apply(&self, layer: &mut Layer) {
        if let Some(x) = self.x {
            layer.x = x;
        }
        if let Some(y) = self.y {
            layer.y = y;
        }
        if let Some(size) = self.size {
            layer.size = size.max(1.0);
        }
        if let Some(color) = self.color {
            layer.color = color;
        }
        if let Some(opacity) = self.opacity {
            layer.opacity = opacity.min(100);
        }
        if layer.kind.has_explicit_dimensions() {
            if let Some(w) = self.width {
                layer.width = Some(w.max(1.0));
            }
            if let Some(h) = self.height {
                layer.height = Some(h.max(1.0));
            }
        }
        match &mut layer.kind {
            LayerKind::Text { content, font_family, background } => {
                if let Some(c) = &self.content {
                    content.clone_from(c);
                }
                if let Some(f) = &self.font_family {
                    font_family.clone_from(f);
                }
                if let Some(active) = self.background_active {
                    background.active = active;
                }
                if let Some(color) = self.background_color {
                    background.color = color;
                }
                if let Some(opacity) = self.background_opacity {
                    background.opacity = opacity.min(100);
                }
            }
            LayerKind::Sticker { glyph } => {
                if let Some(c) = &self.content {
                    glyph.clone_from(c);
                }
            }
            LayerKind::Shape { shape } => {
                if let Some(s) = self.shape {
                    *shape = s;
                }
            }
            LayerKind::Logo { .. } => {}
        }
    }
}

/// Ordered layer collection plus the single selection.
///
/// Insertion order is paint order. The layer list is shared copy-on-write, so
/// a snapshot taken before a mutation keeps seeing the old collection.
#[derive(Clone, Debug, Default)]
pub struct LayerStack {
    layers: Arc<Vec<Layer>>,
    selected: Option<LayerId>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Append on top and select it.
    pub fn insert(&mut self, layer: Layer) -> LayerId {
        let id = layer.id;
        if self.index_of(id).is_some() {
            // Ids are unique; a re-insert of the same id just selects it.
            self.selected = Some(id);
            return id;
        }
        Arc::make_mut(&mut self.layers).push(layer);
        self.selected = Some(id);
        id
    }

    /// Merge `patch` into layer `id`. Returns false (and does nothing) when
    /// the layer no longer exists.
    pub fn update(&mut self, id: LayerId, patch: &LayerPatch) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let mut updated = self.layers[idx].clone();
        patch.apply(&mut updated);
        if updated == self.layers[idx] {
            return true;
        }
        Arc::make_mut(&mut self.layers)[idx] = updated;
        true
    }

    pub fn delete(&mut self, id: LayerId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        Arc::make_mut(&mut self.layers).remove(idx);
        if self.selected == Some(id) {
            self.selected = None;
        }
        true
    }

    /// Select a live layer or clear the selection. Unknown ids clear it.
    pub fn select(&mut self, id: Option<LayerId>) {
        self.selected = id.filter(|id| self.index_of(*id).is_some());
    }

    /// Move a layer to the top of the paint order.
    pub fn raise_to_top(&mut self, id: LayerId) {
        let Some(idx) = self.index_of(id) else { return };
        if idx + 1 == self.layers.len() {
            return;
        }
        let layers = Arc::make_mut(&mut self.layers);
        let layer = layers.remove(idx);
        layers.push(layer);
    }

    pub fn clear(&mut self) {
        self.layers = Arc::new(Vec::new());
        self.selected = None;
    }

    pub fn snapshot(&self) -> Arc<Vec<Layer>> {
        Arc::clone(&self.layers)
    }

    /// True when the layer list is the very collection captured by `snapshot`.
    pub fn is_snapshot(&self, snapshot: &Arc<Vec<Layer>>) -> bool {
        Arc::ptr_eq(&self.layers, snapshot)
    }

    /// Swap in a previously captured collection; the selection survives only
    /// if its layer still exists there.
    pub fn restore(&mut self, snapshot: Arc<Vec<Layer>>) {
        self.layers = snapshot;
        let selected = self.selected;
        self.select(selected);
    }
}

// ============================================================================
// CANVAS STATE
// ============================================================================

/// Base image, layers and mask for one editing session.
pub struct CanvasState {
    base: Option<RgbaImage>,
    pub layers: LayerStack,
    mask: Option<MaskPainter>,
    logical_width: f32,
    /// Bumped every time the base image is replaced.
    generation: u64,
}

impl CanvasState {
    pub fn new(logical_width: f32) -> Self {
        Self {
            base: None,
            layers: LayerStack::new(),
            mask: None,
            logical_width: logical_width.max(1.0),
            generation: 0,
        }
    }

    pub fn base(&self) -> Option<&RgbaImage> {
        self.base.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn logical_width(&self) -> f32 {
        self.logical_width
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.base.as_ref().map(|b| b.dimensions())
    }

    /// Replace the base image. A new base always means a fresh canvas: layers,
    /// selection and mask are dropped.
    pub fn replace_base(&mut self, image: RgbaImage) {
        self.base = Some(image);
        self.layers.clear();
        self.mask = None;
        self.generation += 1;
    }

    /// Surface pixels per logical unit.
    pub fn scale_factor(&self) -> f32 {
        match &self.base {
            Some(b) => b.width() as f32 / self.logical_width,
            None => 1.0,
        }
    }

    pub fn logical_height(&self) -> f32 {
        match &self.base {
            Some(b) => b.height() as f32 / self.scale_factor(),
            None => self.logical_width,
        }
    }

    pub fn pixel_to_logical(&self, p: Point) -> Point {
        let s = self.scale_factor();
        Point::new(p.x / s, p.y / s)
    }

    pub fn logical_to_pixel(&self, p: Point) -> Point {
        let s = self.scale_factor();
        Point::new(p.x * s, p.y * s)
    }

    pub fn logical_center(&self) -> Point {
        Point::new(self.logical_width * 0.5, self.logical_height() * 0.5)
    }

    pub fn mask(&self) -> Option<&MaskPainter> {
        self.mask.as_ref()
    }

    pub fn has_mask_paint(&self) -> bool {
        self.mask.as_ref().is_some_and(|m| !m.is_empty())
    }

    /// Stamp the mask at a logical point; the mask is created on first use.
    /// Does nothing before a base image exists.
    pub fn paint_mask(&mut self, at: Point, diameter: f32, color: [u8; 4]) -> bool {
        let Some((w, h)) = self.dimensions() else {
            return false;
        };
        let s = self.scale_factor();
        let mask = self.mask.get_or_insert_with(|| MaskPainter::new(w, h, color));
        mask.paint_stroke(Point::new(at.x * s, at.y * s), diameter * s);
        true
    }

    pub fn clear_mask(&mut self) {
        if let Some(mask) = &mut self.mask {
            mask.clear();
        }
    }

    /// Drop every layer and the mask, keeping the base image.
    pub fn discard_all(&mut self) {
        self.layers.clear();
        self.mask = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_layer(at: Point) -> Layer {
        Layer::new(
            LayerKind::Text {
                content: "SALE".into(),
                font_family: "Inter".into(),
                background: TextBackground::default(),
            },
            at,
            48.0,
            [255, 255, 255, 255],
            100,
        )
    }

    #[test]
    fn to_image_space_is_invariant_under_display_scaling() {
        let intrinsic = (1600, 900);
        let reference = Rect::from_min_size(10.0, 20.0, 800.0, 450.0);
        let device = Point::new(210.0, 245.0);
        let expected = to_image_space(device, reference, intrinsic).unwrap();
        for s in [0.25_f32, 0.5, 1.0, 1.7, 3.0] {
            let displayed = Rect::from_min_size(10.0, 20.0, 800.0 * s, 450.0 * s);
            let scaled = Point::new(10.0 + (device.x - 10.0) * s, 20.0 + (device.y - 20.0) * s);
            let got = to_image_space(scaled, displayed, intrinsic).unwrap();
            assert!((got.x - expected.x).abs() < 1e-3, "scale {s}: {got:?}");
            assert!((got.y - expected.y).abs() < 1e-3, "scale {s}: {got:?}");
        }
        assert_eq!(expected, Point::new(400.0, 450.0));
    }

    #[test]
    fn to_image_space_guards_zero_display_size() {
        let r = Rect::from_min_size(0.0, 0.0, 0.0, 100.0);
        assert!(to_image_space(Point::new(1.0, 1.0), r, (100, 100)).is_none());
    }

    #[test]
    fn update_merges_only_given_fields() {
        let mut stack = LayerStack::new();
        let id = stack.insert(text_layer(Point::new(100.0, 100.0)));
        let before = stack.get(id).unwrap().clone();
        assert!(stack.update(id, &LayerPatch::opacity(42)));
        let after = stack.get(id).unwrap();
        assert_eq!(after.opacity, 42);
        assert_eq!(Layer { opacity: before.opacity, ..after.clone() }, before);
    }

    #[test]
    fn update_of_unknown_id_is_a_no_op() {
        let mut stack = LayerStack::new();
        let id = stack.insert(text_layer(Point::new(1.0, 1.0)));
        stack.delete(id);
        let snap = stack.snapshot();
        assert!(!stack.update(id, &LayerPatch::opacity(5)));
        assert!(stack.is_snapshot(&snap));
    }

    #[test]
    fn update_ignores_fields_of_other_kinds() {
        let mut stack = LayerStack::new();
        let id = stack.insert(text_layer(Point::new(1.0, 1.0)));
        let patch = LayerPatch { width: Some(300.0), shape: Some(ShapeKind::Ellipse), ..Default::default() };
        stack.update(id, &patch);
        let layer = stack.get(id).unwrap();
        assert_eq!(layer.width, None);
        assert!(matches!(layer.kind, LayerKind::Text { .. }));
    }

    #[test]
    fn deleting_selected_layer_clears_selection() {
        let mut stack = LayerStack::new();
        let a = stack.insert(text_layer(Point::new(1.0, 1.0)));
        let b = stack.insert(text_layer(Point::new(2.0, 2.0)));
        assert_eq!(stack.selected(), Some(b));
        stack.delete(b);
        assert_eq!(stack.selected(), None);
        stack.select(Some(a));
        stack.delete(b);
        assert_eq!(stack.selected(), Some(a));
    }

    #[test]
    fn update_replaces_collection_and_keeps_snapshot_intact() {
        let mut stack = LayerStack::new();
        let id = stack.insert(text_layer(Point::new(1.0, 1.0)));
        let snap = stack.snapshot();
        stack.update(id, &LayerPatch::position(Point::new(9.0, 9.0)));
        assert!(!stack.is_snapshot(&snap));
        assert_eq!(snap[0].x, 1.0);
        assert_eq!(stack.get(id).unwrap().x, 9.0);
    }

    #[test]
    fn raise_to_top_moves_layer_last() {
        let mut stack = LayerStack::new();
        let a = stack.insert(text_layer(Point::new(1.0, 1.0)));
        let b = stack.insert(text_layer(Point::new(2.0, 2.0)));
        stack.raise_to_top(a);
        let order: Vec<_> = stack.layers().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn replacing_base_resets_canvas() {
        let mut canvas = CanvasState::new(DEFAULT_LOGICAL_WIDTH);
        canvas.replace_base(RgbaImage::new(200, 100));
        canvas.layers.insert(text_layer(Point::new(5.0, 5.0)));
        assert!(canvas.paint_mask(Point::new(10.0, 10.0), 40.0, [0, 0, 255, 255]));
        canvas.replace_base(RgbaImage::new(400, 400));
        assert!(canvas.layers.is_empty());
        assert_eq!(canvas.layers.selected(), None);
        assert!(canvas.mask().is_none());
        assert_eq!(canvas.generation(), 2);
    }

    #[test]
    fn logical_space_scales_with_base_width() {
        let mut canvas = CanvasState::new(1000.0);
        canvas.replace_base(RgbaImage::new(2000, 1000));
        assert_eq!(canvas.scale_factor(), 2.0);
        assert_eq!(canvas.logical_height(), 500.0);
        assert_eq!(canvas.pixel_to_logical(Point::new(800.0, 400.0)), Point::new(400.0, 200.0));
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#fff"), Some([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("#3b82f6"), Some([0x3b, 0x82, 0xf6, 255]));
        assert_eq!(parse_hex_color("00000080"), Some([0, 0, 0, 0x80]));
        assert_eq!(parse_hex_color("#12"), None);
    }
}
