use crate::canvas::{Layer, LayerId, LayerKind, Point, Rect};
use crate::ops::text::FontBook;

/// Result of a pointer hit-test, in precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hit {
    /// The delete handle of the selected layer.
    DeleteHandle(LayerId),
    Layer(LayerId),
}

/// Pointer tolerances in logical units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitSlop {
    /// Margin added on every side of a layer's box.
    pub padding: f32,
    /// Radius of the circular delete-handle zone.
    pub handle_radius: f32,
}

impl HitSlop {
    /// Grow tolerances when the surface is displayed smaller than its
    /// intrinsic size, so they stay constant on screen.
    pub fn scaled(self, display_ratio: f32) -> Self {
        let k = if display_ratio.is_finite() && display_ratio > 0.0 { display_ratio } else { 1.0 };
        Self { padding: self.padding * k, handle_radius: self.handle_radius * k }
    }
}

/// Unpadded axis-aligned box of a layer in logical units.
pub fn layer_bounds(layer: &Layer, fonts: &FontBook) -> Rect {
    let (w, h) = match &layer.kind {
        LayerKind::Text { content, font_family, .. } => fonts.measure(font_family, content, layer.size),
        LayerKind::Sticker { .. } => (layer.size, layer.size),
        LayerKind::Shape { .. } | LayerKind::Logo { .. } => layer.dimensions(),
    };
    Rect::from_center_size(layer.position(), w, h)
}

/// Padded box used for selection and its affordance.
pub fn padded_bounds(layer: &Layer, fonts: &FontBook, slop: HitSlop) -> Rect {
    layer_bounds(layer, fonts).expand(slop.padding)
}

/// Centre of the delete handle: the top-right corner of the padded box.
pub fn delete_handle_center(layer: &Layer, fonts: &FontBook, slop: HitSlop) -> Point {
    padded_bounds(layer, fonts, slop).top_right()
}

/// Resolve what lies under `point`.
///
/// The selected layer's delete handle wins over everything. Otherwise layers
/// are tested topmost first and the first padded box containing the point is
/// reported.
pub fn hit_test(
    point: Point,
    layers: &[Layer],
    selected: Option<LayerId>,
    fonts: &FontBook,
    slop: HitSlop,
) -> Option<Hit> {
    if let Some(layer) = selected.and_then(|id| layers.iter().find(|l| l.id == id)) {
        let handle = delete_handle_center(layer, fonts, slop);
        if point.distance_sq(handle) <= slop.handle_radius * slop.handle_radius {
            return Some(Hit::DeleteHandle(layer.id));
        }
    }

    layers
        .iter()
        .rev()
        .find(|layer| padded_bounds(layer, fonts, slop).contains(point))
        .map(|layer| Hit::Layer(layer.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TextBackground;
    use crate::ops::shapes::ShapeKind;

    const SLOP: HitSlop = HitSlop { padding: 10.0, handle_radius: 15.0 };

    fn shape(at: Point, w: f32, h: f32) -> Layer {
        Layer::new(LayerKind::Shape { shape: ShapeKind::Rectangle }, at, 100.0, [0, 0, 0, 255], 100)
            .with_dimensions(w, h)
    }

    fn sticker(at: Point, size: f32) -> Layer {
        Layer::new(LayerKind::Sticker { glyph: "★".into() }, at, size, [0, 0, 0, 255], 100)
    }

    #[test]
    fn topmost_layer_wins() {
        let fonts = FontBook::new();
        let a = shape(Point::new(300.0, 300.0), 200.0, 200.0);
        let b = sticker(Point::new(300.0, 300.0), 100.0);
        let layers = vec![a.clone(), b.clone()];
        let hit = hit_test(Point::new(300.0, 300.0), &layers, None, &fonts, SLOP);
        assert_eq!(hit, Some(Hit::Layer(b.id)));
        // Outside the sticker but inside the rectangle
        let hit = hit_test(Point::new(210.0, 210.0), &layers, None, &fonts, SLOP);
        assert_eq!(hit, Some(Hit::Layer(a.id)));
    }

    #[test]
    fn delete_handle_beats_body() {
        let fonts = FontBook::new();
        let s = sticker(Point::new(300.0, 300.0), 100.0);
        let layers = vec![s.clone()];
        // Inside both the padded box and the handle circle at (360, 240)
        let p = Point::new(355.0, 245.0);
        assert!(padded_bounds(&s, &fonts, SLOP).contains(p));
        assert_eq!(hit_test(p, &layers, Some(s.id), &fonts, SLOP), Some(Hit::DeleteHandle(s.id)));
        assert_eq!(hit_test(p, &layers, None, &fonts, SLOP), Some(Hit::Layer(s.id)));
    }

    #[test]
    fn padding_extends_hit_area() {
        let fonts = FontBook::new();
        let s = sticker(Point::new(100.0, 100.0), 40.0);
        let layers = vec![s.clone()];
        assert_eq!(hit_test(Point::new(128.0, 100.0), &layers, None, &fonts, SLOP), Some(Hit::Layer(s.id)));
        assert_eq!(hit_test(Point::new(131.0, 100.0), &layers, None, &fonts, SLOP), None);
    }

    #[test]
    fn text_uses_measured_width() {
        let fonts = FontBook::new();
        let text = Layer::new(
            LayerKind::Text {
                content: "HELLO".into(),
                font_family: "Inter".into(),
                background: TextBackground::default(),
            },
            Point::new(500.0, 500.0),
            40.0,
            [255, 255, 255, 255],
            100,
        );
        // Fallback metrics: 5 chars * 0.6 * 40 = 120 wide, 40 tall
        let b = layer_bounds(&text, &fonts);
        assert_eq!(b, Rect::from_center_size(Point::new(500.0, 500.0), 120.0, 40.0));
        let layers = vec![text.clone()];
        assert!(hit_test(Point::new(565.0, 500.0), &layers, None, &fonts, SLOP).is_some());
        assert!(hit_test(Point::new(500.0, 535.0), &layers, None, &fonts, SLOP).is_none());
    }

    #[test]
    fn empty_click_misses() {
        let fonts = FontBook::new();
        assert_eq!(hit_test(Point::new(1.0, 1.0), &[], None, &fonts, SLOP), None);
    }

    #[test]
    fn slop_scales_with_display_ratio() {
        let s = SLOP.scaled(2.0);
        assert_eq!(s.padding, 20.0);
        assert_eq!(s.handle_radius, 30.0);
        assert_eq!(SLOP.scaled(0.0), SLOP);
    }
}
