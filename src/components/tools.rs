use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasState, Layer, LayerId, LayerKind, LayerPatch, Point, TextBackground};
use crate::ops::hit::{hit_test, Hit, HitSlop};
use crate::ops::shapes::ShapeKind;
use crate::ops::text::FontBook;
use crate::settings::EngineConfig;

/// Glyphs offered by the sticker picker.
pub const STICKER_PRESETS: &[(&str, &str)] = &[
    ("fire", "🔥"),
    ("robot", "🤖"),
    ("sparkles", "✨"),
    ("rocket", "🚀"),
    ("diamond", "💎"),
    ("mobile", "📱"),
    ("thunder", "⚡"),
    ("star", "⭐"),
];

/// Font families offered by the style panel.
pub const FONT_PRESETS: &[&str] = &["Inter", "Orbitron", "Montserrat", "Playfair Display", "Space Grotesk"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    AddText,
    AddSticker,
    AddShape,
    AddLogo,
    PaintMask,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Select => "Select / Move",
            Tool::AddText => "Add Text",
            Tool::AddSticker => "Add Sticker",
            Tool::AddShape => "Add Shape",
            Tool::AddLogo => "Add Logo",
            Tool::PaintMask => "Paint Mask",
        }
    }
}

/// Attributes given to newly created layers; mirrors the style panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleDefaults {
    pub text: String,
    pub font_family: String,
    /// Text and shape colour.
    pub color: [u8; 4],
    pub text_size: f32,
    pub background: TextBackground,
    pub sticker: String,
    pub sticker_size: f32,
    pub shape: ShapeKind,
    pub shape_width: f32,
    pub shape_height: f32,
    /// Logo width in logical units; height follows the raster's aspect ratio.
    pub logo_width: f32,
    /// 0–100
    pub opacity: u8,
}

impl Default for StyleDefaults {
    fn default() -> Self {
        Self {
            text: "YOUR TEXT".to_string(),
            font_family: FONT_PRESETS[0].to_string(),
            color: [255, 255, 255, 255],
            text_size: 60.0,
            background: TextBackground::default(),
            sticker: STICKER_PRESETS[0].1.to_string(),
            sticker_size: 80.0,
            shape: ShapeKind::Rectangle,
            shape_width: 200.0,
            shape_height: 200.0,
            logo_width: 200.0,
            opacity: 100,
        }
    }
}

/// Transient pointer state between down and up.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    DraggingLayer { id: LayerId, offset: Point },
    PaintingMask,
}

/// What a pointer event did, so the session knows what to record and redraw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerOutcome {
    None,
    Created(LayerId),
    Selected(LayerId),
    Deleted(LayerId),
    Deselected,
    Moved(LayerId),
    Painted,
    /// The add-logo tool was clicked on empty canvas; the host should pick a
    /// file and hand its bytes to the session.
    RequestLogoFile { at: Point },
}

impl PointerOutcome {
    pub fn changes_pixels(&self) -> bool {
        !matches!(self, PointerOutcome::None | PointerOutcome::RequestLogoFile { .. })
    }
}

/// Pointer-event state machine. All points are in logical units.
#[derive(Clone, Debug)]
pub struct ToolController {
    pub active_tool: Tool,
    pub gesture: Gesture,
    /// Mask brush diameter in logical units; applies to subsequent stamps.
    pub brush_diameter: f32,
    pub style: StyleDefaults,
}

impl ToolController {
    pub fn new(config: &EngineConfig, style: StyleDefaults) -> Self {
        Self {
            active_tool: Tool::Select,
            gesture: Gesture::Idle,
            brush_diameter: config.brush_diameter,
            style,
        }
    }

    /// Switch tools. Any in-flight gesture ends; the selection is dropped when
    /// the configuration asks for it.
    pub fn set_tool(&mut self, tool: Tool, canvas: &mut CanvasState, config: &EngineConfig) -> bool {
        self.gesture = Gesture::Idle;
        if tool == self.active_tool {
            return false;
        }
        self.active_tool = tool;
        if config.clear_selection_on_tool_change && canvas.layers.selected().is_some() {
            canvas.layers.select(None);
            return true;
        }
        false
    }

    pub fn pointer_down(
        &mut self,
        at: Point,
        canvas: &mut CanvasState,
        fonts: &FontBook,
        config: &EngineConfig,
        slop: HitSlop,
    ) -> PointerOutcome {
        if self.active_tool == Tool::PaintMask {
            self.gesture = Gesture::PaintingMask;
            return if canvas.paint_mask(at, self.brush_diameter, config.mask_color) {
                PointerOutcome::Painted
            } else {
                PointerOutcome::None
            };
        }

        let hit = hit_test(at, canvas.layers.layers(), canvas.layers.selected(), fonts, slop);
        match hit {
            Some(Hit::DeleteHandle(id)) => {
                canvas.layers.delete(id);
                self.gesture = Gesture::Idle;
                crate::log_info!("Deleted layer {}", id);
                PointerOutcome::Deleted(id)
            }
            Some(Hit::Layer(id)) => {
                canvas.layers.select(Some(id));
                if config.raise_on_select {
                    canvas.layers.raise_to_top(id);
                }
                if let Some(layer) = canvas.layers.get(id) {
                    let offset = Point::new(at.x - layer.x, at.y - layer.y);
                    self.gesture = Gesture::DraggingLayer { id, offset };
                }
                PointerOutcome::Selected(id)
            }
            None => self.click_empty(at, canvas, config),
        }
    }

    fn click_empty(&mut self, at: Point, canvas: &mut CanvasState, config: &EngineConfig) -> PointerOutcome {
        self.gesture = Gesture::Idle;
        let layer = match self.active_tool {
            Tool::Select | Tool::PaintMask => {
                if canvas.layers.selected().is_none() {
                    return PointerOutcome::None;
                }
                canvas.layers.select(None);
                return PointerOutcome::Deselected;
            }
            Tool::AddLogo => {
                if !config.allow_logo_layers {
                    return PointerOutcome::None;
                }
                return PointerOutcome::RequestLogoFile { at };
            }
            Tool::AddText => self.new_text_layer(at, config),
            Tool::AddSticker => self.new_sticker_layer(at),
            Tool::AddShape => match self.new_shape_layer(at, config) {
                Some(layer) => layer,
                None => return PointerOutcome::None,
            },
        };
        crate::log_info!("Created {} layer {}", layer.kind.label(), layer.id);
        PointerOutcome::Created(canvas.layers.insert(layer))
    }

    pub fn new_text_layer(&self, at: Point, config: &EngineConfig) -> Layer {
        let mut background = self.style.background.clone();
        background.active &= config.allow_text_highlight;
        Layer::new(
            LayerKind::Text {
                content: self.style.text.clone(),
                font_family: self.style.font_family.clone(),
                background,
            },
            at,
            self.style.text_size,
            self.style.color,
            self.style.opacity,
        )
    }

    pub fn new_sticker_layer(&self, at: Point) -> Layer {
        Layer::new(
            LayerKind::Sticker { glyph: self.style.sticker.clone() },
            at,
            self.style.sticker_size,
            self.style.color,
            self.style.opacity,
        )
    }

    /// `None` when the configuration allows no shape kinds at all.
    pub fn new_shape_layer(&self, at: Point, config: &EngineConfig) -> Option<Layer> {
        let shape = if config.shape_kinds.contains(&self.style.shape) {
            self.style.shape
        } else {
            *config.shape_kinds.first()?
        };
        let layer = Layer::new(
            LayerKind::Shape { shape },
            at,
            self.style.shape_width.min(self.style.shape_height),
            self.style.color,
            self.style.opacity,
        )
        .with_dimensions(self.style.shape_width, self.style.shape_height);
        Some(layer)
    }

    pub fn pointer_move(&mut self, at: Point, canvas: &mut CanvasState, config: &EngineConfig) -> PointerOutcome {
        match self.gesture {
            Gesture::Idle => PointerOutcome::None,
            Gesture::DraggingLayer { id, offset } => {
                let target = Point::new(at.x - offset.x, at.y - offset.y);
                if canvas.layers.update(id, &LayerPatch::position(target)) {
                    PointerOutcome::Moved(id)
                } else {
                    // Deleted mid-gesture
                    self.gesture = Gesture::Idle;
                    PointerOutcome::None
                }
            }
            Gesture::PaintingMask => {
                if canvas.paint_mask(at, self.brush_diameter, config.mask_color) {
                    PointerOutcome::Painted
                } else {
                    PointerOutcome::None
                }
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.gesture = Gesture::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    const SLOP: HitSlop = HitSlop { padding: 10.0, handle_radius: 15.0 };

    fn setup() -> (ToolController, CanvasState, FontBook, EngineConfig) {
        let config = EngineConfig::default();
        let mut canvas = CanvasState::new(config.logical_width);
        canvas.replace_base(RgbaImage::new(1000, 1000));
        (ToolController::new(&config, StyleDefaults::default()), canvas, FontBook::new(), config)
    }

    #[test]
    fn add_text_then_drag() {
        let (mut tools, mut canvas, fonts, config) = setup();
        tools.set_tool(Tool::AddText, &mut canvas, &config);
        let out = tools.pointer_down(Point::new(500.0, 500.0), &mut canvas, &fonts, &config, SLOP);
        let PointerOutcome::Created(id) = out else { panic!("expected a new layer, got {out:?}") };
        tools.pointer_up();
        assert_eq!(canvas.layers.selected(), Some(id));

        tools.set_tool(Tool::Select, &mut canvas, &config);
        tools.pointer_down(Point::new(500.0, 500.0), &mut canvas, &fonts, &config, SLOP);
        tools.pointer_move(Point::new(600.0, 450.0), &mut canvas, &config);
        tools.pointer_up();
        let layer = canvas.layers.get(id).unwrap();
        assert_eq!((layer.x, layer.y), (600.0, 450.0));
        assert_eq!(canvas.layers.len(), 1);
    }

    #[test]
    fn drag_keeps_grab_offset() {
        let (mut tools, mut canvas, fonts, config) = setup();
        let id = canvas.layers.insert(tools.new_sticker_layer(Point::new(100.0, 100.0)));
        canvas.layers.select(None);
        tools.pointer_down(Point::new(120.0, 90.0), &mut canvas, &fonts, &config, SLOP);
        tools.pointer_move(Point::new(220.0, 190.0), &mut canvas, &config);
        let layer = canvas.layers.get(id).unwrap();
        assert_eq!((layer.x, layer.y), (200.0, 200.0));
    }

    #[test]
    fn select_tool_miss_clears_selection() {
        let (mut tools, mut canvas, fonts, config) = setup();
        canvas.layers.insert(tools.new_sticker_layer(Point::new(100.0, 100.0)));
        let out = tools.pointer_down(Point::new(800.0, 800.0), &mut canvas, &fonts, &config, SLOP);
        assert_eq!(out, PointerOutcome::Deselected);
        assert_eq!(canvas.layers.selected(), None);
        assert_eq!(canvas.layers.len(), 1);
    }

    #[test]
    fn tool_change_clears_selection_when_configured() {
        let (mut tools, mut canvas, _fonts, mut config) = setup();
        canvas.layers.insert(tools.new_sticker_layer(Point::new(100.0, 100.0)));
        config.clear_selection_on_tool_change = false;
        tools.set_tool(Tool::AddShape, &mut canvas, &config);
        assert!(canvas.layers.selected().is_some());
        config.clear_selection_on_tool_change = true;
        tools.set_tool(Tool::Select, &mut canvas, &config);
        assert!(canvas.layers.selected().is_none());
    }

    #[test]
    fn mask_tool_paints_on_down_and_move() {
        let (mut tools, mut canvas, fonts, config) = setup();
        tools.set_tool(Tool::PaintMask, &mut canvas, &config);
        assert_eq!(
            tools.pointer_down(Point::new(50.0, 50.0), &mut canvas, &fonts, &config, SLOP),
            PointerOutcome::Painted
        );
        assert_eq!(tools.pointer_move(Point::new(60.0, 50.0), &mut canvas, &config), PointerOutcome::Painted);
        tools.pointer_up();
        assert_eq!(tools.pointer_move(Point::new(70.0, 50.0), &mut canvas, &config), PointerOutcome::None);
        assert!(canvas.has_mask_paint());
        assert!(canvas.layers.is_empty());
    }

    #[test]
    fn logo_tool_requests_a_file() {
        let (mut tools, mut canvas, fonts, mut config) = setup();
        tools.set_tool(Tool::AddLogo, &mut canvas, &config);
        let at = Point::new(300.0, 300.0);
        assert_eq!(
            tools.pointer_down(at, &mut canvas, &fonts, &config, SLOP),
            PointerOutcome::RequestLogoFile { at }
        );
        config.allow_logo_layers = false;
        assert_eq!(tools.pointer_down(at, &mut canvas, &fonts, &config, SLOP), PointerOutcome::None);
    }

    #[test]
    fn disallowed_shape_falls_back_to_first_allowed() {
        let (mut tools, _canvas, _fonts, mut config) = setup();
        config.shape_kinds = vec![ShapeKind::Ellipse];
        tools.style.shape = ShapeKind::Triangle;
        let layer = tools.new_shape_layer(Point::new(0.0, 0.0), &config).unwrap();
        assert_eq!(layer.kind, LayerKind::Shape { shape: ShapeKind::Ellipse });
        config.shape_kinds.clear();
        assert!(tools.new_shape_layer(Point::new(0.0, 0.0), &config).is_none());
    }

    #[test]
    fn highlight_is_suppressed_when_disabled() {
        let (mut tools, _canvas, _fonts, mut config) = setup();
        tools.style.background.active = true;
        config.allow_text_highlight = false;
        let layer = tools.new_text_layer(Point::new(0.0, 0.0), &config);
        let LayerKind::Text { background, .. } = layer.kind else { unreachable!() };
        assert!(!background.active);
    }
}
