use std::path::{Path, PathBuf};

use crate::canvas::DEFAULT_LOGICAL_WIDTH;
use crate::components::tools::StyleDefaults;
use crate::error::StudioError;
use crate::ops::mask::DEFAULT_MASK_COLOR;
use crate::ops::shapes::ShapeKind;

/// Engine constants and capability toggles. One engine, configured per
/// editor variant, rather than a copy per variant.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Width of the logical coordinate space layers are placed in.
    pub logical_width: f32,
    /// Hit-test margin around every layer, logical units.
    pub hit_padding: f32,
    /// Delete-handle radius, logical units.
    pub handle_radius: f32,
    /// Padding of the text highlight box, logical units.
    pub highlight_padding: f32,
    /// Initial mask brush diameter, logical units.
    pub brush_diameter: f32,
    pub mask_color: [u8; 4],
    /// Selection rectangle and delete-handle colour.
    pub affordance_color: [u8; 4],
    pub clear_selection_on_tool_change: bool,
    pub raise_on_select: bool,
    pub allow_logo_layers: bool,
    pub allow_text_highlight: bool,
    pub shape_kinds: Vec<ShapeKind>,
    pub max_undo_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            logical_width: DEFAULT_LOGICAL_WIDTH,
            hit_padding: 10.0,
            handle_radius: 15.0,
            highlight_padding: 12.0,
            brush_diameter: 40.0,
            mask_color: DEFAULT_MASK_COLOR,
            affordance_color: [59, 130, 246, 255],
            clear_selection_on_tool_change: true,
            raise_on_select: false,
            allow_logo_layers: true,
            allow_text_highlight: true,
            shape_kinds: ShapeKind::all().to_vec(),
            max_undo_steps: 50,
        }
    }
}

/// Everything persisted between sessions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudioSettings {
    pub engine: EngineConfig,
    pub style: StyleDefaults,
}

impl StudioSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/postercraft/postercraft_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PosterCraft\postercraft_settings.cfg
    /// On macOS:   ~/Library/Application Support/PosterCraft/postercraft_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("PosterCraft").join("postercraft_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PosterCraft")
                    .join("postercraft_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("postercraft").join("postercraft_settings.cfg"))
        }
    }

    /// Load settings from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), StudioError> {
        let path = Self::settings_path()
            .ok_or_else(|| StudioError::Settings("no configuration directory".to_string()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StudioError> {
        crate::io::write_bytes(self.to_config_string().as_bytes(), path)
    }

    fn color_to_str(c: [u8; 4]) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    /// Parse "r,g,b,a" or a hex colour.
    fn str_to_color(s: &str) -> Option<[u8; 4]> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let mut c = [0u8; 4];
            for (slot, part) in c.iter_mut().zip(&parts) {
                *slot = part.trim().parse().ok()?;
            }
            Some(c)
        } else {
            crate::canvas::parse_hex_color(s)
        }
    }

    pub fn to_config_string(&self) -> String {
        let e = &self.engine;
        let s = &self.style;
        let shapes: Vec<&str> = e.shape_kinds.iter().map(|k| k.as_str()).collect();
        format!(
            "logical_width={}\n\
             hit_padding={}\n\
             handle_radius={}\n\
             highlight_padding={}\n\
             brush_diameter={}\n\
             mask_color={}\n\
             affordance_color={}\n\
             clear_selection_on_tool_change={}\n\
             raise_on_select={}\n\
             allow_logo_layers={}\n\
             allow_text_highlight={}\n\
             shape_kinds={}\n\
             max_undo_steps={}\n\
             default_text={}\n\
             default_font_family={}\n\
             default_color={}\n\
             default_text_size={}\n\
             default_sticker={}\n\
             default_sticker_size={}\n\
             default_shape={}\n\
             default_shape_width={}\n\
             default_shape_height={}\n\
             default_logo_width={}\n\
             default_highlight={}\n\
             default_highlight_color={}\n\
             default_highlight_opacity={}\n\
             default_opacity={}\n",
            e.logical_width,
            e.hit_padding,
            e.handle_radius,
            e.highlight_padding,
            e.brush_diameter,
            Self::color_to_str(e.mask_color),
            Self::color_to_str(e.affordance_color),
            e.clear_selection_on_tool_change,
            e.raise_on_select,
            e.allow_logo_layers,
            e.allow_text_highlight,
            shapes.join(","),
            e.max_undo_steps,
            s.text,
            s.font_family,
            Self::color_to_str(s.color),
            s.text_size,
            s.sticker,
            s.sticker_size,
            s.shape.as_str(),
            s.shape_width,
            s.shape_height,
            s.logo_width,
            s.background.active,
            Self::color_to_str(s.background.color),
            s.background.opacity,
            s.opacity,
        )
    }

    /// Unknown keys are ignored; malformed values keep their defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        let d = EngineConfig::default();
        let finite = |val: &str, fallback: f32| val.parse::<f32>().ok().filter(|v| v.is_finite()).unwrap_or(fallback);
        let positive = |val: &str, fallback: f32| {
            val.parse::<f32>().ok().filter(|v| v.is_finite() && *v > 0.0).unwrap_or(fallback)
        };
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "logical_width" => s.engine.logical_width = positive(val, d.logical_width),
                "hit_padding" => s.engine.hit_padding = finite(val, d.hit_padding),
                "handle_radius" => s.engine.handle_radius = positive(val, d.handle_radius),
                "highlight_padding" => s.engine.highlight_padding = finite(val, d.highlight_padding),
                "brush_diameter" => s.engine.brush_diameter = positive(val, d.brush_diameter),
                "mask_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.engine.mask_color = c;
                    }
                }
                "affordance_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.engine.affordance_color = c;
                    }
                }
                "clear_selection_on_tool_change" => s.engine.clear_selection_on_tool_change = val == "true",
                "raise_on_select" => s.engine.raise_on_select = val == "true",
                "allow_logo_layers" => s.engine.allow_logo_layers = val == "true",
                "allow_text_highlight" => s.engine.allow_text_highlight = val == "true",
                "shape_kinds" => {
                    s.engine.shape_kinds = val.split(',').filter_map(ShapeKind::parse).collect();
                }
                "max_undo_steps" => s.engine.max_undo_steps = val.parse().unwrap_or(d.max_undo_steps),
                "default_text" => s.style.text = val.to_string(),
                "default_font_family" => {
                    if !val.is_empty() {
                        s.style.font_family = val.to_string();
                    }
                }
                "default_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.style.color = c;
                    }
                }
                "default_text_size" => s.style.text_size = positive(val, s.style.text_size),
                "default_sticker" => {
                    if !val.is_empty() {
                        s.style.sticker = val.to_string();
                    }
                }
                "default_sticker_size" => s.style.sticker_size = positive(val, s.style.sticker_size),
                "default_shape" => {
                    if let Some(k) = ShapeKind::parse(val) {
                        s.style.shape = k;
                    }
                }
                "default_shape_width" => s.style.shape_width = positive(val, s.style.shape_width),
                "default_shape_height" => s.style.shape_height = positive(val, s.style.shape_height),
                "default_logo_width" => s.style.logo_width = positive(val, s.style.logo_width),
                "default_highlight" => s.style.background.active = val == "true",
                "default_highlight_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.style.background.color = c;
                    }
                }
                "default_highlight_opacity" => {
                    if let Ok(o) = val.parse::<u8>() {
                        s.style.background.opacity = o.min(100);
                    }
                }
                "default_opacity" => {
                    if let Ok(o) = val.parse::<u8>() {
                        s.style.opacity = o.min(100);
                    }
                }
                _ => {
                    crate::log_warn!("Ignoring unknown settings key '{}'", key);
                }
            }
        }
        s
    }
}
