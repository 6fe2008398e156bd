// ============================================================================
// PosterCraft CLI: headless layer rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   postercraft -i photo.png --layers scene.json -o poster.png
//   postercraft -i shots/*.jpg --layers scene.json --output-dir out/
//   postercraft -i photo.png --font Inter=Inter.ttf --layers scene.json
//   postercraft -i photo.png --mask-stroke 500,500,60 --mask-output mask.png
//
// The scene file is a JSON array of layers in logical units (the canvas is
// 1000 units wide unless the settings say otherwise):
//   [{"type": "text", "content": "SALE", "x": 500, "y": 120, "size": 80},
//    {"type": "shape", "shape": "ellipse", "x": 500, "y": 500, "width": 300, "height": 200, "color": "#ff000080"},
//    {"type": "logo", "path": "logo.png", "x": 880, "y": 90, "width": 160}]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use serde::Deserialize;

use crate::canvas::{parse_hex_color, Layer, LayerKind, LayerPatch, Point, TextBackground};
use crate::ops::shapes::ShapeKind;
use crate::project::Session;
use crate::settings::StudioSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PosterCraft headless renderer.
///
/// Composite text, sticker, shape and logo layers over images and export PNG.
#[derive(Parser, Debug)]
#[command(
    name = "postercraft",
    about = "PosterCraft headless poster layer renderer",
    long_about = "Render a JSON list of text, sticker, shape and logo layers over one or\n\
                  more base images and write the flattened result as PNG. A mask can be\n\
                  painted from brush stamps and exported alongside.\n\n\
                  Example:\n  \
                  postercraft -i photo.png --layers scene.json -o poster.png\n  \
                  postercraft -i *.jpg --layers scene.json --output-dir out/"
)]
pub struct CliArgs {
    /// Base image file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// JSON scene file with the layers to composite.
    #[arg(short, long, value_name = "SCENE.json")]
    pub layers: Option<PathBuf>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Register a font for text and sticker layers. The first one registered
    /// is the fallback for unknown families.
    #[arg(long, value_name = "FAMILY=PATH")]
    pub font: Vec<String>,

    /// Mask brush stamp in logical units; repeatable.
    #[arg(long, value_name = "X,Y,DIAMETER")]
    pub mask_stroke: Vec<String>,

    /// Where to write the mask (single input) or a suffix-named mask per
    /// input when --output-dir is used.
    #[arg(long, value_name = "FILE")]
    pub mask_output: Option<PathBuf>,

    /// Settings file to use instead of the per-user one.
    #[arg(long, value_name = "FILE.cfg")]
    pub settings: Option<PathBuf>,

    /// Print per-file timing and mirror logged warnings to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Scene file
// ============================================================================

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum SceneKind {
    Text {
        content: String,
        #[serde(default)]
        font_family: Option<String>,
        #[serde(default)]
        background: Option<SceneBackground>,
    },
    Sticker {
        glyph: String,
    },
    Shape {
        shape: String,
    },
    Logo {
        path: PathBuf,
    },
}

#[derive(Deserialize, Debug, Clone)]
struct SceneBackground {
    color: String,
    #[serde(default = "default_background_opacity")]
    opacity: u8,
}

fn default_background_opacity() -> u8 {
    TextBackground::default().opacity
}

#[derive(Deserialize, Debug, Clone)]
struct SceneLayer {
    #[serde(flatten)]
    kind: SceneKind,
    x: f32,
    y: f32,
    #[serde(default)]
    size: Option<f32>,
    #[serde(default)]
    width: Option<f32>,
    #[serde(default)]
    height: Option<f32>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    opacity: Option<u8>,
}

struct Scene {
    layers: Vec<SceneLayer>,
    /// Logo paths are relative to the scene file.
    root: PathBuf,
}

fn load_scene(path: &Path) -> Result<Scene, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    let layers: Vec<SceneLayer> =
        serde_json::from_str(&text).map_err(|e| format!("invalid scene '{}': {}", path.display(), e))?;
    let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(Scene { layers, root })
}

fn parse_stroke(s: &str) -> Option<(Point, f32)> {
    let parts: Vec<f32> = s.split(',').map(|p| p.trim().parse().ok()).collect::<Option<_>>()?;
    match parts.as_slice() {
        [x, y, d] if *d > 0.0 => Some((Point::new(*x, *y), *d)),
        _ => None,
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let settings = match &args.settings {
        Some(path) => StudioSettings::load_from(path),
        None => StudioSettings::load(),
    };

    let scene = match &args.layers {
        Some(path) => match load_scene(path) {
            Ok(scene) => Some(scene),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let mut fonts = Vec::new();
    for entry in &args.font {
        let Some((family, path)) = entry.split_once('=') else {
            eprintln!("error: --font expects FAMILY=PATH, got '{}'", entry);
            return ExitCode::FAILURE;
        };
        match std::fs::read(path) {
            Ok(bytes) => fonts.push((family.to_string(), bytes)),
            Err(e) => {
                eprintln!("error: could not read font '{}': {}", path, e);
                return ExitCode::FAILURE;
            }
        }
    }

    let mut strokes = Vec::new();
    for s in &args.mask_stroke {
        match parse_stroke(s) {
            Some(stroke) => strokes.push(stroke),
            None => {
                eprintln!("error: --mask-stroke expects X,Y,DIAMETER, got '{}'", s);
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };
        let mask_path = args.mask_output.as_deref().map(|m| mask_output_path(m, input_path, multi));

        let job = Job { settings: &settings, scene: scene.as_ref(), fonts: &fonts, strokes: &strokes };
        match job.run(input_path, &output_path, mask_path.as_deref()) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                crate::log_err!("{}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

struct Job<'a> {
    settings: &'a StudioSettings,
    scene: Option<&'a Scene>,
    fonts: &'a [(String, Vec<u8>)],
    strokes: &'a [(Point, f32)],
}

impl Job<'_> {
    fn run(&self, input: &Path, output: &Path, mask_output: Option<&Path>) -> Result<(), String> {
        // -- Step 1: Load ----------------------------------------------------
        let mut session = Session::from_settings(self.settings.clone());
        for (family, bytes) in self.fonts {
            session.register_font(family, bytes.clone()).map_err(|e| e.to_string())?;
        }
        let bytes = std::fs::read(input).map_err(|e| format!("load failed: {}", e))?;
        session.load_base_image(&bytes).map_err(|e| format!("load failed: {}", e))?;

        // -- Step 2: Layers and mask -----------------------------------------
        if let Some(scene) = self.scene {
            for layer in &scene.layers {
                add_scene_layer(&mut session, layer, &scene.root)?;
            }
        }
        session.wait_for_assets();
        if let Some(e) = session.last_error() {
            return Err(e.to_string());
        }
        for (at, diameter) in self.strokes {
            session.paint_mask(*at, *diameter);
        }

        // -- Step 3: Save ----------------------------------------------------
        let png = session.export_png().map_err(|e| format!("save failed: {}", e))?;
        crate::io::write_bytes(&png, output).map_err(|e| format!("save failed: {}", e))?;
        if let Some(path) = mask_output {
            let mask = session.export_mask_png().map_err(|e| format!("mask export failed: {}", e))?;
            crate::io::write_bytes(&mask, path).map_err(|e| format!("mask export failed: {}", e))?;
        }
        Ok(())
    }
}

fn add_scene_layer(session: &mut Session, scene: &SceneLayer, root: &Path) -> Result<(), String> {
    let style = session.style().clone();
    let at = Point::new(scene.x, scene.y);
    let color = match &scene.color {
        Some(hex) => parse_hex_color(hex).ok_or_else(|| format!("invalid colour '{}'", hex))?,
        None => style.color,
    };
    let opacity = scene.opacity.unwrap_or(style.opacity).min(100);

    let layer = match &scene.kind {
        SceneKind::Text { content, font_family, background } => {
            let background = match background {
                Some(bg) => TextBackground {
                    active: true,
                    color: parse_hex_color(&bg.color).ok_or_else(|| format!("invalid colour '{}'", bg.color))?,
                    opacity: bg.opacity.min(100),
                },
                None => TextBackground::default(),
            };
            let kind = LayerKind::Text {
                content: content.clone(),
                font_family: font_family.clone().unwrap_or(style.font_family),
                background,
            };
            Layer::new(kind, at, scene.size.unwrap_or(style.text_size), color, opacity)
        }
        SceneKind::Sticker { glyph } => Layer::new(
            LayerKind::Sticker { glyph: glyph.clone() },
            at,
            scene.size.unwrap_or(style.sticker_size),
            color,
            opacity,
        ),
        SceneKind::Shape { shape } => {
            let shape = ShapeKind::parse(shape).ok_or_else(|| format!("unknown shape '{}'", shape))?;
            if !session.config().shape_kinds.contains(&shape) {
                return Err(format!("shape '{}' is disabled", shape.as_str()));
            }
            let size = scene.size.unwrap_or(style.shape_width.min(style.shape_height));
            let mut layer = Layer::new(LayerKind::Shape { shape }, at, size, color, opacity);
            if scene.width.is_some() || scene.height.is_some() || scene.size.is_none() {
                layer = layer.with_dimensions(
                    scene.width.unwrap_or(style.shape_width),
                    scene.height.unwrap_or(style.shape_height),
                );
            }
            layer
        }
        SceneKind::Logo { path } => {
            let full = root.join(path);
            let bytes = std::fs::read(&full).map_err(|e| format!("could not read logo '{}': {}", full.display(), e))?;
            let id = session.add_logo(bytes, Some(at)).map_err(|e| format!("logo '{}': {}", full.display(), e))?;
            let (w, h) = session.layer(id).map(|l| l.dimensions()).unwrap_or_default();
            let patch = match (scene.width, scene.height) {
                (Some(width), Some(height)) => LayerPatch { width: Some(width), height: Some(height), ..Default::default() },
                (Some(width), None) if w > 0.0 => {
                    LayerPatch { width: Some(width), height: Some(width * h / w), ..Default::default() }
                }
                (None, Some(height)) if h > 0.0 => {
                    LayerPatch { width: Some(height * w / h), height: Some(height), ..Default::default() }
                }
                _ => LayerPatch::default(),
            };
            let patch = LayerPatch { opacity: Some(opacity), ..patch };
            session.update_layer(id, &patch);
            return Ok(());
        }
    };
    session.insert_layer(layer).map_err(|e| e.to_string())?;
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: next to the input as `<stem>_poster.png`
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    Some(parent.join(format!("{}_poster.png", stem)))
}

/// With several inputs the mask path gets the input stem appended.
fn mask_output_path(mask: &Path, input: &Path, multi: bool) -> PathBuf {
    if !multi {
        return mask.to_path_buf();
    }
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let mask_stem = mask.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "mask".into());
    let parent = mask.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{}_{}.png", mask_stem, stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_json_parses_every_kind() {
        let json = r##"[
            {"type": "text", "content": "SALE", "x": 500, "y": 120, "size": 80,
             "background": {"color": "#000000"}},
            {"type": "sticker", "glyph": "🔥", "x": 100, "y": 100},
            {"type": "shape", "shape": "triangle", "x": 500, "y": 500, "width": 300, "height": 200, "color": "#ff000080"},
            {"type": "logo", "path": "logo.png", "x": 880, "y": 90, "width": 160, "opacity": 50}
        ]"##;
        let layers: Vec<SceneLayer> = serde_json::from_str(json).unwrap();
        assert_eq!(layers.len(), 4);
        assert!(matches!(&layers[0].kind, SceneKind::Text { background: Some(bg), .. } if bg.opacity == 60));
        assert!(matches!(&layers[2].kind, SceneKind::Shape { shape } if shape == "triangle"));
        assert_eq!(layers[3].opacity, Some(50));
    }

    #[test]
    fn strokes_parse_or_reject() {
        assert_eq!(parse_stroke("50, 50, 20"), Some((Point::new(50.0, 50.0), 20.0)));
        assert_eq!(parse_stroke("50,50"), None);
        assert_eq!(parse_stroke("50,50,-1"), None);
        assert_eq!(parse_stroke("a,b,c"), None);
    }

    #[test]
    fn output_paths() {
        let input = Path::new("shots/a.jpg");
        assert_eq!(build_output_path(input, None, None), Some(PathBuf::from("shots/a_poster.png")));
        assert_eq!(build_output_path(input, None, Some(Path::new("out"))), Some(PathBuf::from("out/a.png")));
        assert_eq!(mask_output_path(Path::new("m/mask.png"), input, true), PathBuf::from("m/mask_a.png"));
        assert_eq!(mask_output_path(Path::new("m/mask.png"), input, false), PathBuf::from("m/mask.png"));
    }

    #[test]
    fn renders_scene_end_to_end() {
        let dir = std::env::temp_dir().join(format!("postercraft-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("base.png");
        crate::io::write_png(&image::RgbaImage::from_pixel(200, 100, image::Rgba([0, 0, 0, 255])), &base).unwrap();
        crate::io::write_png(&image::RgbaImage::from_pixel(10, 10, image::Rgba([0, 0, 255, 255])), &dir.join("logo.png"))
            .unwrap();
        let scene = dir.join("scene.json");
        std::fs::write(
            &scene,
            r##"[{"type": "shape", "shape": "rect", "x": 250, "y": 250, "width": 100, "height": 100, "color": "#ff0000"},
                {"type": "logo", "path": "logo.png", "x": 750, "y": 250, "width": 100}]"##,
        )
        .unwrap();
        let out = dir.join("out.png");
        let mask = dir.join("mask.png");
        let args = CliArgs::parse_from([
            "postercraft",
            "-i",
            base.to_str().unwrap(),
            "--layers",
            scene.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--mask-stroke",
            "500,250,100",
            "--mask-output",
            mask.to_str().unwrap(),
            "--settings",
            dir.join("none.cfg").to_str().unwrap(),
        ]);
        let _ = run(args);

        // 200 px wide surface: 0.2 px per logical unit
        let img = crate::io::load_image_file(&out).unwrap();
        assert_eq!(img.get_pixel(50, 50).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(150, 50).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(100, 50).0, [0, 0, 0, 255]);
        let m = crate::io::load_image_file(&mask).unwrap();
        assert_eq!(m.get_pixel(100, 50).0[3], 255);
        assert_eq!(m.get_pixel(10, 10).0[3], 0);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
