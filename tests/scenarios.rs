use image::{Rgba, RgbaImage};
use postercraft::canvas::{to_image_space, TextBackground};
use postercraft::ops::mask::MaskPainter;
use postercraft::poster::GenerationRequest;
use postercraft::{
    Collaborator, CollaboratorError, EditOutcome, EditRequest, EditTask, Layer, LayerKind, LayerPatch, Point,
    PointerOutcome, Rect, Session, ShapeKind, StudioError, Tool,
};

fn session_1000() -> Session {
    let mut s = Session::default();
    s.set_base_image(RgbaImage::from_pixel(1000, 1000, Rgba([20, 20, 20, 255])));
    s
}

fn rectangle(at: Point, w: f32, h: f32) -> Layer {
    Layer::new(LayerKind::Shape { shape: ShapeKind::Rectangle }, at, w.min(h), [200, 0, 0, 255], 100)
        .with_dimensions(w, h)
}

fn sticker(at: Point, size: f32) -> Layer {
    Layer::new(LayerKind::Sticker { glyph: "⭐".into() }, at, size, [255, 220, 0, 255], 100)
}

struct Failing;

impl Collaborator for Failing {
    fn edit(&self, _request: &EditRequest) -> Result<RgbaImage, CollaboratorError> {
        Err(CollaboratorError::Request("HTTP 500: model overloaded".into()))
    }

    fn generate(&self, _request: &GenerationRequest) -> Result<RgbaImage, CollaboratorError> {
        Err(CollaboratorError::EmptyResponse)
    }
}

#[test]
fn add_and_drag_text_layer() {
    let mut s = session_1000();
    s.set_tool(Tool::AddText);
    let PointerOutcome::Created(id) = s.pointer_down(Point::new(500.0, 500.0)) else {
        panic!("expected a new text layer");
    };
    s.pointer_up();
    assert_eq!(s.layers().len(), 1);
    assert_eq!(s.layer(id).unwrap().position(), Point::new(500.0, 500.0));
    assert_eq!(s.selected(), Some(id));

    s.set_tool(Tool::Select);
    s.pointer_down(Point::new(500.0, 500.0));
    s.pointer_move(Point::new(600.0, 450.0));
    s.pointer_up();
    assert_eq!(s.layers().len(), 1);
    assert_eq!(s.layer(id).unwrap().position(), Point::new(600.0, 450.0));
}

#[test]
fn overlapping_shape_and_sticker_topmost_delete() {
    let mut s = session_1000();
    let rect = s.insert_layer(rectangle(Point::new(300.0, 300.0), 200.0, 200.0)).unwrap();
    let star = s.insert_layer(sticker(Point::new(300.0, 300.0), 100.0)).unwrap();
    s.select_layer(None);

    assert_eq!(s.pointer_down(Point::new(300.0, 300.0)), PointerOutcome::Selected(star));
    s.pointer_up();
    assert_eq!(s.selected(), Some(star));

    // Sticker box 250..350 padded by 10: the handle sits at (360, 240).
    assert_eq!(s.pointer_down(Point::new(360.0, 240.0)), PointerOutcome::Deleted(star));
    s.pointer_up();
    assert_eq!(s.layers().len(), 1);
    assert_eq!(s.layers()[0].id, rect);
    assert_eq!(s.selected(), None);
}

#[test]
fn mask_paint_then_flatten_stays_in_disk() {
    let mut mask = MaskPainter::new(100, 100, [255, 0, 0, 255]);
    mask.paint_stroke(Point::new(50.0, 50.0), 20.0);
    let out = mask.flatten_for_export();
    let mut painted = 0;
    for (x, y, px) in out.enumerate_pixels() {
        if px.0[3] == 0 {
            continue;
        }
        painted += 1;
        let d = Point::new(x as f32 + 0.5, y as f32 + 0.5).distance_sq(Point::new(50.0, 50.0)).sqrt();
        assert!(d <= 11.0, "pixel ({x},{y}) is {d} from the centre");
    }
    assert!(painted > 250);
}

#[test]
fn coordinate_mapping_ignores_display_scale() {
    let reference = Rect::from_min_size(40.0, 30.0, 500.0, 500.0);
    let device = Point::new(290.0, 155.0);
    let expected = to_image_space(device, reference, (1000, 1000)).unwrap();
    for s in [0.25_f32, 0.5, 1.5, 3.7] {
        let displayed = Rect::from_min_size(40.0, 30.0, 500.0 * s, 500.0 * s);
        let scaled = Point::new(40.0 + (device.x - 40.0) * s, 30.0 + (device.y - 30.0) * s);
        let got = to_image_space(scaled, displayed, (1000, 1000)).unwrap();
        assert!((got.x - expected.x).abs() < 1e-2 && (got.y - expected.y).abs() < 1e-2, "{got:?} vs {expected:?}");
    }
    assert!(to_image_space(device, Rect::from_min_size(0.0, 0.0, 0.0, 10.0), (1000, 1000)).is_none());
}

#[test]
fn opacity_update_round_trips() {
    let mut s = session_1000();
    let text = Layer::new(
        LayerKind::Text {
            content: "LIMITED".into(),
            font_family: "Montserrat".into(),
            background: TextBackground { active: true, ..TextBackground::default() },
        },
        Point::new(400.0, 200.0),
        48.0,
        [255, 255, 255, 255],
        100,
    );
    let id = s.insert_layer(text).unwrap();
    let before = s.layer(id).unwrap().clone();
    assert!(s.update_layer(id, &LayerPatch::opacity(42)));
    let after = s.layer(id).unwrap();
    assert_eq!(after.opacity, 42);
    assert_eq!(Layer { opacity: before.opacity, ..after.clone() }, before);
}

#[test]
fn deleting_selected_layer_hides_affordance() {
    let mut s = session_1000();
    let id = s.insert_layer(rectangle(Point::new(500.0, 500.0), 100.0, 100.0)).unwrap();
    let with_affordance = s.render().unwrap().clone();
    assert_ne!(with_affordance, s.flatten().unwrap());

    assert!(s.delete_layer(id));
    assert_eq!(s.selected(), None);
    let frame = s.render().unwrap().clone();
    assert_eq!(frame, s.flatten().unwrap());
    assert_eq!(frame, *s.canvas().base().unwrap());
}

#[test]
fn mask_clear_matches_fresh_mask() {
    let fresh = MaskPainter::new(64, 48, [0, 0, 255, 255]);
    let mut mask = fresh.clone();
    for i in 0..20 {
        mask.paint_stroke(Point::new(i as f32 * 3.0, 24.0), 9.0);
    }
    assert!(!mask.is_empty());
    mask.clear();
    assert_eq!(mask.coverage(), fresh.coverage());
    assert_eq!(mask.flatten_for_export(), fresh.flatten_for_export());
}

#[test]
fn new_base_image_clears_everything() {
    let mut s = session_1000();
    s.insert_layer(sticker(Point::new(100.0, 100.0), 80.0)).unwrap();
    s.set_tool(Tool::PaintMask);
    s.pointer_down(Point::new(700.0, 700.0));
    s.pointer_up();
    assert!(s.canvas().has_mask_paint());

    s.set_base_image(RgbaImage::new(640, 480));
    assert!(s.layers().is_empty());
    assert_eq!(s.selected(), None);
    assert!(s.canvas().mask().is_none());
    assert!(!s.history().can_undo());
    let mask = image::load_from_memory(&s.export_mask_png().unwrap()).unwrap().to_rgba8();
    assert!(mask.pixels().all(|p| p.0[3] == 0));
}

#[test]
fn stale_reply_is_discarded() {
    let mut s = session_1000();
    let (ticket, _request) = s.begin_edit(EditTask::RemoveBackground).unwrap();
    assert!(s.is_busy());
    // The user replaced the image while the request was in flight.
    s.set_base_image(RgbaImage::from_pixel(300, 200, Rgba([1, 1, 1, 255])));
    let outcome = s.finish_edit(ticket, Ok(RgbaImage::from_pixel(1000, 1000, Rgba([9, 9, 9, 255]))));
    assert_eq!(outcome, EditOutcome::Stale);
    assert_eq!(s.canvas().dimensions(), Some((300, 200)));
    assert!(!s.is_busy());
}

#[test]
fn undecodable_upload_changes_nothing() {
    let mut s = session_1000();
    let id = s.insert_layer(sticker(Point::new(100.0, 100.0), 80.0)).unwrap();
    let generation = s.canvas().generation();

    assert!(matches!(s.load_base_image(b"<html>not an image</html>"), Err(StudioError::UnsupportedFormat)));
    assert!(s.add_logo(b"%PDF-1.7".to_vec(), None).is_err());

    assert_eq!(s.canvas().generation(), generation);
    assert_eq!(s.layers().len(), 1);
    assert_eq!(s.layers()[0].id, id);
}

#[test]
fn collaborator_failure_keeps_state() {
    let mut s = session_1000();
    s.insert_layer(rectangle(Point::new(200.0, 200.0), 50.0, 50.0)).unwrap();
    let base_before = s.canvas().base().unwrap().clone();

    let outcome = s.run_edit(&Failing, EditTask::PolishDesign).unwrap();
    assert_eq!(outcome, EditOutcome::Failed("HTTP 500: model overloaded".into()));
    assert_eq!(s.last_error(), Some("HTTP 500: model overloaded"));
    assert_eq!(s.layers().len(), 1);
    assert_eq!(*s.canvas().base().unwrap(), base_before);
    assert!(!s.is_busy());

    let config = postercraft::PosterConfig { title: "Launch day".into(), ..Default::default() };
    assert!(s.generate(&Failing, &config, false).is_err());
    assert_eq!(s.last_error(), Some("The service returned no image"));
}

#[test]
fn logo_redraws_once_decoded() {
    let mut s = session_1000();
    let png = postercraft::io::encode_png(&RgbaImage::from_pixel(50, 50, Rgba([0, 200, 0, 255]))).unwrap();
    let id = s.add_logo(png, Some(Point::new(250.0, 750.0))).unwrap();
    assert_eq!(s.layer(id).unwrap().dimensions(), (200.0, 200.0));
    s.wait_for_assets();
    assert_eq!(s.render().unwrap().get_pixel(250, 750).0, [0, 200, 0, 255]);
}
