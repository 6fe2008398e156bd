use image::RgbaImage;
use uuid::Uuid;

use crate::assets::{AssetEvent, AssetId, AssetStore};
use crate::canvas::{CanvasState, Layer, LayerId, LayerKind, LayerPatch, Point, Rect, Viewport};
use crate::components::history::{HistoryManager, SnapshotCommand};
use crate::components::tools::{Gesture, PointerOutcome, StyleDefaults, Tool, ToolController};
use crate::compositor::{self, Frame, RenderContext};
use crate::error::StudioError;
use crate::ops::ai::{Collaborator, CollaboratorError, EditRequest, EditTask};
use crate::ops::hit::HitSlop;
use crate::ops::mask::MaskPainter;
use crate::ops::text::FontBook;
use crate::poster::{self, GeneratedBatch, PosterConfig};
use crate::settings::{EngineConfig, StudioSettings};

/// Tag for an outstanding collaborator edit. A reply is only accepted while
/// the base image it was computed from is still current.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditTicket {
    id: u64,
    generation: u64,
    task: EditTask,
}

impl EditTicket {
    pub fn task(&self) -> &EditTask {
        &self.task
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// The reply became the new base image.
    Applied,
    /// The base image changed (or a newer request was issued) meanwhile.
    Stale,
    /// The collaborator failed; its message is kept as the last error.
    Failed(String),
}

/// Single editing session: one base image, its layers and mask, the active
/// tool, history and the latest generated gallery.
pub struct Session {
    pub id: Uuid,
    canvas: CanvasState,
    tools: ToolController,
    history: HistoryManager,
    assets: AssetStore,
    fonts: FontBook,
    config: EngineConfig,
    /// On-screen rectangle of the surface, device pixels. `None` means shown
    /// at native size.
    display: Option<Rect>,
    gesture_command: Option<SnapshotCommand>,
    /// Where the add-logo tool was last clicked, waiting for the file.
    pending_logo_at: Option<Point>,
    /// A final result is on display; selection affordances are hidden.
    final_view: bool,
    is_dirty: bool,
    frame: Option<RgbaImage>,
    pending_edit: Option<EditTicket>,
    next_ticket: u64,
    batch: Option<GeneratedBatch>,
    last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EngineConfig::default(), StyleDefaults::default())
    }
}

impl Session {
    pub fn new(config: EngineConfig, style: StyleDefaults) -> Self {
        Self {
            id: Uuid::new_v4(),
            canvas: CanvasState::new(config.logical_width),
            tools: ToolController::new(&config, style),
            history: HistoryManager::new(config.max_undo_steps),
            assets: AssetStore::new(),
            fonts: FontBook::new(),
            config,
            display: None,
            gesture_command: None,
            pending_logo_at: None,
            final_view: false,
            is_dirty: true,
            frame: None,
            pending_edit: None,
            next_ticket: 1,
            batch: None,
            last_error: None,
        }
    }

    pub fn from_settings(settings: StudioSettings) -> Self {
        Self::new(settings.engine, settings.style)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn layers(&self) -> &[Layer] {
        self.canvas.layers.layers()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.canvas.layers.get(id)
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.canvas.layers.selected()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active_tool(&self) -> Tool {
        self.tools.active_tool
    }

    pub fn gesture(&self) -> Gesture {
        self.tools.gesture
    }

    pub fn brush_diameter(&self) -> f32 {
        self.tools.brush_diameter
    }

    pub fn style(&self) -> &StyleDefaults {
        &self.tools.style
    }

    /// Style-panel defaults for layers created from now on.
    pub fn style_mut(&mut self) -> &mut StyleDefaults {
        &mut self.tools.style
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn register_font(&mut self, family: &str, bytes: Vec<u8>) -> Result<(), StudioError> {
        self.fonts.register(family, bytes)?;
        self.mark_dirty();
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.pending_edit.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    // ========================================================================
    // BASE IMAGE
    // ========================================================================

    /// Decode uploaded bytes and make them the base image. On failure nothing
    /// changes.
    pub fn load_base_image(&mut self, bytes: &[u8]) -> Result<(), StudioError> {
        match crate::io::decode_image(bytes) {
            Ok(img) => {
                self.set_base_image(img);
                Ok(())
            }
            Err(e) => {
                crate::log_warn!("Rejected base image: {}", e);
                Err(e)
            }
        }
    }

    /// Replace the base image; layers, selection, mask, logo assets and
    /// history all start over.
    pub fn set_base_image(&mut self, image: RgbaImage) {
        let (w, h) = image.dimensions();
        self.canvas.replace_base(image);
        self.history.clear();
        self.assets.clear();
        self.tools.pointer_up();
        self.gesture_command = None;
        self.pending_logo_at = None;
        self.final_view = false;
        self.mark_dirty();
        crate::log_info!("Base image replaced ({}x{}, generation {})", w, h, self.canvas.generation());
    }

    // ========================================================================
    // COORDINATES
    // ========================================================================

    /// Where the surface currently sits on screen, in device pixels.
    pub fn set_display_rect(&mut self, display: Option<Rect>) {
        self.display = display;
    }

    fn viewport(&self) -> Option<Viewport> {
        let (w, h) = self.canvas.dimensions()?;
        Some(match self.display {
            Some(rect) => Viewport::new(rect, w, h),
            None => Viewport::native(w, h),
        })
    }

    /// Device pixels to logical units. `None` before a base image exists or
    /// while the surface has no display size.
    pub fn device_to_logical(&self, device: Point) -> Option<Point> {
        let px = self.viewport()?.to_image_space(device)?;
        Some(self.canvas.pixel_to_logical(px))
    }

    /// Hit tolerances in logical units, kept constant on screen.
    pub fn hit_slop(&self) -> HitSlop {
        let slop = HitSlop { padding: self.config.hit_padding, handle_radius: self.config.handle_radius };
        match self.viewport().and_then(|v| v.display_ratio()) {
            Some(ratio) => slop.scaled(ratio),
            None => slop,
        }
    }

    // ========================================================================
    // POINTER INPUT
    // ========================================================================

    pub fn pointer_down(&mut self, device: Point) -> PointerOutcome {
        if self.is_busy() {
            return PointerOutcome::None;
        }
        let Some(at) = self.device_to_logical(device) else {
            return PointerOutcome::None;
        };
        let slop = self.hit_slop();
        let mut command = SnapshotCommand::new(self.tools.active_tool.label(), &self.canvas.layers);
        let outcome = self.tools.pointer_down(at, &mut self.canvas, &self.fonts, &self.config, slop);

        match outcome {
            PointerOutcome::Created(_) => command.set_description("Add layer"),
            PointerOutcome::Deleted(_) => command.set_description("Delete layer"),
            PointerOutcome::Selected(_) => command.set_description("Move layer"),
            PointerOutcome::RequestLogoFile { at } => self.pending_logo_at = Some(at),
            _ => {}
        }

        if matches!(self.tools.gesture, Gesture::DraggingLayer { .. }) {
            self.gesture_command = Some(command);
        } else {
            self.commit(command);
        }
        if outcome.changes_pixels() {
            self.mark_dirty();
        }
        outcome
    }

    pub fn pointer_move(&mut self, device: Point) -> PointerOutcome {
        if self.is_busy() {
            return PointerOutcome::None;
        }
        let Some(at) = self.device_to_logical(device) else {
            return PointerOutcome::None;
        };
        let outcome = self.tools.pointer_move(at, &mut self.canvas, &self.config);
        if outcome.changes_pixels() {
            self.mark_dirty();
        }
        outcome
    }

    /// Ends the gesture. A whole drag is one history step.
    pub fn pointer_up(&mut self) {
        self.tools.pointer_up();
        if let Some(command) = self.gesture_command.take() {
            self.commit(command);
        }
    }

    fn commit(&mut self, mut command: SnapshotCommand) {
        if command.is_noop(&self.canvas.layers) {
            return;
        }
        command.set_after(&self.canvas.layers);
        self.history.push(command);
    }

    /// Run a layer-collection mutation as one undoable step.
    fn record<R>(&mut self, description: &str, op: impl FnOnce(&mut CanvasState) -> R) -> R {
        let command = SnapshotCommand::new(description, &self.canvas.layers);
        let result = op(&mut self.canvas);
        self.commit(command);
        self.mark_dirty();
        result
    }

    // ========================================================================
    // TOOLS & LAYERS
    // ========================================================================

    pub fn set_tool(&mut self, tool: Tool) {
        self.pointer_up();
        if tool == Tool::AddLogo && !self.config.allow_logo_layers {
            return;
        }
        self.tools.set_tool(tool, &mut self.canvas, &self.config);
        // The mask overlay follows the active tool.
        self.mark_dirty();
    }

    /// Applies to subsequent mask stamps only.
    pub fn set_brush_diameter(&mut self, diameter: f32) {
        if diameter.is_finite() && diameter > 0.0 {
            self.tools.brush_diameter = diameter;
        }
    }

    /// Merge `patch` into a layer. Unknown ids are ignored, as is everything
    /// while an edit request is outstanding.
    pub fn update_layer(&mut self, id: LayerId, patch: &LayerPatch) -> bool {
        if self.is_busy() {
            return false;
        }
        self.record("Edit layer", |canvas| canvas.layers.update(id, patch))
    }

    pub fn delete_layer(&mut self, id: LayerId) -> bool {
        if self.is_busy() {
            return false;
        }
        let deleted = self.record("Delete layer", |canvas| canvas.layers.delete(id));
        if deleted {
            crate::log_info!("Deleted layer {}", id);
        }
        deleted
    }

    pub fn select_layer(&mut self, id: Option<LayerId>) {
        if self.is_busy() {
            return;
        }
        let raise = self.config.raise_on_select;
        self.record("Bring to front", |canvas| {
            canvas.layers.select(id);
            if raise && let Some(id) = id {
                canvas.layers.raise_to_top(id);
            }
        });
    }

    /// Append a fully specified layer and select it.
    pub fn insert_layer(&mut self, layer: Layer) -> Result<LayerId, StudioError> {
        if self.is_busy() {
            return Err(StudioError::Busy);
        }
        let label = layer.kind.label();
        let id = self.record("Add layer", |canvas| canvas.layers.insert(layer));
        crate::log_info!("Created {} layer {}", label, id);
        Ok(id)
    }

    /// Stamp the mask at a logical point with the given brush, outside of
    /// any pointer gesture.
    pub fn paint_mask(&mut self, at: Point, diameter: f32) -> bool {
        if self.is_busy() {
            return false;
        }
        let painted = self.canvas.paint_mask(at, diameter, self.config.mask_color);
        if painted {
            self.mark_dirty();
        }
        painted
    }

    /// Add a logo layer from uploaded bytes.
    ///
    /// The header is read synchronously to size the layer and reject
    /// non-images; decoding runs in the background and the layer is drawn
    /// once it finishes. Without `at`, the layer lands where the add-logo tool
    /// was last clicked, or at the canvas centre.
    pub fn add_logo(&mut self, bytes: Vec<u8>, at: Option<Point>) -> Result<LayerId, StudioError> {
        if !self.config.allow_logo_layers {
            return Err(StudioError::Disabled("Logo layers"));
        }
        if self.is_busy() {
            return Err(StudioError::Busy);
        }
        if self.canvas.base().is_none() {
            return Err(StudioError::NoBaseImage);
        }
        let (w, h) = crate::io::probe_dimensions(&bytes).inspect_err(|e| {
            crate::log_warn!("Rejected logo file: {}", e);
        })?;
        let asset = self.assets.request_decode(bytes)?;

        let at = at.or(self.pending_logo_at.take()).unwrap_or_else(|| self.canvas.logical_center());
        let width = self.tools.style.logo_width;
        let height = width * h as f32 / w as f32;
        let layer = Layer::new(LayerKind::Logo { asset }, at, width, [255, 255, 255, 255], self.tools.style.opacity)
            .with_dimensions(width, height);
        let id = self.record("Add logo", |canvas| canvas.layers.insert(layer));
        crate::log_info!("Created logo layer {} (asset {})", id, asset.0);
        Ok(id)
    }

    /// Drop every layer and the mask, keeping the base image.
    pub fn discard_all(&mut self) {
        self.pointer_up();
        if self.is_busy() {
            return;
        }
        if self.canvas.layers.is_empty() && self.canvas.mask().is_none() {
            return;
        }
        self.record("Discard all", |canvas| canvas.discard_all());
    }

    pub fn clear_mask(&mut self) {
        if self.is_busy() {
            return;
        }
        self.canvas.clear_mask();
        self.mark_dirty();
    }

    pub fn undo(&mut self) -> Option<String> {
        self.pointer_up();
        if self.is_busy() {
            return None;
        }
        let description = self.history.undo(&mut self.canvas.layers)?;
        self.mark_dirty();
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.pointer_up();
        if self.is_busy() {
            return None;
        }
        let description = self.history.redo(&mut self.canvas.layers)?;
        self.mark_dirty();
        Some(description)
    }

    // ========================================================================
    // ASSETS
    // ========================================================================

    /// Collect finished logo decodes. Returns true when something needs a
    /// redraw.
    pub fn poll_assets(&mut self) -> bool {
        let events = self.assets.poll();
        self.apply_asset_events(events)
    }

    /// Block until every pending logo has decoded.
    pub fn wait_for_assets(&mut self) -> bool {
        let events = self.assets.wait_all();
        self.apply_asset_events(events)
    }

    fn apply_asset_events(&mut self, events: Vec<AssetEvent>) -> bool {
        let mut changed = false;
        for event in events {
            match event {
                AssetEvent::Ready(_) => changed = true,
                AssetEvent::Failed(asset, error) => {
                    self.remove_layers_for(asset);
                    self.last_error = Some(format!("Could not load logo: {}", error));
                    changed = true;
                }
            }
        }
        if changed {
            self.mark_dirty();
        }
        changed
    }

    fn remove_layers_for(&mut self, asset: AssetId) {
        let doomed: Vec<LayerId> = self
            .layers()
            .iter()
            .filter(|l| matches!(l.kind, LayerKind::Logo { asset: a } if a == asset))
            .map(|l| l.id)
            .collect();
        for id in doomed {
            self.canvas.layers.delete(id);
        }
        // Undo or redo must not bring back a layer whose raster never arrived.
        self.history.forget_layers(|l| matches!(l.kind, LayerKind::Logo { asset: a } if a == asset));
        self.assets.release(asset);
    }

    // ========================================================================
    // RENDERING & EXPORT
    // ========================================================================

    /// While true, the selected layer's affordance is not drawn.
    pub fn set_final_view(&mut self, on: bool) {
        if self.final_view != on {
            self.final_view = on;
            self.mark_dirty();
        }
    }

    fn compose(&self, show_affordance: bool, show_mask: bool) -> Option<RgbaImage> {
        let base = self.canvas.base()?;
        let frame = Frame {
            base,
            layers: self.canvas.layers.layers(),
            selected: self.canvas.layers.selected(),
            mask: self.canvas.mask(),
            show_affordance,
            show_mask,
            scale: self.canvas.scale_factor(),
        };
        let ctx = RenderContext { fonts: &self.fonts, assets: &self.assets, config: &self.config, slop: self.hit_slop() };
        Some(compositor::render(&frame, &ctx))
    }

    /// The live frame, redrawn only when something changed since the last
    /// call. `None` before a base image exists.
    pub fn render(&mut self) -> Option<&RgbaImage> {
        if self.is_dirty || self.frame.is_none() {
            let show_mask = self.tools.active_tool == Tool::PaintMask;
            self.frame = self.compose(!self.final_view, show_mask);
            self.is_dirty = false;
        }
        self.frame.as_ref()
    }

    /// Base image plus layers, without affordances or mask overlay.
    pub fn flatten(&self) -> Result<RgbaImage, StudioError> {
        self.compose(false, false).ok_or(StudioError::NoBaseImage)
    }

    pub fn export_png(&self) -> Result<Vec<u8>, StudioError> {
        crate::io::encode_png(&self.flatten()?)
    }

    /// Mask strokes in the marker colour on transparency. An untouched mask
    /// exports as fully transparent.
    pub fn export_mask_png(&self) -> Result<Vec<u8>, StudioError> {
        let (w, h) = self.canvas.dimensions().ok_or(StudioError::NoBaseImage)?;
        let image = match self.canvas.mask() {
            Some(mask) => mask.flatten_for_export(),
            None => MaskPainter::new(w, h, self.config.mask_color).flatten_for_export(),
        };
        crate::io::encode_png(&image)
    }

    // ========================================================================
    // COLLABORATOR EDITS
    // ========================================================================

    /// Flatten the frame for `task` and mark the session busy until
    /// `finish_edit` is called with the returned ticket.
    pub fn begin_edit(&mut self, task: EditTask) -> Result<(EditTicket, EditRequest), StudioError> {
        if self.is_busy() {
            return Err(StudioError::Busy);
        }
        let mut image = self.flatten()?;
        if task.uses_mask()
            && let Some(mask) = self.canvas.mask()
        {
            image = mask.flatten_over(&image);
        }
        self.pointer_up();

        let ticket = EditTicket { id: self.next_ticket, generation: self.canvas.generation(), task: task.clone() };
        self.next_ticket += 1;
        self.pending_edit = Some(ticket.clone());
        crate::log_info!("Edit request {} sent: {}", ticket.id, task.label());
        Ok((ticket, EditRequest { task, image }))
    }

    /// Deliver the collaborator's reply for `ticket`.
    pub fn finish_edit(&mut self, ticket: EditTicket, reply: Result<RgbaImage, CollaboratorError>) -> EditOutcome {
        if self.pending_edit.as_ref().is_some_and(|p| p.id == ticket.id) {
            self.pending_edit = None;
        } else {
            crate::log_warn!("Discarding reply to superseded edit request {}", ticket.id);
            return EditOutcome::Stale;
        }
        if ticket.generation != self.canvas.generation() {
            crate::log_warn!("Discarding reply to edit request {}: base image changed", ticket.id);
            return EditOutcome::Stale;
        }

        let reply = reply.and_then(|img| {
            if img.width() == 0 || img.height() == 0 {
                Err(CollaboratorError::EmptyResponse)
            } else {
                Ok(img)
            }
        });
        match reply {
            Ok(img) => {
                crate::log_info!("Edit request {} applied: {}", ticket.id, ticket.task.label());
                self.last_error = None;
                self.set_base_image(img);
                EditOutcome::Applied
            }
            Err(e) => {
                let message = e.to_string();
                crate::log_err!("Edit request {} failed: {}", ticket.id, message);
                self.last_error = Some(message.clone());
                EditOutcome::Failed(message)
            }
        }
    }

    /// Begin, call the collaborator synchronously, finish.
    pub fn run_edit<C: Collaborator + ?Sized>(
        &mut self,
        collaborator: &C,
        task: EditTask,
    ) -> Result<EditOutcome, StudioError> {
        let (ticket, request) = self.begin_edit(task)?;
        let reply = collaborator.edit(&request);
        Ok(self.finish_edit(ticket, reply))
    }

    // ========================================================================
    // GENERATION & GALLERY
    // ========================================================================

    /// Generate a batch of poster variations. On success the batch replaces
    /// the gallery; on failure the gallery is kept and the message is stored
    /// as the last error.
    pub fn generate<C: Collaborator + ?Sized>(
        &mut self,
        collaborator: &C,
        config: &PosterConfig,
        revision: bool,
    ) -> Result<&GeneratedBatch, StudioError> {
        match poster::generate_batch(collaborator, config, revision) {
            Ok(batch) => {
                crate::log_info!("Generated {} variations", batch.results.len());
                self.last_error = None;
                let batch: &GeneratedBatch = self.batch.insert(batch);
                Ok(batch)
            }
            Err(e) => {
                crate::log_err!("Generation failed: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn batch(&self) -> Option<&GeneratedBatch> {
        self.batch.as_ref()
    }

    /// Open gallery result `index` in the editor as the new base image.
    pub fn edit_result(&mut self, index: usize) -> bool {
        let Some(image) = self.batch.as_ref().and_then(|b| b.results.get(index)).map(|r| (*r.image).clone())
        else {
            return false;
        };
        self.set_base_image(image);
        true
    }

    pub fn clear_batch(&mut self) {
        self.batch = None;
    }
}
