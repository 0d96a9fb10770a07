//! The edit session facade.
//!
//! One `Editor` per image-edit session: it owns the canvas, routes pointer
//! gestures through the tool state machine, records history after every
//! mutation, and queues change notifications for the host UI. All mutation is
//! synchronous; asynchronous completions (image decodes, bakes) re-enter
//! through deferred tasks drained by [`Editor::pump`].

use crate::canvas::{Background, Canvas, PixelData};
use crate::history::History;
use crate::layer::{BlendMode, Layer};
use crate::record::{self, EditLayerRecord};
use crate::selection::{self, HIT_TOLERANCE};
use crate::shapes::math::point_in_polygon;
use crate::shapes::{SerializableColor, Shape, ShapeId, ShapeKind};
use crate::tools::{self, Gesture, GestureState, SelectRegion, ToolConfig, ToolKind};
use kurbo::{Point, Vec2};
use std::collections::VecDeque;

/// Notifications pushed after mutations, drained by the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    HistoryChanged,
    SelectionChanged(Option<ShapeId>),
    LayersChanged,
}

/// Deferred work re-entering the scene graph from the event loop.
#[derive(Debug, Clone)]
enum PendingTask {
    /// Defensive background re-check after a restore or resize, in case an
    /// in-flight decode raced it.
    VerifyBackground { ticks: u8 },
}

/// Pump delay (in ticks) before the background re-check runs.
const VERIFY_DELAY_TICKS: u8 = 2;

/// The editing session.
#[derive(Debug)]
pub struct Editor {
    pub canvas: Canvas,
    history: History,
    gesture: Gesture,
    selection: Vec<ShapeId>,
    events: VecDeque<ChangeEvent>,
    pending: Vec<PendingTask>,
    /// Whether the current eraser gesture removed anything.
    erased_any: bool,
}

impl Editor {
    /// Start a session on an empty canvas. The initial state is recorded so
    /// the first action can be undone.
    pub fn new(width: f64, height: f64) -> Self {
        let canvas = Canvas::new(width, height);
        let mut history = History::new();
        if let Err(err) = history.record(&canvas) {
            log::error!("failed to record initial history state: {err}");
        }
        Self {
            canvas,
            history,
            gesture: Gesture::new(),
            selection: Vec::new(),
            events: VecDeque::new(),
            pending: Vec::new(),
            erased_any: false,
        }
    }

    // ------------------------------------------------------------------
    // Host interface
    // ------------------------------------------------------------------

    /// Enter edit mode for an image: establishes the coordinate mapping and
    /// forces the canvas aspect to the image's.
    pub fn set_background_image(
        &mut self,
        source: impl Into<String>,
        native_width: f64,
        native_height: f64,
    ) {
        self.canvas
            .set_background_image(source, native_width, native_height);
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
    }

    /// Deliver the decoded background bitmap. Stale decodes (dimensions that
    /// no longer match the current background reference) are discarded.
    pub fn attach_background_bitmap(&mut self, pixels: PixelData) {
        let accepted = match &self.canvas.background {
            Background::Image { width, height, .. } => {
                *width == pixels.width as f64 && *height == pixels.height as f64
            }
            Background::Color(_) => false,
        };
        if accepted {
            self.canvas.attach_background_bitmap(pixels);
        } else {
            log::warn!(
                "discarding stale background decode ({}x{})",
                pixels.width,
                pixels.height
            );
        }
    }

    /// The persisted edit record, with shapes in image-space units.
    pub fn edit_layer_data(&self) -> EditLayerRecord {
        record::export(&self.canvas)
    }

    /// Reconstruct the drawing layers from a persisted record.
    pub fn load_edit_layer_data(&mut self, data: &EditLayerRecord) {
        record::import(&mut self.canvas, data);
        self.set_selection(Vec::new());
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
    }

    /// Drain queued change notifications.
    pub fn drain_events(&mut self) -> Vec<ChangeEvent> {
        self.events.drain(..).collect()
    }

    /// Process deferred tasks. Call once per event-loop turn.
    pub fn pump(&mut self) {
        let mut due = Vec::new();
        for task in &mut self.pending {
            match task {
                PendingTask::VerifyBackground { ticks } => {
                    if *ticks == 0 {
                        due.push(task.clone());
                    } else {
                        *ticks -= 1;
                    }
                }
            }
        }
        self.pending.retain(|task| match task {
            PendingTask::VerifyBackground { ticks } => *ticks > 0,
        });
        for task in due {
            match task {
                PendingTask::VerifyBackground { .. } => self.verify_background(),
            }
        }
    }

    /// Re-verify background and mapping coherence; patches anything an
    /// asynchronous decode left stale.
    fn verify_background(&mut self) {
        let mapping_stale = self.canvas.mapping.display_width != self.canvas.width
            || self.canvas.mapping.display_height != self.canvas.height;
        if mapping_stale {
            log::debug!("background re-check: refreshing stale mapping");
            self.canvas.refresh_mapping();
        }
        let stale_bitmap = match (&self.canvas.background, &self.canvas.background_bitmap) {
            (Background::Image { width, height, .. }, Some(bitmap)) => {
                *width != bitmap.width as f64 || *height != bitmap.height as f64
            }
            _ => false,
        };
        if stale_bitmap {
            log::warn!("background re-check: dropping stale bitmap");
            self.canvas.background_bitmap = None;
        }
    }

    fn schedule_background_verify(&mut self) {
        self.pending
            .push(PendingTask::VerifyBackground { ticks: VERIFY_DELAY_TICKS });
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Record the current state. Called after every completed mutation.
    fn record_history(&mut self) {
        if let Err(err) = self.history.record(&self.canvas) {
            log::error!("failed to record history state: {err}");
        }
        self.notify(ChangeEvent::HistoryChanged);
    }

    /// Undo one step. A restore clears the selection but leaves tool state
    /// alone; the background bitmap is untouched by construction.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(&mut self.canvas) {
            Ok(true) => {
                self.after_restore();
                true
            }
            Ok(false) => false,
            Err(err) => {
                log::error!("undo failed: {err}");
                false
            }
        }
    }

    /// Redo one step.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(&mut self.canvas) {
            Ok(true) => {
                self.after_restore();
                true
            }
            Ok(false) => false,
            Err(err) => {
                log::error!("redo failed: {err}");
                false
            }
        }
    }

    fn after_restore(&mut self) {
        self.set_selection(Vec::new());
        self.notify(ChangeEvent::HistoryChanged);
        self.notify(ChangeEvent::LayersChanged);
        self.schedule_background_verify();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ------------------------------------------------------------------
    // Pointer gestures
    // ------------------------------------------------------------------

    pub fn pointer_down(&mut self, point: Point, config: &ToolConfig) {
        // A click elsewhere ends any in-place text edit
        if self.gesture.editing_text().is_some() {
            self.cancel_text_edit();
        }
        match config.tool {
            ToolKind::Select => {
                let hit = selection::hit_test_layer(self.canvas.active_layer(), point, HIT_TOLERANCE);
                match hit {
                    Some(id) => self.set_selection(vec![id]),
                    None => self.gesture.begin_select(point, config.select_mode),
                }
            }
            ToolKind::Text => {
                if self.canvas.active_layer().locked {
                    return;
                }
                let shape = tools::place_text(point, config);
                let id = shape.id();
                self.canvas.active_layer_mut().add_shape(shape);
                self.gesture.begin_text_edit(id);
                self.notify(ChangeEvent::LayersChanged);
            }
            ToolKind::Eraser => {
                self.gesture.begin_draw(point);
                self.erased_any = false;
                self.erase_at(point);
            }
            ToolKind::PaintBucket => {
                // Click action; resolution happens on pointer_up (the raster
                // crate handles the pixel branch).
            }
            _ => self.gesture.begin_draw(point),
        }
    }

    pub fn pointer_move(&mut self, point: Point, config: &ToolConfig) {
        self.gesture.update(point);
        if config.tool == ToolKind::Eraser && !self.gesture.is_idle() {
            self.erase_at(point);
        }
    }

    pub fn pointer_up(&mut self, point: Point, config: &ToolConfig) {
        match config.tool {
            ToolKind::Select => {
                // A click on a shape already resolved at pointer_down; only a
                // marquee/lasso gesture needs finishing here.
                let was_selecting =
                    matches!(self.gesture.state(), GestureState::Selecting { .. });
                if was_selecting {
                    match self.gesture.end_select(point) {
                        Some(SelectRegion::Rect(rect)) => {
                            let ids = selection::shapes_in_rect(self.canvas.active_layer(), rect);
                            self.set_selection(ids);
                        }
                        Some(SelectRegion::Lasso(path)) => {
                            let ids =
                                selection::shapes_in_lasso(self.canvas.active_layer(), &path);
                            self.set_selection(ids);
                        }
                        // Sub-threshold drag on empty space: plain deselect
                        None => self.set_selection(Vec::new()),
                    }
                }
            }
            ToolKind::Eraser => {
                self.gesture.cancel();
                if self.erased_any {
                    self.record_history();
                    self.erased_any = false;
                }
            }
            ToolKind::Text | ToolKind::PaintBucket => {}
            _ => {
                if let Some(shape) = self.gesture.end_draw(point, config) {
                    self.add_shape(shape);
                }
            }
        }
    }

    /// Abort the in-flight gesture; the scene graph is left unchanged.
    pub fn cancel_gesture(&mut self) {
        self.gesture.cancel();
    }

    /// Remove every shape under the eraser in the active layer.
    fn erase_at(&mut self, point: Point) {
        if self.canvas.active_layer().locked {
            return;
        }
        let mut removed = Vec::new();
        {
            let layer = self.canvas.active_layer_mut();
            layer.shapes.retain(|shape| {
                let hit = shape.hit_test(point, HIT_TOLERANCE);
                if hit {
                    removed.push(shape.id());
                }
                !hit
            });
        }
        if !removed.is_empty() {
            self.erased_any = true;
            self.selection.retain(|id| !removed.contains(id));
            self.notify(ChangeEvent::LayersChanged);
        }
    }

    /// Add a shape to the active layer and record the step.
    pub fn add_shape(&mut self, shape: Shape) -> Option<ShapeId> {
        if self.canvas.active_layer().locked {
            log::debug!("dropping {} gesture: active layer is locked", shape.kind.name());
            return None;
        }
        let id = self.canvas.active_layer_mut().add_shape(shape);
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
        Some(id)
    }

    // ------------------------------------------------------------------
    // Text editing
    // ------------------------------------------------------------------

    /// Secondary interaction on a text shape: enter in-place editing.
    pub fn begin_text_edit_at(&mut self, point: Point) -> Option<ShapeId> {
        let layer = self.canvas.active_layer();
        let id = layer.shapes.iter().rev().find_map(|shape| {
            if matches!(shape.kind, ShapeKind::Text { .. }) && shape.hit_test(point, HIT_TOLERANCE)
            {
                Some(shape.id())
            } else {
                None
            }
        })?;
        self.gesture.begin_text_edit(id);
        Some(id)
    }

    /// The shape currently in text editing, if any.
    pub fn editing_text(&self) -> Option<ShapeId> {
        self.gesture.editing_text()
    }

    /// Commit the edited content. An empty commit removes a never-filled
    /// node, leaving the scene graph as it was.
    pub fn commit_text_edit(&mut self, content: &str) {
        let Some(id) = self.gesture.editing_text() else {
            return;
        };
        self.gesture.cancel();
        if content.is_empty() {
            self.remove_empty_text(id);
            return;
        }
        let layer_index = match self.canvas.layer_of_shape(id) {
            Some(index) => index,
            None => return, // stale: shape vanished under an undo
        };
        if let Some(shape) = self.canvas.layers[layer_index].shape_mut(id) {
            if let ShapeKind::Text { content: text, .. } = &mut shape.kind {
                *text = content.to_string();
            }
        }
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
    }

    /// Abandon the edit. A node that never received content is removed.
    pub fn cancel_text_edit(&mut self) {
        let Some(id) = self.gesture.editing_text() else {
            return;
        };
        self.gesture.cancel();
        self.remove_empty_text(id);
    }

    fn remove_empty_text(&mut self, id: ShapeId) {
        let Some(layer_index) = self.canvas.layer_of_shape(id) else {
            return;
        };
        let is_empty_text = self.canvas.layers[layer_index]
            .shape(id)
            .map(|shape| matches!(&shape.kind, ShapeKind::Text { content, .. } if content.is_empty()))
            .unwrap_or(false);
        if is_empty_text {
            self.canvas.layers[layer_index].remove_shape(id);
            self.notify(ChangeEvent::LayersChanged);
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn selection(&self) -> &[ShapeId] {
        &self.selection
    }

    fn set_selection(&mut self, ids: Vec<ShapeId>) {
        self.selection = ids;
        self.notify(ChangeEvent::SelectionChanged(self.selection.first().copied()));
    }

    /// Aggregate bounds of the current selection.
    pub fn selection_bounds(&self) -> Option<kurbo::Rect> {
        selection::selection_bounds(self.canvas.active_layer(), &self.selection)
    }

    /// Delete the selected shapes. No-op on empty selection.
    pub fn delete_selected(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        let ids = std::mem::take(&mut self.selection);
        let layer = self.canvas.active_layer_mut();
        layer.shapes.retain(|s| !ids.contains(&s.id()));
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
        self.notify(ChangeEvent::SelectionChanged(None));
    }

    /// Duplicate the selected shapes with fresh IDs, slightly offset, and
    /// select the copies.
    pub fn duplicate_selected(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        let mut copies = Vec::new();
        for &id in &self.selection {
            if let Some(shape) = self.canvas.active_layer().shape(id) {
                let mut copy = shape.clone();
                copy.regenerate_id();
                copy.translate(Vec2::new(10.0, 10.0));
                copies.push(copy);
            }
        }
        let ids: Vec<ShapeId> = copies.iter().map(|s| s.id()).collect();
        for copy in copies {
            self.canvas.active_layer_mut().add_shape(copy);
        }
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
        self.set_selection(ids);
    }

    /// Move the selected shapes by a world delta.
    pub fn translate_selected(&mut self, delta: Vec2) {
        self.for_selected(|shape| shape.translate(delta));
    }

    /// Mirror each selected shape around its own center.
    pub fn flip_selected_horizontal(&mut self) {
        self.for_selected(selection::flip_horizontal);
    }

    /// Mirror each selected shape around its own center.
    pub fn flip_selected_vertical(&mut self) {
        self.for_selected(selection::flip_vertical);
    }

    /// Scale each selected shape around its own center.
    pub fn scale_selected(&mut self, sx: f64, sy: f64) {
        self.for_selected(|shape| selection::scale_about_center(shape, sx, sy));
    }

    /// Skew each selected shape around its own center.
    pub fn skew_selected(&mut self, kx: f64, ky: f64) {
        self.for_selected(|shape| selection::skew_about_center(shape, kx, ky));
    }

    /// Rotate each selected shape around its own center.
    pub fn rotate_selected(&mut self, angle: f64) {
        self.for_selected(|shape| selection::rotate_about_center(shape, angle));
    }

    fn for_selected(&mut self, op: impl Fn(&mut Shape)) {
        if self.selection.is_empty() {
            return; // invariant guard: transform with empty selection
        }
        let ids = self.selection.clone();
        let layer = self.canvas.active_layer_mut();
        for id in ids {
            if let Some(shape) = layer.shape_mut(id) {
                op(shape);
            }
        }
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
    }

    // ------------------------------------------------------------------
    // Z-order
    // ------------------------------------------------------------------

    pub fn bring_selected_to_front(&mut self) {
        self.z_order_op(|layer, id| {
            layer.bring_to_front(id);
            true
        });
    }

    pub fn send_selected_to_back(&mut self) {
        self.z_order_op(|layer, id| {
            layer.send_to_back(id);
            true
        });
    }

    pub fn bring_selected_forward(&mut self) {
        self.z_order_op(Layer::bring_forward);
    }

    pub fn send_selected_backward(&mut self) {
        self.z_order_op(Layer::send_backward);
    }

    fn z_order_op(&mut self, op: impl Fn(&mut Layer, ShapeId) -> bool) {
        if self.selection.is_empty() {
            return;
        }
        let ids = self.selection.clone();
        let mut changed = false;
        for id in ids {
            changed |= op(self.canvas.active_layer_mut(), id);
        }
        if changed {
            self.record_history();
            self.notify(ChangeEvent::LayersChanged);
        }
    }

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    /// Add a drawing layer on top and make it current.
    pub fn add_layer(&mut self, name: impl Into<String>) {
        self.canvas.add_layer(name);
        self.canvas.current_layer = self.canvas.layers.len() - 1;
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
    }

    /// Remove a drawing layer. Removing the background layer is a no-op.
    pub fn remove_layer(&mut self, index: usize) {
        if self.canvas.remove_layer(index).is_some() {
            self.set_selection(Vec::new());
            self.record_history();
            self.notify(ChangeEvent::LayersChanged);
        }
    }

    /// Reorder a drawing layer within the stack.
    pub fn move_layer(&mut self, from: usize, to: usize) {
        if self.canvas.move_layer(from, to) {
            self.record_history();
            self.notify(ChangeEvent::LayersChanged);
        }
    }

    pub fn set_current_layer(&mut self, index: usize) {
        let before = self.canvas.current_layer;
        self.canvas.set_current_layer(index);
        if self.canvas.current_layer != before {
            self.set_selection(Vec::new());
            self.notify(ChangeEvent::LayersChanged);
        }
    }

    pub fn set_layer_visible(&mut self, index: usize, visible: bool) {
        self.with_layer(index, |layer| layer.visible = visible);
    }

    pub fn set_layer_locked(&mut self, index: usize, locked: bool) {
        self.with_layer(index, |layer| layer.locked = locked);
    }

    /// Set layer opacity in percent (clamped to 0–100).
    pub fn set_layer_opacity(&mut self, index: usize, opacity: u8) {
        self.with_layer(index, |layer| layer.opacity = opacity.min(100));
    }

    pub fn set_layer_blend_mode(&mut self, index: usize, blend_mode: BlendMode) {
        self.with_layer(index, |layer| layer.blend_mode = blend_mode);
    }

    pub fn rename_layer(&mut self, index: usize, name: impl Into<String>) {
        let name = name.into();
        self.with_layer(index, move |layer| layer.name = name);
    }

    fn with_layer(&mut self, index: usize, op: impl FnOnce(&mut Layer)) {
        let Some(layer) = self.canvas.layers.get_mut(index) else {
            return;
        };
        op(layer);
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
    }

    // ------------------------------------------------------------------
    // Canvas
    // ------------------------------------------------------------------

    /// Resize the working canvas. Shapes rescale in place; any shape left
    /// fully outside is pruned, and the whole step is one undoable entry.
    pub fn resize_canvas(&mut self, width: f64, height: f64) {
        let pruned = self.canvas.resize(width, height);
        if !pruned.is_empty() {
            log::info!("resize pruned {} out-of-bounds shape(s)", pruned.len());
            self.selection.retain(|id| !pruned.contains(id));
        }
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
        self.schedule_background_verify();
    }

    /// Paint-bucket vector branch: if the point is inside a closed shape on a
    /// visible layer (topmost first), set that shape's fill and return its
    /// ID. The raster crate falls back to pixel flood fill when this misses.
    pub fn fill_closed_shape_at(
        &mut self,
        point: Point,
        fill: SerializableColor,
    ) -> Option<ShapeId> {
        let mut target = None;
        'layers: for layer in self.canvas.layers.iter().rev() {
            if !layer.visible {
                continue;
            }
            for shape in layer.shapes.iter().rev() {
                if shape.is_closed()
                    && shape
                        .world_outline()
                        .iter()
                        .any(|outline| point_in_polygon(point, outline))
                {
                    target = Some(shape.id());
                    break 'layers;
                }
            }
        }
        let id = target?;
        let layer_index = self.canvas.layer_of_shape(id)?;
        if let Some(shape) = self.canvas.layers[layer_index].shape_mut(id) {
            shape.style.fill_color = Some(fill);
        }
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
        Some(id)
    }

    /// Replace a shape with its baked raster equivalent, preserving z-order.
    /// Returns false when the target vanished (a stale completion), in which
    /// case nothing is mutated.
    pub fn replace_shape(&mut self, id: ShapeId, replacement: Shape) -> bool {
        let Some(layer_index) = self.canvas.layer_of_shape(id) else {
            log::debug!("discarding stale shape replacement: target no longer exists");
            return false;
        };
        let layer = &mut self.canvas.layers[layer_index];
        let Some(index) = layer.index_of(id) else {
            return false;
        };
        layer.shapes[index] = replacement;
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
        true
    }

    /// Insert a pre-built layer above the current one (flood-fill results).
    pub fn insert_layer_above_current(&mut self, layer: Layer) {
        let index = (self.canvas.current_layer + 1).min(self.canvas.layers.len());
        self.canvas.layers.insert(index, layer);
        self.record_history();
        self.notify(ChangeEvent::LayersChanged);
    }

    /// Look up a shape anywhere in the stack.
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.canvas.layers.iter().find_map(|layer| layer.shape(id))
    }

    fn notify(&mut self, event: ChangeEvent) {
        self.events.push_back(event);
    }
}
