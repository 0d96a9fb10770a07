//! Canvas document: the working surface for one image-edit session.

use crate::layer::{Layer, LayerId};
use crate::mapping::CoordinateMapping;
use crate::shapes::{SerializableColor, ShapeId};
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decoded RGBA8 pixels, shared without copying.
///
/// Kept out of serde entirely: bitmaps never enter history snapshots or the
/// persisted edit record.
#[derive(Debug, Clone)]
pub struct PixelData {
    pub width: u32,
    pub height: u32,
    pub rgba: Arc<Vec<u8>>,
}

impl PixelData {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize, "rgba length mismatch");
        Self {
            width,
            height,
            rgba: Arc::new(rgba),
        }
    }
}

/// The canvas backdrop: a solid color, or a reference to the image being
/// annotated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Background {
    Color(SerializableColor),
    Image {
        /// Host-side reference (URL or asset key).
        source: String,
        /// Native image width in pixels.
        width: f64,
        /// Native image height in pixels.
        height: f64,
    },
}

impl Default for Background {
    fn default() -> Self {
        Background::Color(SerializableColor::white())
    }
}

/// The working canvas: dimensions, backdrop, and the layer stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canvas {
    /// Working width in canvas pixels.
    pub width: f64,
    /// Working height in canvas pixels.
    pub height: f64,
    pub background: Background,
    /// Decoded background bitmap. First-class but out-of-band: excluded from
    /// snapshots and records, so undo/redo/resize never lose it.
    #[serde(skip)]
    pub background_bitmap: Option<PixelData>,
    /// Layers, back to front. Layer 0 is the background layer and is never
    /// removed.
    pub layers: Vec<Layer>,
    /// Index of the layer that receives new shapes. Never 0.
    pub current_layer: usize,
    pub mapping: CoordinateMapping,
}

impl Canvas {
    /// Create a canvas with the background layer and one drawing layer.
    pub fn new(width: f64, height: f64) -> Self {
        let mut background_layer = Layer::new("Background");
        background_layer.locked = true;
        Self {
            width,
            height,
            background: Background::default(),
            background_bitmap: None,
            layers: vec![background_layer, Layer::new("Layer 1")],
            current_layer: 1,
            mapping: CoordinateMapping::identity(width, height),
        }
    }

    /// The layer currently receiving new shapes.
    pub fn active_layer(&self) -> &Layer {
        &self.layers[self.current_layer]
    }

    /// Mutable access to the active layer.
    pub fn active_layer_mut(&mut self) -> &mut Layer {
        &mut self.layers[self.current_layer]
    }

    /// Select the layer that receives new shapes. Selecting the background
    /// layer or an out-of-range index is a no-op.
    pub fn set_current_layer(&mut self, index: usize) {
        if index >= 1 && index < self.layers.len() {
            self.current_layer = index;
        }
    }

    /// Append a new drawing layer above the others. Returns its ID.
    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        let layer = Layer::new(name);
        let id = layer.id();
        self.layers.push(layer);
        id
    }

    /// Remove a layer by index. Removing the background layer is a no-op.
    pub fn remove_layer(&mut self, index: usize) -> Option<Layer> {
        if index == 0 || index >= self.layers.len() {
            return None;
        }
        let layer = self.layers.remove(index);
        if self.current_layer >= self.layers.len() {
            self.current_layer = self.layers.len() - 1;
        }
        if self.current_layer == 0 && self.layers.len() > 1 {
            self.current_layer = 1;
        }
        Some(layer)
    }

    /// Reorder a drawing layer. The background layer never moves. Returns
    /// whether anything changed.
    pub fn move_layer(&mut self, from: usize, to: usize) -> bool {
        if from == 0 || to == 0 || from == to || from >= self.layers.len() || to >= self.layers.len()
        {
            return false;
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        if self.current_layer == from {
            self.current_layer = to;
        } else if from < self.current_layer && to >= self.current_layer {
            self.current_layer -= 1;
        } else if from > self.current_layer && to <= self.current_layer {
            self.current_layer += 1;
        }
        true
    }

    /// Find the layer index holding a shape.
    pub fn layer_of_shape(&self, id: ShapeId) -> Option<usize> {
        self.layers.iter().position(|l| l.shape(id).is_some())
    }

    /// Attach a background image reference. Forces the canvas aspect ratio to
    /// the image's (width is kept, height follows), rescales existing shapes
    /// by the height delta, and recomputes the mapping.
    pub fn set_background_image(&mut self, source: impl Into<String>, image_width: f64, image_height: f64) {
        let new_height = self.width * image_height / image_width;
        if (new_height - self.height).abs() > f64::EPSILON {
            let sy = new_height / self.height;
            for layer in &mut self.layers {
                for shape in &mut layer.shapes {
                    shape.scale_in_place(1.0, sy);
                }
            }
            self.height = new_height;
        }
        self.background = Background::Image {
            source: source.into(),
            width: image_width,
            height: image_height,
        };
        self.background_bitmap = None;
        self.refresh_mapping();
    }

    /// Deliver the decoded background bitmap (arrives after the reference).
    pub fn attach_background_bitmap(&mut self, pixels: PixelData) {
        self.background_bitmap = Some(pixels);
    }

    /// Recompute the mapping from the current canvas size and background.
    pub fn refresh_mapping(&mut self) {
        self.mapping = match &self.background {
            Background::Image { width, height, .. } => {
                CoordinateMapping::for_image(self.width, self.height, *width, *height)
            }
            Background::Color(_) => CoordinateMapping::identity(self.width, self.height),
        };
    }

    /// Resize the working canvas. Shapes are rescaled in place by the resize
    /// delta so their image-space placement is preserved, then any shape that
    /// falls fully outside the new bounds is pruned. Returns the pruned
    /// shapes' IDs so the caller can record the step.
    pub fn resize(&mut self, new_width: f64, new_height: f64) -> Vec<ShapeId> {
        let sx = new_width / self.width;
        let sy = new_height / self.height;
        self.width = new_width;
        self.height = new_height;
        for layer in &mut self.layers {
            for shape in &mut layer.shapes {
                shape.scale_in_place(sx, sy);
            }
        }
        self.refresh_mapping();
        self.prune_out_of_bounds()
    }

    /// Remove shapes whose bounds lie fully outside the canvas.
    fn prune_out_of_bounds(&mut self) -> Vec<ShapeId> {
        let canvas_rect = Rect::new(0.0, 0.0, self.width, self.height);
        let mut pruned = Vec::new();
        for layer in &mut self.layers {
            layer.shapes.retain(|shape| {
                let b = shape.bounds();
                // Degenerate bounds (flat lines) still count as inside
                let keep = b.x0 <= canvas_rect.x1
                    && b.x1 >= canvas_rect.x0
                    && b.y0 <= canvas_rect.y1
                    && b.y1 >= canvas_rect.y0;
                if !keep {
                    pruned.push(shape.id());
                }
                keep
            });
        }
        pruned
    }

    /// Total shape count across all layers.
    pub fn shape_count(&self) -> usize {
        self.layers.iter().map(|l| l.len()).sum()
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(640.0, 360.0)
    }
}
