//! Layers: ordered, independently blendable groups of shapes.

use crate::shapes::{Shape, ShapeId};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for layers.
pub type LayerId = Uuid;

/// Layer compositing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
}

/// Whole-layer raster filter, applied by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LayerFilter {
    Grayscale,
    Invert,
    /// Brightness multiplier (1.0 = unchanged).
    Brightness(f64),
}

/// An ordered group of shapes with shared visibility and compositing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    /// Opacity in percent (0–100).
    pub opacity: u8,
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub filters: Vec<LayerFilter>,
    /// Shapes, back to front. A shape's index is its z-order.
    pub shapes: Vec<Shape>,
}

impl Layer {
    /// Create a new empty layer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            locked: false,
            opacity: 100,
            blend_mode: BlendMode::default(),
            filters: Vec::new(),
            shapes: Vec::new(),
        }
    }

    /// Get the unique identifier.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Append a shape on top of the stack.
    pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
        let id = shape.id();
        self.shapes.push(shape);
        id
    }

    /// Remove a shape, returning it if present.
    pub fn remove_shape(&mut self, id: ShapeId) -> Option<Shape> {
        let pos = self.shapes.iter().position(|s| s.id() == id)?;
        Some(self.shapes.remove(pos))
    }

    /// Get a shape by ID.
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id() == id)
    }

    /// Get a mutable shape by ID.
    pub fn shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id() == id)
    }

    /// Z-order index of a shape.
    pub fn index_of(&self, id: ShapeId) -> Option<usize> {
        self.shapes.iter().position(|s| s.id() == id)
    }

    /// Topmost shape hit at a world point.
    pub fn shape_at_point(&self, point: Point, tolerance: f64) -> Option<ShapeId> {
        self.shapes
            .iter()
            .rev()
            .find(|s| s.hit_test(point, tolerance))
            .map(|s| s.id())
    }

    /// Bring a shape to the front (topmost).
    pub fn bring_to_front(&mut self, id: ShapeId) {
        if let Some(pos) = self.index_of(id) {
            let shape = self.shapes.remove(pos);
            self.shapes.push(shape);
        }
    }

    /// Send a shape to the back (bottommost).
    pub fn send_to_back(&mut self, id: ShapeId) {
        if let Some(pos) = self.index_of(id) {
            let shape = self.shapes.remove(pos);
            self.shapes.insert(0, shape);
        }
    }

    /// Move a shape one step toward the front. Returns true if it moved.
    pub fn bring_forward(&mut self, id: ShapeId) -> bool {
        if let Some(pos) = self.index_of(id) {
            if pos < self.shapes.len() - 1 {
                self.shapes.swap(pos, pos + 1);
                return true;
            }
        }
        false
    }

    /// Move a shape one step toward the back. Returns true if it moved.
    pub fn send_backward(&mut self, id: ShapeId) -> bool {
        if let Some(pos) = self.index_of(id) {
            if pos > 0 {
                self.shapes.swap(pos, pos - 1);
                return true;
            }
        }
        false
    }

    /// Bounding box of all shapes in the layer.
    pub fn bounds(&self) -> Option<Rect> {
        let mut result: Option<Rect> = None;
        for shape in &self.shapes {
            let bounds = shape.bounds();
            result = Some(match result {
                Some(r) => r.union(bounds),
                None => bounds,
            });
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }
}
