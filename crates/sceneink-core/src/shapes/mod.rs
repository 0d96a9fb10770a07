//! Shape definitions for the annotation canvas.
//!
//! Every shape shares one placement envelope (position, scale, rotation,
//! skew, pivot) and a style; the geometry itself lives in a tagged
//! [`ShapeKind`] payload. Transform and serialization code never branches on
//! the kind except where the geometry genuinely differs.

pub mod arrow;
mod kind;
pub mod math;

pub use arrow::ArrowArchetype;
pub use kind::{FontWeight, RasterFormat, ShapeKind};

use kurbo::{Affine, BezPath, Point, Rect, Vec2};
use math::{point_in_polygon, point_to_polyline_dist, polyline_bounds};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Style properties shared by all shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Stroke color.
    pub stroke_color: SerializableColor,
    /// Stroke width in canvas units.
    pub stroke_width: f64,
    /// Fill color (None = no fill).
    pub fill_color: Option<SerializableColor>,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl ShapeStyle {
    /// Get the stroke color with opacity applied.
    pub fn stroke_with_opacity(&self) -> Color {
        let color: Color = self.stroke_color.into();
        let rgba = color.to_rgba8();
        let alpha = (rgba.a as f64 * self.opacity) as u8;
        Color::from_rgba8(rgba.r, rgba.g, rgba.b, alpha)
    }

    /// Get the fill color with opacity applied.
    pub fn fill_with_opacity(&self) -> Option<Color> {
        self.fill_color.map(|c| {
            let color: Color = c.into();
            let rgba = color.to_rgba8();
            let alpha = (rgba.a as f64 * self.opacity) as u8;
            Color::from_rgba8(rgba.r, rgba.g, rgba.b, alpha)
        })
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            stroke_width: 2.0,
            fill_color: None,
            opacity: 1.0,
        }
    }
}

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// The placement envelope mapping local geometry into canvas space.
///
/// World = translate(position) ∘ rotate ∘ skew ∘ scale ∘ translate(-pivot):
/// scale and skew precede translation, and `pivot` is the local point that
/// lands on `position`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Placement {
    /// World position of the pivot.
    pub position: Point,
    /// Per-axis scale; negative values mirror.
    pub scale: Vec2,
    /// Rotation in radians.
    pub rotation: f64,
    /// Skew factors (x sheared by y, y sheared by x).
    pub skew: Vec2,
    /// Local-space anchor mapped onto `position`.
    pub pivot: Point,
}

impl Placement {
    /// Identity placement at a world position.
    pub fn at(position: Point) -> Self {
        Self {
            position,
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
            skew: Vec2::ZERO,
            pivot: Point::ZERO,
        }
    }

    /// The local→world affine.
    pub fn affine(&self) -> Affine {
        Affine::translate(self.position.to_vec2())
            * Affine::rotate(self.rotation)
            * Affine::skew(self.skew.x, self.skew.y)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * Affine::translate(-self.pivot.to_vec2())
    }

    /// The linear part of the affine (no translation).
    pub fn linear(&self) -> Affine {
        Affine::rotate(self.rotation)
            * Affine::skew(self.skew.x, self.skew.y)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::at(Point::ZERO)
    }
}

/// A drawable shape: shared envelope plus kind-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    pub(crate) id: ShapeId,
    pub placement: Placement,
    pub style: ShapeStyle,
    #[serde(flatten)]
    pub kind: ShapeKind,
}

impl Shape {
    /// Create a shape at a world position with default style.
    pub fn new(position: Point, kind: ShapeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            placement: Placement::at(position),
            style: ShapeStyle::default(),
            kind,
        }
    }

    /// Create a shape with a specific style.
    pub fn with_style(position: Point, kind: ShapeKind, style: ShapeStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            placement: Placement::at(position),
            style,
            kind,
        }
    }

    /// Get the unique identifier.
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// Give the shape a fresh identifier, for duplicate/paste.
    pub fn regenerate_id(&mut self) {
        self.id = Uuid::new_v4();
    }

    /// The local→world affine.
    pub fn affine(&self) -> Affine {
        self.placement.affine()
    }

    /// Bounding box in local coordinates.
    pub fn local_bounds(&self) -> Rect {
        self.kind.local_bounds()
    }

    /// Bounding box in world (canvas) coordinates.
    pub fn bounds(&self) -> Rect {
        let affine = self.affine();
        let mut all = Vec::new();
        for outline in self.kind.local_outline() {
            all.extend(outline.iter().map(|&p| affine * p));
        }
        polyline_bounds(&all)
    }

    /// Outline polylines in world coordinates.
    pub fn world_outline(&self) -> Vec<Vec<Point>> {
        let affine = self.affine();
        self.kind
            .local_outline()
            .into_iter()
            .map(|outline| outline.into_iter().map(|p| affine * p).collect())
            .collect()
    }

    /// The world outline as a path, for rendering.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        for outline in self.world_outline() {
            let mut iter = outline.iter();
            if let Some(&first) = iter.next() {
                path.move_to(first);
                for &p in iter {
                    path.line_to(p);
                }
            }
        }
        path
    }

    /// Check if a world point hits this shape.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let outlines = self.world_outline();
        let filled = match self.kind {
            ShapeKind::Raster { .. } | ShapeKind::Text { .. } => true,
            _ => self.kind.is_closed() && self.style.fill_color.is_some(),
        };
        for outline in &outlines {
            if filled && point_in_polygon(point, outline) {
                return true;
            }
            if point_to_polyline_dist(point, outline) <= tolerance + self.style.stroke_width / 2.0 {
                return true;
            }
        }
        false
    }

    /// Move the shape by a world-space delta.
    pub fn translate(&mut self, delta: Vec2) {
        self.placement.position += delta;
    }

    /// Rescale all geometry by per-axis factors, in place. Maps between
    /// canvas resolutions: position, local geometry, and stroke width all
    /// scale so the shape keeps its placement relative to the image.
    pub fn scale_in_place(&mut self, sx: f64, sy: f64) {
        self.placement.position.x *= sx;
        self.placement.position.y *= sy;
        self.placement.pivot.x *= sx;
        self.placement.pivot.y *= sy;
        self.kind.scale_in_place(sx, sy);
        self.style.stroke_width *= (sx + sy) / 2.0;
    }

    /// Whether the shape encloses a fillable area.
    pub fn is_closed(&self) -> bool {
        self.kind.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_world_bounds() {
        let shape = Shape::new(
            Point::new(10.0, 20.0),
            ShapeKind::Rectangle {
                width: 100.0,
                height: 50.0,
            },
        );
        let bounds = shape.bounds();
        assert!((bounds.x0 - 10.0).abs() < 1e-9);
        assert!((bounds.y0 - 20.0).abs() < 1e-9);
        assert!((bounds.x1 - 110.0).abs() < 1e-9);
        assert!((bounds.y1 - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_test_outline_vs_fill() {
        let mut shape = Shape::new(
            Point::ZERO,
            ShapeKind::Rectangle {
                width: 100.0,
                height: 100.0,
            },
        );
        // Outline only: center does not hit
        assert!(!shape.hit_test(Point::new(50.0, 50.0), 2.0));
        assert!(shape.hit_test(Point::new(100.0, 50.0), 2.0));
        // Filled: center hits
        shape.style.fill_color = Some(SerializableColor::white());
        assert!(shape.hit_test(Point::new(50.0, 50.0), 2.0));
    }

    #[test]
    fn test_translate() {
        let mut shape = Shape::new(
            Point::new(5.0, 5.0),
            ShapeKind::Ellipse {
                radius_x: 10.0,
                radius_y: 10.0,
            },
        );
        shape.translate(Vec2::new(15.0, -5.0));
        let bounds = shape.bounds();
        assert!((bounds.center().x - 20.0).abs() < 1e-9);
        assert!((bounds.center().y - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_in_place_scales_position_and_geometry() {
        let mut shape = Shape::new(
            Point::new(100.0, 100.0),
            ShapeKind::Rectangle {
                width: 100.0,
                height: 50.0,
            },
        );
        shape.scale_in_place(3.0, 3.0);
        let bounds = shape.bounds();
        assert!((bounds.x0 - 300.0).abs() < 1e-9);
        assert!((bounds.y0 - 300.0).abs() < 1e-9);
        assert!((bounds.x1 - 600.0).abs() < 1e-9);
        assert!((bounds.y1 - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_scale_mirrors_bounds_in_place() {
        let mut shape = Shape::new(
            Point::ZERO,
            ShapeKind::Rectangle {
                width: 80.0,
                height: 40.0,
            },
        );
        shape.placement.pivot = Point::new(40.0, 20.0);
        shape.placement.position = Point::new(40.0, 20.0);
        let before = shape.bounds();
        shape.placement.scale.x = -1.0;
        let after = shape.bounds();
        assert!((before.center().x - after.center().x).abs() < 1e-9);
        assert!((before.width() - after.width()).abs() < 1e-9);
    }

    #[test]
    fn test_serde_round_trip() {
        let shape = Shape::new(
            Point::new(1.0, 2.0),
            ShapeKind::Polygon {
                points: vec![Point::ZERO, Point::new(10.0, 0.0), Point::new(5.0, 8.0)],
                closed: true,
            },
        );
        let json = serde_json::to_string(&shape).unwrap();
        let back: Shape = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), shape.id());
        let (a, b) = (shape.bounds(), back.bounds());
        assert!((a.x0 - b.x0).abs() < 1e-9 && (a.y1 - b.y1).abs() < 1e-9);
    }
}
