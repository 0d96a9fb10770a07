//! Kind-specific shape payloads.
//!
//! Geometry here is expressed in each shape's local space; the shared
//! placement envelope in [`super::Shape`] maps it to world space.

use super::arrow::{self, ArrowArchetype};
use super::math::polyline_bounds;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Font weight options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontWeight {
    Light,
    #[default]
    Regular,
    Heavy,
}

impl FontWeight {
    /// CSS-style numeric weight, for host font resolution.
    pub fn css_weight(&self) -> u16 {
        match self {
            FontWeight::Light => 300,
            FontWeight::Regular => 400,
            FontWeight::Heavy => 700,
        }
    }
}

/// Encoded format of a raster payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

/// Kind-specific payload of a shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ShapeKind {
    /// Freehand brush stroke.
    Stroke { points: Vec<Point>, smoothing: bool },
    /// Axis-aligned rectangle anchored at the local origin.
    Rectangle { width: f64, height: f64 },
    /// Ellipse centered on the local origin.
    Ellipse { radius_x: f64, radius_y: f64 },
    /// Polygon, open or closed.
    Polygon { points: Vec<Point>, closed: bool },
    /// Straight line segment.
    Line { start: Point, end: Point },
    /// Procedural arrow: a template fitted to a drag vector.
    Arrow {
        archetype: ArrowArchetype,
        length: f64,
        head_size: f64,
    },
    /// Text node. Layout is approximated from the font metrics; the raster
    /// crate measures precisely when compositing.
    Text {
        content: String,
        font_family: String,
        font_size: f64,
        weight: FontWeight,
        italic: bool,
    },
    /// Baked bitmap. Display size is in canvas units; the payload keeps its
    /// source pixel dimensions.
    Raster {
        width: f64,
        height: f64,
        source_width: u32,
        source_height: u32,
        format: RasterFormat,
        data_base64: String,
    },
}

impl ShapeKind {
    /// Bounding box in local coordinates.
    pub fn local_bounds(&self) -> Rect {
        match self {
            ShapeKind::Stroke { points, .. } => polyline_bounds(points),
            ShapeKind::Rectangle { width, height } => Rect::new(0.0, 0.0, *width, *height),
            ShapeKind::Ellipse { radius_x, radius_y } => {
                Rect::new(-radius_x, -radius_y, *radius_x, *radius_y)
            }
            ShapeKind::Polygon { points, .. } => polyline_bounds(points),
            ShapeKind::Line { start, end } => polyline_bounds(&[*start, *end]),
            ShapeKind::Arrow {
                archetype,
                length,
                head_size,
            } => {
                let geo = arrow::expand(*archetype, *length, *head_size);
                let mut all = geo.shaft.clone();
                for head in &geo.heads {
                    all.extend_from_slice(head);
                }
                polyline_bounds(&all)
            }
            ShapeKind::Text {
                content, font_size, ..
            } => {
                // Approximate until the compositor measures real glyphs
                let lines: Vec<&str> = content.split('\n').collect();
                let max_chars = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
                let width = (max_chars as f64 * font_size * 0.6).max(font_size * 0.6);
                let height = (lines.len().max(1) as f64) * font_size * 1.2;
                Rect::new(0.0, 0.0, width, height)
            }
            ShapeKind::Raster { width, height, .. } => Rect::new(0.0, 0.0, *width, *height),
        }
    }

    /// Outline polylines in local coordinates, used for hit-testing and
    /// rendering. Closed outlines repeat their first point at the end.
    pub fn local_outline(&self) -> Vec<Vec<Point>> {
        match self {
            ShapeKind::Stroke { points, .. } => vec![points.clone()],
            ShapeKind::Rectangle { width, height } => {
                vec![closed_loop(&[
                    Point::ZERO,
                    Point::new(*width, 0.0),
                    Point::new(*width, *height),
                    Point::new(0.0, *height),
                ])]
            }
            ShapeKind::Ellipse { radius_x, radius_y } => {
                const SEGMENTS: usize = 48;
                let mut points: Vec<Point> = (0..=SEGMENTS)
                    .map(|i| {
                        let t = i as f64 / SEGMENTS as f64 * std::f64::consts::TAU;
                        Point::new(radius_x * t.cos(), radius_y * t.sin())
                    })
                    .collect();
                // Close exactly on the first sample
                points[SEGMENTS] = points[0];
                vec![points]
            }
            ShapeKind::Polygon { points, closed } => {
                if *closed {
                    vec![closed_loop(points)]
                } else {
                    vec![points.clone()]
                }
            }
            ShapeKind::Line { start, end } => vec![vec![*start, *end]],
            ShapeKind::Arrow {
                archetype,
                length,
                head_size,
            } => {
                let geo = arrow::expand(*archetype, *length, *head_size);
                let mut outlines = vec![geo.shaft];
                for head in &geo.heads {
                    outlines.push(closed_loop(head));
                }
                outlines
            }
            ShapeKind::Text { .. } | ShapeKind::Raster { .. } => {
                let bounds = self.local_bounds();
                vec![closed_loop(&[
                    Point::new(bounds.x0, bounds.y0),
                    Point::new(bounds.x1, bounds.y0),
                    Point::new(bounds.x1, bounds.y1),
                    Point::new(bounds.x0, bounds.y1),
                ])]
            }
        }
    }

    /// Whether the shape encloses an area that can take a fill.
    pub fn is_closed(&self) -> bool {
        match self {
            ShapeKind::Rectangle { .. } | ShapeKind::Ellipse { .. } => true,
            ShapeKind::Polygon { closed, .. } => *closed,
            _ => false,
        }
    }

    /// Rescale local geometry by per-axis factors. Used by the coordinate
    /// mapper and by canvas resize; the canvas aspect is locked to the
    /// image's, so the factors are equal whenever a background is attached.
    pub fn scale_in_place(&mut self, sx: f64, sy: f64) {
        match self {
            ShapeKind::Stroke { points, .. } | ShapeKind::Polygon { points, .. } => {
                for p in points {
                    p.x *= sx;
                    p.y *= sy;
                }
            }
            ShapeKind::Rectangle { width, height } => {
                *width *= sx;
                *height *= sy;
            }
            ShapeKind::Ellipse { radius_x, radius_y } => {
                *radius_x *= sx;
                *radius_y *= sy;
            }
            ShapeKind::Line { start, end } => {
                start.x *= sx;
                start.y *= sy;
                end.x *= sx;
                end.y *= sy;
            }
            ShapeKind::Arrow {
                length, head_size, ..
            } => {
                // Length runs along the local x axis
                *length *= sx;
                *head_size *= sx;
            }
            ShapeKind::Text { font_size, .. } => {
                *font_size *= sy;
            }
            ShapeKind::Raster { width, height, .. } => {
                *width *= sx;
                *height *= sy;
            }
        }
    }

    /// Short kind name, used in log messages.
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Stroke { .. } => "stroke",
            ShapeKind::Rectangle { .. } => "rectangle",
            ShapeKind::Ellipse { .. } => "ellipse",
            ShapeKind::Polygon { .. } => "polygon",
            ShapeKind::Line { .. } => "line",
            ShapeKind::Arrow { .. } => "arrow",
            ShapeKind::Text { .. } => "text",
            ShapeKind::Raster { .. } => "raster",
        }
    }
}

fn closed_loop(points: &[Point]) -> Vec<Point> {
    let mut loop_points = points.to_vec();
    if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
        if first != last {
            loop_points.push(first);
        }
    }
    loop_points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_bounds() {
        let kind = ShapeKind::Rectangle {
            width: 100.0,
            height: 50.0,
        };
        let bounds = kind.local_bounds();
        assert!((bounds.width() - 100.0).abs() < f64::EPSILON);
        assert!((bounds.height() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ellipse_outline_is_closed() {
        let kind = ShapeKind::Ellipse {
            radius_x: 40.0,
            radius_y: 20.0,
        };
        let outline = kind.local_outline();
        assert_eq!(outline.len(), 1);
        assert_eq!(outline[0].first(), outline[0].last());
    }

    #[test]
    fn test_closed_kinds() {
        assert!(ShapeKind::Rectangle { width: 1.0, height: 1.0 }.is_closed());
        assert!(
            ShapeKind::Polygon {
                points: vec![Point::ZERO, Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
                closed: true
            }
            .is_closed()
        );
        assert!(
            !ShapeKind::Line {
                start: Point::ZERO,
                end: Point::new(1.0, 1.0)
            }
            .is_closed()
        );
    }

    #[test]
    fn test_scale_in_place() {
        let mut kind = ShapeKind::Rectangle {
            width: 100.0,
            height: 50.0,
        };
        kind.scale_in_place(3.0, 3.0);
        let bounds = kind.local_bounds();
        assert!((bounds.width() - 300.0).abs() < f64::EPSILON);
        assert!((bounds.height() - 150.0).abs() < f64::EPSILON);
    }
}
