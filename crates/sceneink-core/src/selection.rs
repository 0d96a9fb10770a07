//! Selection queries and center-preserving transforms.
//!
//! All hit-testing here operates on a single layer: selection never crosses
//! layers, so clicking a shape that lives elsewhere deselects instead of
//! cross-selecting.

use crate::layer::Layer;
use crate::shapes::math::point_in_polygon;
use crate::shapes::{Placement, Shape, ShapeId};
use kurbo::{Point, Rect};

/// Hit tolerance for select clicks, in display units.
pub const HIT_TOLERANCE: f64 = 5.0;

/// Topmost shape in the layer hit by a click.
pub fn hit_test_layer(layer: &Layer, point: Point, tolerance: f64) -> Option<ShapeId> {
    layer.shape_at_point(point, tolerance)
}

/// Shapes whose bounding box intersects the drag rectangle.
pub fn shapes_in_rect(layer: &Layer, rect: Rect) -> Vec<ShapeId> {
    layer
        .shapes
        .iter()
        .filter(|s| {
            let b = s.bounds();
            b.x0 <= rect.x1 && b.x1 >= rect.x0 && b.y0 <= rect.y1 && b.y1 >= rect.y0
        })
        .map(|s| s.id())
        .collect()
}

/// Shapes whose bounding-box center lies inside the closed lasso polygon.
pub fn shapes_in_lasso(layer: &Layer, lasso: &[Point]) -> Vec<ShapeId> {
    layer
        .shapes
        .iter()
        .filter(|s| point_in_polygon(s.bounds().center(), lasso))
        .map(|s| s.id())
        .collect()
}

/// Aggregate bounds of a selection within a layer.
pub fn selection_bounds(layer: &Layer, ids: &[ShapeId]) -> Option<Rect> {
    let mut result: Option<Rect> = None;
    for &id in ids {
        if let Some(shape) = layer.shape(id) {
            let bounds = shape.bounds();
            result = Some(match result {
                Some(r) => r.union(bounds),
                None => bounds,
            });
        }
    }
    result
}

/// Apply a placement mutation while keeping the shape's bounding-box center
/// fixed.
///
/// Three steps: (1) re-anchor the pivot to the local bbox center,
/// compensating position so nothing moves; (2) apply the requested change;
/// (3) re-measure the center and cancel whatever drift the transform itself
/// introduced. Step 3 matters because scale and skew precede translation, and
/// the bbox center of a transformed point set is not in general the transform
/// of the local bbox center.
fn transform_about_center(shape: &mut Shape, apply: impl FnOnce(&mut Placement)) {
    let before = shape.bounds().center();

    let local_center = shape.local_bounds().center();
    let delta = local_center - shape.placement.pivot;
    let shifted = shape.placement.linear() * Point::new(delta.x, delta.y);
    shape.placement.position += shifted.to_vec2();
    shape.placement.pivot = local_center;

    apply(&mut shape.placement);

    let after = shape.bounds().center();
    shape.placement.position += before - after;
}

/// Scale a shape around its own bounding-box center.
pub fn scale_about_center(shape: &mut Shape, sx: f64, sy: f64) {
    transform_about_center(shape, |p| {
        p.scale.x *= sx;
        p.scale.y *= sy;
    });
}

/// Mirror a shape around the vertical axis through its center.
pub fn flip_horizontal(shape: &mut Shape) {
    scale_about_center(shape, -1.0, 1.0);
}

/// Mirror a shape around the horizontal axis through its center.
pub fn flip_vertical(shape: &mut Shape) {
    scale_about_center(shape, 1.0, -1.0);
}

/// Skew a shape around its own bounding-box center.
pub fn skew_about_center(shape: &mut Shape, kx: f64, ky: f64) {
    transform_about_center(shape, |p| {
        p.skew.x += kx;
        p.skew.y += ky;
    });
}

/// Rotate a shape around its own bounding-box center.
pub fn rotate_about_center(shape: &mut Shape, angle: f64) {
    transform_about_center(shape, |p| {
        p.rotation += angle;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{ShapeKind, SerializableColor};

    /// A triangle whose local bounding box is well off its local origin.
    fn off_center_shape() -> Shape {
        Shape::new(
            Point::new(40.0, 60.0),
            ShapeKind::Polygon {
                points: vec![
                    Point::new(30.0, 10.0),
                    Point::new(90.0, 20.0),
                    Point::new(50.0, 80.0),
                ],
                closed: true,
            },
        )
    }

    fn assert_centers_match(a: Rect, b: Rect) {
        assert!(
            (a.center().x - b.center().x).abs() < 1e-6,
            "center x drifted: {} vs {}",
            a.center().x,
            b.center().x
        );
        assert!(
            (a.center().y - b.center().y).abs() < 1e-6,
            "center y drifted: {} vs {}",
            a.center().y,
            b.center().y
        );
    }

    #[test]
    fn test_flip_horizontal_preserves_center() {
        let mut shape = off_center_shape();
        let before = shape.bounds();
        flip_horizontal(&mut shape);
        let after = shape.bounds();
        assert_centers_match(before, after);
        assert!(shape.placement.scale.x < 0.0);
    }

    #[test]
    fn test_flip_vertical_preserves_center() {
        let mut shape = off_center_shape();
        let before = shape.bounds();
        flip_vertical(&mut shape);
        assert_centers_match(before, shape.bounds());
        assert!(shape.placement.scale.y < 0.0);
    }

    #[test]
    fn test_flip_twice_is_identity() {
        let mut shape = off_center_shape();
        let before = shape.bounds();
        let scale_sign = shape.placement.scale.x.signum();
        flip_horizontal(&mut shape);
        flip_horizontal(&mut shape);
        let after = shape.bounds();
        assert_centers_match(before, after);
        assert!((before.width() - after.width()).abs() < 1e-6);
        assert_eq!(shape.placement.scale.x.signum(), scale_sign);
    }

    #[test]
    fn test_skew_preserves_center() {
        let mut shape = off_center_shape();
        let before = shape.bounds();
        skew_about_center(&mut shape, 0.4, 0.0);
        assert_centers_match(before, shape.bounds());

        // And with a rotation already in the envelope
        let mut rotated = off_center_shape();
        rotated.placement.rotation = 0.7;
        let before = rotated.bounds();
        skew_about_center(&mut rotated, 0.25, -0.15);
        assert_centers_match(before, rotated.bounds());
    }

    #[test]
    fn test_scale_about_center() {
        let mut shape = off_center_shape();
        let before = shape.bounds();
        scale_about_center(&mut shape, 2.0, 2.0);
        let after = shape.bounds();
        assert_centers_match(before, after);
        assert!((after.width() - before.width() * 2.0).abs() < 1e-6);
        assert!((after.height() - before.height() * 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rect_selection_by_bbox_intersection() {
        let mut layer = Layer::new("sketch");
        let a = layer.add_shape(Shape::new(
            Point::new(0.0, 0.0),
            ShapeKind::Rectangle {
                width: 50.0,
                height: 50.0,
            },
        ));
        let b = layer.add_shape(Shape::new(
            Point::new(200.0, 200.0),
            ShapeKind::Rectangle {
                width: 50.0,
                height: 50.0,
            },
        ));

        let hits = shapes_in_rect(&layer, Rect::new(25.0, 25.0, 100.0, 100.0));
        assert!(hits.contains(&a));
        assert!(!hits.contains(&b));
    }

    #[test]
    fn test_lasso_selection_by_center() {
        let mut layer = Layer::new("sketch");
        let inside = layer.add_shape(Shape::new(
            Point::new(40.0, 40.0),
            ShapeKind::Rectangle {
                width: 20.0,
                height: 20.0,
            },
        ));
        // Bbox overlaps the lasso but its center is outside
        let straddling = layer.add_shape(Shape::new(
            Point::new(90.0, 40.0),
            ShapeKind::Rectangle {
                width: 40.0,
                height: 20.0,
            },
        ));

        let lasso = vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        let hits = shapes_in_lasso(&layer, &lasso);
        assert!(hits.contains(&inside));
        assert!(!hits.contains(&straddling));
    }

    #[test]
    fn test_hit_test_topmost_only() {
        let mut layer = Layer::new("sketch");
        let mut under = Shape::new(
            Point::new(0.0, 0.0),
            ShapeKind::Rectangle {
                width: 100.0,
                height: 100.0,
            },
        );
        under.style.fill_color = Some(SerializableColor::white());
        let mut over = under.clone();
        over.regenerate_id();
        let _under_id = layer.add_shape(under);
        let over_id = layer.add_shape(over);
        assert_eq!(
            hit_test_layer(&layer, Point::new(50.0, 50.0), HIT_TOLERANCE),
            Some(over_id)
        );
    }
}
