//! Coordinate space mapping between the working canvas and the image.
//!
//! Shape geometry is edited in canvas pixels but persisted in the background
//! image's native pixels, so a record written at one canvas size reopens
//! identically at any other.

use crate::shapes::Shape;
use serde::{Deserialize, Serialize};

/// Scale/offset relationship between canvas space and image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateMapping {
    /// Canvas→image scale on the x axis.
    pub scale_x: f64,
    /// Canvas→image scale on the y axis.
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    /// Canvas width the mapping was computed for.
    pub display_width: f64,
    /// Canvas height the mapping was computed for.
    pub display_height: f64,
}

impl CoordinateMapping {
    /// Identity mapping, used when no background image is attached.
    pub fn identity(display_width: f64, display_height: f64) -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            display_width,
            display_height,
        }
    }

    /// Mapping for a background image shown on a canvas. Offsets are zero;
    /// the canvas aspect ratio is forced to match the image's before this is
    /// computed.
    pub fn for_image(
        canvas_width: f64,
        canvas_height: f64,
        image_width: f64,
        image_height: f64,
    ) -> Self {
        Self {
            scale_x: image_width / canvas_width,
            scale_y: image_height / canvas_height,
            offset_x: 0.0,
            offset_y: 0.0,
            display_width: canvas_width,
            display_height: canvas_height,
        }
    }

    /// Rewrite a shape's geometry from canvas space into image space.
    pub fn shape_to_image(&self, shape: &mut Shape) {
        shape.scale_in_place(self.scale_x, self.scale_y);
    }

    /// Rewrite a shape's geometry from image space into canvas space.
    pub fn shape_to_canvas(&self, shape: &mut Shape) {
        shape.scale_in_place(1.0 / self.scale_x, 1.0 / self.scale_y);
    }

    /// Whether this is the identity mapping.
    pub fn is_identity(&self) -> bool {
        self.scale_x == 1.0 && self.scale_y == 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeKind;
    use kurbo::Point;

    #[test]
    fn test_image_mapping_scale() {
        let mapping = CoordinateMapping::for_image(640.0, 360.0, 1920.0, 1080.0);
        assert!((mapping.scale_x - 3.0).abs() < 1e-9);
        assert!((mapping.scale_y - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_shape_round_trip() {
        let mapping = CoordinateMapping::for_image(640.0, 360.0, 1920.0, 1080.0);
        let mut shape = Shape::new(
            Point::new(100.0, 100.0),
            ShapeKind::Rectangle {
                width: 100.0,
                height: 50.0,
            },
        );
        mapping.shape_to_image(&mut shape);
        let image_bounds = shape.bounds();
        assert!((image_bounds.x0 - 300.0).abs() < 1e-9);
        assert!((image_bounds.y0 - 300.0).abs() < 1e-9);
        assert!((image_bounds.x1 - 600.0).abs() < 1e-9);
        assert!((image_bounds.y1 - 450.0).abs() < 1e-9);

        mapping.shape_to_canvas(&mut shape);
        let canvas_bounds = shape.bounds();
        assert!((canvas_bounds.x0 - 100.0).abs() < 1e-9);
        assert!((canvas_bounds.x1 - 200.0).abs() < 1e-9);
        assert!((canvas_bounds.y1 - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_reopen_at_other_resolution() {
        // Persisted at 3:1, reopened at 2:1 (960x540 canvas for a 1920x1080 image)
        let save = CoordinateMapping::for_image(640.0, 360.0, 1920.0, 1080.0);
        let load = CoordinateMapping::for_image(960.0, 540.0, 1920.0, 1080.0);
        let mut shape = Shape::new(
            Point::new(100.0, 100.0),
            ShapeKind::Rectangle {
                width: 100.0,
                height: 50.0,
            },
        );
        save.shape_to_image(&mut shape);
        load.shape_to_canvas(&mut shape);
        let bounds = shape.bounds();
        assert!((bounds.x0 - 150.0).abs() < 1e-9);
        assert!((bounds.y0 - 150.0).abs() < 1e-9);
        assert!((bounds.x1 - 300.0).abs() < 1e-9);
        assert!((bounds.y1 - 225.0).abs() < 1e-9);
    }
}
