//! Stroke baking: replace a completed freehand stroke with a fixed bitmap.
//!
//! High-point-count strokes are expensive to transform and re-render as
//! vectors. After the gesture completes, the stroke is re-rendered in
//! isolation onto a tightly-cropped offscreen surface and its vector node is
//! swapped for a raster shape at the original bounding box, preserving
//! z-order and opacity.

use crate::composite;
use crate::RasterError;
use image::RgbaImage;
use kurbo::{Point, Vec2};
use sceneink_core::editor::Editor;
use sceneink_core::shapes::{RasterFormat, Shape, ShapeId, ShapeKind};

/// Bake a stroke shape to a bitmap. Returns Ok(false) when the target no
/// longer exists or is not a stroke; stale completions are discarded, never
/// treated as errors.
pub fn bake_stroke(editor: &mut Editor, shape_id: ShapeId) -> Result<bool, RasterError> {
    let Some(shape) = editor.shape(shape_id) else {
        log::debug!("bake target vanished; discarding");
        return Ok(false);
    };
    if !matches!(shape.kind, ShapeKind::Stroke { .. }) {
        log::debug!("bake target is no longer a stroke; discarding");
        return Ok(false);
    }

    let pad = shape.style.stroke_width / 2.0 + 1.0;
    let bounds = shape.bounds().inflate(pad, pad);
    let width = bounds.width().ceil().max(1.0) as u32;
    let height = bounds.height().ceil().max(1.0) as u32;

    // Re-render the stroke alone, shifted into the cropped surface
    let mut isolated = shape.clone();
    isolated.translate(Vec2::new(-bounds.x0, -bounds.y0));
    // Opacity is carried by the replacement shape, not baked into pixels
    isolated.style.opacity = 1.0;
    let mut surface = RgbaImage::new(width, height);
    composite::draw_shape(&mut surface, &isolated);

    let payload = composite::encode_payload(&surface)?;
    let mut replacement = Shape::new(
        Point::new(bounds.x0, bounds.y0),
        ShapeKind::Raster {
            width: bounds.width(),
            height: bounds.height(),
            source_width: width,
            source_height: height,
            format: RasterFormat::Png,
            data_base64: payload,
        },
    );
    replacement.style = shape.style.clone();

    Ok(editor.replace_shape(shape_id, replacement))
}
