//! Paint bucket: closed-shape fill with a pixel flood-fill fallback.
//!
//! A click inside a recognized closed shape sets that shape's fill directly,
//! which is cheap and keeps the vector intact. Anywhere else, a 4-connected
//! stack-based flood fill runs over a flattened snapshot and the result lands
//! as a new raster layer above the current one.

use crate::composite;
use crate::RasterError;
use image::RgbaImage;
use kurbo::Point;
use sceneink_core::editor::Editor;
use sceneink_core::layer::Layer;
use sceneink_core::shapes::{RasterFormat, Shape, ShapeId, ShapeKind};
use sceneink_core::tools::ToolConfig;

/// Per-channel color tolerance for region matching.
pub const FILL_TOLERANCE: u8 = 10;

/// What a paint-bucket click did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// A closed shape's fill attribute was set.
    ShapeFill(ShapeId),
    /// A flood-filled region was inserted as a new raster layer.
    RasterFill { pixels: usize },
    /// The click landed outside the canvas or matched nothing.
    NoFill,
}

/// Resolve a paint-bucket click.
pub fn paint_bucket(
    editor: &mut Editor,
    point: Point,
    config: &ToolConfig,
) -> Result<FillOutcome, RasterError> {
    let fill_color = config
        .style
        .fill_color
        .unwrap_or(config.style.stroke_color);

    // Vector branch: a click inside a closed shape sets its fill directly
    if let Some(id) = editor.fill_closed_shape_at(point, fill_color) {
        return Ok(FillOutcome::ShapeFill(id));
    }

    // Pixel branch: flood fill over a flattened snapshot
    let snapshot = composite::flatten(&editor.canvas);
    let (width, height) = snapshot.dimensions();
    if point.x < 0.0 || point.y < 0.0 || point.x >= width as f64 || point.y >= height as f64 {
        return Ok(FillOutcome::NoFill);
    }
    let (start_x, start_y) = (point.x as u32, point.y as u32);

    let (mask, bbox) = flood_fill_mask(&snapshot, start_x, start_y, FILL_TOLERANCE);
    let Some((min_x, min_y, max_x, max_y)) = bbox else {
        return Ok(FillOutcome::NoFill);
    };

    let region_w = max_x - min_x + 1;
    let region_h = max_y - min_y + 1;
    let alpha = (255.0 * config.fill_opacity.clamp(0.0, 1.0)) as u8;
    let mut region = RgbaImage::new(region_w, region_h);
    let mut filled = 0usize;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            if mask[(y * width + x) as usize] != 0 {
                region.put_pixel(
                    x - min_x,
                    y - min_y,
                    image::Rgba([fill_color.r, fill_color.g, fill_color.b, alpha]),
                );
                filled += 1;
            }
        }
    }

    let payload = composite::encode_payload(&region)?;
    let mut layer = Layer::new("Fill");
    layer.add_shape(Shape::new(
        Point::new(min_x as f64, min_y as f64),
        ShapeKind::Raster {
            width: region_w as f64,
            height: region_h as f64,
            source_width: region_w,
            source_height: region_h,
            format: RasterFormat::Png,
            data_base64: payload,
        },
    ));
    editor.insert_layer_above_current(layer);
    Ok(FillOutcome::RasterFill { pixels: filled })
}

/// 4-connected stack-based flood fill on a flat snapshot. Returns the filled
/// mask (one byte per pixel, 255 = filled) and the region's bounding box.
fn flood_fill_mask(
    img: &RgbaImage,
    start_x: u32,
    start_y: u32,
    tolerance: u8,
) -> (Vec<u8>, Option<(u32, u32, u32, u32)>) {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let mut mask = vec![0u8; width * height];
    if start_x as usize >= width || start_y as usize >= height {
        return (mask, None);
    }

    let flat = img.as_raw();
    let target: [u8; 4] = {
        let o = (start_y as usize * width + start_x as usize) * 4;
        [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
    };

    let matches = |idx: usize| -> bool {
        let o = idx * 4;
        let p = [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]];
        p.iter()
            .zip(target.iter())
            .all(|(&a, &b)| a.abs_diff(b) <= tolerance)
    };

    let seed = start_y as usize * width + start_x as usize;
    // The mask doubles as the visited array
    let mut stack: Vec<u32> = Vec::with_capacity(4096);
    mask[seed] = 255;
    stack.push(seed as u32);

    let (mut min_x, mut min_y) = (start_x, start_y);
    let (mut max_x, mut max_y) = (start_x, start_y);

    while let Some(idx) = stack.pop() {
        let idx = idx as usize;
        let x = (idx % width) as u32;
        let y = (idx / width) as u32;
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        if x > 0 {
            let ni = idx - 1;
            if mask[ni] == 0 && matches(ni) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
        if (x as usize) + 1 < width {
            let ni = idx + 1;
            if mask[ni] == 0 && matches(ni) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
        if y > 0 {
            let ni = idx - width;
            if mask[ni] == 0 && matches(ni) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
        if (y as usize) + 1 < height {
            let ni = idx + width;
            if mask[ni] == 0 && matches(ni) {
                mask[ni] = 255;
                stack.push(ni as u32);
            }
        }
    }

    (mask, Some((min_x, min_y, max_x, max_y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneink_core::shapes::SerializableColor;
    use sceneink_core::tools::ToolKind;

    fn bucket_config(color: SerializableColor) -> ToolConfig {
        let mut config = ToolConfig::for_tool(ToolKind::PaintBucket);
        config.style.fill_color = Some(color);
        config
    }

    #[test]
    fn test_click_in_closed_rect_sets_fill_only() {
        let mut editor = Editor::new(64.0, 64.0);
        let rect_config = ToolConfig::for_tool(ToolKind::Rectangle);
        editor.pointer_down(Point::new(10.0, 10.0), &rect_config);
        editor.pointer_up(Point::new(50.0, 50.0), &rect_config);
        let id = editor.canvas.active_layer().shapes[0].id();

        let red = SerializableColor::new(255, 0, 0, 255);
        let outcome = paint_bucket(&mut editor, Point::new(30.0, 30.0), &bucket_config(red)).unwrap();
        assert_eq!(outcome, FillOutcome::ShapeFill(id));
        assert_eq!(editor.shape(id).unwrap().style.fill_color, Some(red));
        // Vector-preserving: no raster layer appeared
        assert_eq!(editor.canvas.layers.len(), 2);
    }

    #[test]
    fn test_flood_fill_bounded_by_opaque_border() {
        let mut editor = Editor::new(32.0, 32.0);
        // A full-height black divider splits the canvas
        let line_config = ToolConfig::for_tool(ToolKind::Line);
        editor.pointer_down(Point::new(16.0, -2.0), &line_config);
        editor.pointer_up(Point::new(16.0, 34.0), &line_config);

        let red = SerializableColor::new(255, 0, 0, 255);
        let outcome = paint_bucket(&mut editor, Point::new(6.0, 8.0), &bucket_config(red)).unwrap();
        assert!(matches!(outcome, FillOutcome::RasterFill { pixels } if pixels > 0));

        let img = composite::flatten(&editor.canvas);
        // Left of the divider: filled
        assert_eq!(img.get_pixel(6, 8).0[0], 255);
        assert_eq!(img.get_pixel(6, 8).0[1], 0);
        // Right of the divider: untouched white
        assert_eq!(*img.get_pixel(26, 8), image::Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_fill_is_undoable() {
        let mut editor = Editor::new(32.0, 32.0);
        let red = SerializableColor::new(255, 0, 0, 255);
        paint_bucket(&mut editor, Point::new(8.0, 8.0), &bucket_config(red)).unwrap();
        assert_eq!(editor.canvas.layers.len(), 3);

        editor.undo();
        assert_eq!(editor.canvas.layers.len(), 2);
    }

    #[test]
    fn test_out_of_bounds_click() {
        let mut editor = Editor::new(32.0, 32.0);
        let red = SerializableColor::new(255, 0, 0, 255);
        let outcome = paint_bucket(&mut editor, Point::new(-5.0, 8.0), &bucket_config(red)).unwrap();
        assert_eq!(outcome, FillOutcome::NoFill);
    }

    #[test]
    fn test_tolerance_merges_near_colors() {
        let mut editor = Editor::new(8.0, 8.0);
        // A near-white patch over the white backdrop: within the 10/255
        // per-channel tolerance, so the flood crosses it
        let near_white = SerializableColor::new(245, 245, 245, 255);
        let mut patch = Shape::new(
            Point::new(2.0, 2.0),
            ShapeKind::Rectangle {
                width: 4.0,
                height: 4.0,
            },
        );
        patch.style.fill_color = Some(near_white);
        patch.style.stroke_color = near_white;
        editor.add_shape(patch);

        let blue = SerializableColor::new(0, 0, 255, 255);
        let outcome = paint_bucket(&mut editor, Point::new(0.0, 0.0), &bucket_config(blue)).unwrap();
        assert!(matches!(outcome, FillOutcome::RasterFill { pixels } if pixels == 64));
    }
}
