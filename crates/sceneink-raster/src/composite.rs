//! CPU compositor: flattens the layer stack over the background into one
//! RGBA bitmap.
//!
//! Vector shapes are filled with an even-odd scanline pass over their world
//! outlines and stroked by stamping disks along the path. Raster payloads and
//! text are rendered to local buffers and pasted through the shape's affine,
//! so transforms apply uniformly to every kind.

use crate::text;
use crate::RasterError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{Rgba, RgbaImage};
use kurbo::{Affine, Point, Rect};
use sceneink_core::canvas::{Background, Canvas};
use sceneink_core::layer::{BlendMode, Layer, LayerFilter};
use sceneink_core::shapes::{Shape, ShapeKind};

/// Flatten background plus all visible layers into one bitmap.
pub fn flatten(canvas: &Canvas) -> RgbaImage {
    let width = canvas.width.round().max(1.0) as u32;
    let height = canvas.height.round().max(1.0) as u32;
    let mut out = render_background(canvas, width, height);

    for layer in canvas.layers.iter().skip(1) {
        if !layer.visible || layer.is_empty() {
            continue;
        }
        let buf = render_layer(layer, width, height);
        blend_layer(&mut out, &buf, layer.opacity as f64 / 100.0, layer.blend_mode);
    }
    out
}

/// Render one layer in isolation onto a transparent buffer.
pub fn render_layer(layer: &Layer, width: u32, height: u32) -> RgbaImage {
    let mut buf = RgbaImage::new(width, height);
    for shape in &layer.shapes {
        draw_shape(&mut buf, shape);
    }
    for filter in &layer.filters {
        apply_filter(&mut buf, *filter);
    }
    buf
}

fn render_background(canvas: &Canvas, width: u32, height: u32) -> RgbaImage {
    match (&canvas.background, &canvas.background_bitmap) {
        (Background::Image { .. }, Some(pixels)) => {
            let src = RgbaImage::from_raw(pixels.width, pixels.height, pixels.rgba.as_ref().clone());
            match src {
                Some(src) => image::imageops::resize(
                    &src,
                    width,
                    height,
                    image::imageops::FilterType::Triangle,
                ),
                None => {
                    log::warn!("background bitmap has inconsistent dimensions; rendering without backdrop");
                    solid(width, height, Rgba([255, 255, 255, 255]))
                }
            }
        }
        (Background::Image { source, .. }, None) => {
            // Decode has not landed (or failed); stay usable without a backdrop
            log::debug!("no decoded bitmap for background '{source}'");
            solid(width, height, Rgba([255, 255, 255, 255]))
        }
        (Background::Color(color), _) => solid(width, height, Rgba([color.r, color.g, color.b, color.a])),
    }
}

fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    let mut buf = RgbaImage::new(width, height);
    for pixel in buf.pixels_mut() {
        *pixel = color;
    }
    buf
}

/// Draw one shape onto a buffer.
pub fn draw_shape(buf: &mut RgbaImage, shape: &Shape) {
    match &shape.kind {
        ShapeKind::Raster {
            width,
            height,
            format: _,
            data_base64,
            ..
        } => match decode_payload(data_base64) {
            Ok(src) => {
                let scale = Affine::scale_non_uniform(
                    width / src.width().max(1) as f64,
                    height / src.height().max(1) as f64,
                );
                paste_affine(buf, &src, shape.affine() * scale, shape.style.opacity);
            }
            Err(err) => {
                log::warn!("skipping undecodable raster payload: {err}");
            }
        },
        ShapeKind::Text { .. } => {
            if let Some(rendered) = text::render_text_shape(shape) {
                paste_affine(buf, &rendered, shape.affine(), shape.style.opacity);
            }
        }
        ShapeKind::Arrow { .. } => {
            let outlines = shape.world_outline();
            let stroke = to_rgba(shape.style.stroke_with_opacity());
            // First outline is the shaft; the rest are head triangles
            if let Some(shaft) = outlines.first() {
                stroke_polyline(buf, shaft, shape.style.stroke_width, stroke);
            }
            for head in outlines.iter().skip(1) {
                fill_polygons(buf, std::slice::from_ref(head), stroke);
                stroke_polyline(buf, head, shape.style.stroke_width.min(2.0), stroke);
            }
        }
        _ => {
            let outlines = shape.world_outline();
            if shape.is_closed() {
                if let Some(fill) = shape.style.fill_with_opacity() {
                    fill_polygons(buf, &outlines, to_rgba(fill));
                }
            }
            let stroke = to_rgba(shape.style.stroke_with_opacity());
            for outline in &outlines {
                stroke_polyline(buf, outline, shape.style.stroke_width, stroke);
            }
        }
    }
}

/// Decode a base64 PNG/JPEG payload.
pub fn decode_payload(data_base64: &str) -> Result<RgbaImage, RasterError> {
    let bytes = BASE64
        .decode(data_base64)
        .map_err(|e| RasterError::Decode(e.to_string()))?;
    let img = image::load_from_memory(&bytes).map_err(|e| RasterError::Decode(e.to_string()))?;
    Ok(img.to_rgba8())
}

/// Encode RGBA pixels as a base64 PNG payload.
pub fn encode_payload(img: &RgbaImage) -> Result<String, RasterError> {
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .map_err(|e| RasterError::Encode(e.to_string()))?;
    Ok(BASE64.encode(bytes))
}

/// Paste a source image through an affine (local pixel → world pixel),
/// sampling nearest-neighbor via the inverse map.
fn paste_affine(target: &mut RgbaImage, src: &RgbaImage, affine: Affine, opacity: f64) {
    let (sw, sh) = (src.width() as f64, src.height() as f64);
    let corners = [
        affine * Point::ZERO,
        affine * Point::new(sw, 0.0),
        affine * Point::new(sw, sh),
        affine * Point::new(0.0, sh),
    ];
    let bounds = sceneink_core::shapes::math::polyline_bounds(&corners);
    let inverse = affine.inverse();

    let x0 = bounds.x0.floor().max(0.0) as u32;
    let y0 = bounds.y0.floor().max(0.0) as u32;
    let x1 = (bounds.x1.ceil() as i64).clamp(0, target.width() as i64) as u32;
    let y1 = (bounds.y1.ceil() as i64).clamp(0, target.height() as i64) as u32;

    for ty in y0..y1 {
        for tx in x0..x1 {
            let local = inverse * Point::new(tx as f64 + 0.5, ty as f64 + 0.5);
            if local.x < 0.0 || local.y < 0.0 || local.x >= sw || local.y >= sh {
                continue;
            }
            let sample = *src.get_pixel(local.x as u32, local.y as u32);
            if sample.0[3] == 0 {
                continue;
            }
            let mut sample = sample;
            sample.0[3] = (sample.0[3] as f64 * opacity.clamp(0.0, 1.0)) as u8;
            composite_over(target.get_pixel_mut(tx, ty), sample);
        }
    }
}

/// Even-odd scanline fill over a set of closed outlines.
fn fill_polygons(buf: &mut RgbaImage, outlines: &[Vec<Point>], color: Rgba<u8>) {
    let mut bounds: Option<Rect> = None;
    for outline in outlines {
        let b = sceneink_core::shapes::math::polyline_bounds(outline);
        bounds = Some(match bounds {
            Some(r) => r.union(b),
            None => b,
        });
    }
    let Some(bounds) = bounds else { return };

    let y0 = bounds.y0.floor().max(0.0) as u32;
    let y1 = (bounds.y1.ceil() as i64).clamp(0, buf.height() as i64) as u32;

    for y in y0..y1 {
        let scan_y = y as f64 + 0.5;
        let mut crossings = Vec::new();
        for outline in outlines {
            for w in outline.windows(2) {
                let (a, b) = (w[0], w[1]);
                if (a.y <= scan_y) != (b.y <= scan_y) {
                    let t = (scan_y - a.y) / (b.y - a.y);
                    crossings.push(a.x + t * (b.x - a.x));
                }
            }
        }
        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        for pair in crossings.chunks(2) {
            if pair.len() < 2 {
                continue;
            }
            // Fill pixels whose centers fall inside the span
            let start = ((pair[0] - 0.5).ceil().max(0.0)) as i64;
            let end = ((pair[1] - 0.5).floor() as i64).min(buf.width() as i64 - 1);
            for x in start..=end {
                if x >= 0 {
                    composite_over(buf.get_pixel_mut(x as u32, y), color);
                }
            }
        }
    }
}

/// Stroke a polyline by stamping disks along its segments.
fn stroke_polyline(buf: &mut RgbaImage, points: &[Point], width: f64, color: Rgba<u8>) {
    if points.is_empty() {
        return;
    }
    let radius = (width / 2.0).max(0.5);
    if points.len() == 1 {
        stamp_disk(buf, points[0], radius, color);
        return;
    }
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        let steps = (len / (radius * 0.5).max(0.5)).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            stamp_disk(
                buf,
                Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)),
                radius,
                color,
            );
        }
    }
}

fn stamp_disk(buf: &mut RgbaImage, center: Point, radius: f64, color: Rgba<u8>) {
    let x0 = (center.x - radius).floor().max(0.0) as i64;
    let y0 = (center.y - radius).floor().max(0.0) as i64;
    let x1 = ((center.x + radius).ceil() as i64).min(buf.width() as i64 - 1);
    let y1 = ((center.y + radius).ceil() as i64).min(buf.height() as i64 - 1);
    let r_sq = radius * radius;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f64 + 0.5 - center.x;
            let dy = y as f64 + 0.5 - center.y;
            if dx * dx + dy * dy <= r_sq {
                // Max-alpha merge so overlapping stamps of a translucent
                // stroke don't darken
                let current = *buf.get_pixel(x as u32, y as u32);
                *buf.get_pixel_mut(x as u32, y as u32) = blend_max_alpha(current, color);
            }
        }
    }
}

/// Keep the more opaque of the existing and stamped pixel when both carry the
/// same stroke; composite otherwise.
fn blend_max_alpha(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if dst.0[0] == src.0[0] && dst.0[1] == src.0[1] && dst.0[2] == src.0[2] {
        Rgba([src.0[0], src.0[1], src.0[2], dst.0[3].max(src.0[3])])
    } else {
        let mut out = dst;
        composite_over(&mut out, src);
        out
    }
}

/// Standard source-over compositing.
fn composite_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src.0[3] as f64 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f64 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    for i in 0..3 {
        let sc = src.0[i] as f64;
        let dc = dst.0[i] as f64;
        dst.0[i] = ((sc * sa + dc * da * (1.0 - sa)) / out_a).round() as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

/// Composite a rendered layer onto the accumulator with opacity and blend
/// mode.
fn blend_layer(out: &mut RgbaImage, layer: &RgbaImage, opacity: f64, mode: BlendMode) {
    for (dst, src) in out.pixels_mut().zip(layer.pixels()) {
        let mut src = *src;
        if src.0[3] == 0 {
            continue;
        }
        if mode != BlendMode::Normal {
            for i in 0..3 {
                src.0[i] = blend_channel(mode, src.0[i], dst.0[i]);
            }
        }
        src.0[3] = (src.0[3] as f64 * opacity.clamp(0.0, 1.0)) as u8;
        composite_over(dst, src);
    }
}

fn blend_channel(mode: BlendMode, s: u8, d: u8) -> u8 {
    let (s, d) = (s as u16, d as u16);
    let v = match mode {
        BlendMode::Normal => s,
        BlendMode::Multiply => s * d / 255,
        BlendMode::Screen => 255 - (255 - s) * (255 - d) / 255,
        BlendMode::Overlay => {
            if d < 128 {
                2 * s * d / 255
            } else {
                255 - 2 * (255 - s) * (255 - d) / 255
            }
        }
    };
    v.min(255) as u8
}

fn apply_filter(buf: &mut RgbaImage, filter: LayerFilter) {
    for pixel in buf.pixels_mut() {
        if pixel.0[3] == 0 {
            continue;
        }
        match filter {
            LayerFilter::Grayscale => {
                let luma = (0.299 * pixel.0[0] as f64
                    + 0.587 * pixel.0[1] as f64
                    + 0.114 * pixel.0[2] as f64) as u8;
                pixel.0[0] = luma;
                pixel.0[1] = luma;
                pixel.0[2] = luma;
            }
            LayerFilter::Invert => {
                for i in 0..3 {
                    pixel.0[i] = 255 - pixel.0[i];
                }
            }
            LayerFilter::Brightness(factor) => {
                for i in 0..3 {
                    pixel.0[i] = (pixel.0[i] as f64 * factor).clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

/// Convert a peniko color to an image pixel.
fn to_rgba(color: peniko::Color) -> Rgba<u8> {
    let c = color.to_rgba8();
    Rgba([c.r, c.g, c.b, c.a])
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneink_core::canvas::PixelData;
    use sceneink_core::shapes::SerializableColor;

    fn filled_rect(x: f64, y: f64, w: f64, h: f64, fill: SerializableColor) -> Shape {
        let mut shape = Shape::new(
            Point::new(x, y),
            ShapeKind::Rectangle {
                width: w,
                height: h,
            },
        );
        shape.style.fill_color = Some(fill);
        shape.style.stroke_color = fill;
        shape
    }

    #[test]
    fn test_flatten_solid_background() {
        let canvas = Canvas::new(16.0, 16.0);
        let img = flatten(&canvas);
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(*img.get_pixel(8, 8), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_filled_rect_renders() {
        let mut canvas = Canvas::new(32.0, 32.0);
        canvas
            .active_layer_mut()
            .add_shape(filled_rect(8.0, 8.0, 16.0, 16.0, SerializableColor::new(255, 0, 0, 255)));
        let img = flatten(&canvas);
        assert_eq!(*img.get_pixel(16, 16), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(2, 2), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_invisible_layer_skipped() {
        let mut canvas = Canvas::new(32.0, 32.0);
        canvas
            .active_layer_mut()
            .add_shape(filled_rect(0.0, 0.0, 32.0, 32.0, SerializableColor::black()));
        canvas.layers[1].visible = false;
        let img = flatten(&canvas);
        assert_eq!(*img.get_pixel(16, 16), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_layer_opacity_blends() {
        let mut canvas = Canvas::new(32.0, 32.0);
        canvas
            .active_layer_mut()
            .add_shape(filled_rect(0.0, 0.0, 32.0, 32.0, SerializableColor::black()));
        canvas.layers[1].opacity = 50;
        let img = flatten(&canvas);
        let p = img.get_pixel(16, 16);
        // Half-black over white lands mid-gray
        assert!(p.0[0] > 100 && p.0[0] < 160, "got {:?}", p);
    }

    #[test]
    fn test_multiply_blend() {
        let mut canvas = Canvas::new(8.0, 8.0);
        canvas.background = Background::Color(SerializableColor::new(200, 200, 200, 255));
        canvas
            .active_layer_mut()
            .add_shape(filled_rect(0.0, 0.0, 8.0, 8.0, SerializableColor::new(128, 128, 128, 255)));
        canvas.layers[1].blend_mode = BlendMode::Multiply;
        let img = flatten(&canvas);
        let p = img.get_pixel(4, 4);
        // 200 * 128 / 255 ≈ 100
        assert!((p.0[0] as i32 - 100).abs() <= 2, "got {:?}", p);
    }

    #[test]
    fn test_background_bitmap_scaled() {
        let mut canvas = Canvas::new(4.0, 4.0);
        canvas.set_background_image("tiny.png", 2.0, 2.0);
        // 2x2 all-green source
        let rgba = vec![
            0, 255, 0, 255, 0, 255, 0, 255, //
            0, 255, 0, 255, 0, 255, 0, 255,
        ];
        canvas.attach_background_bitmap(PixelData::new(2, 2, rgba));
        let img = flatten(&canvas);
        assert_eq!(img.dimensions(), (4, 4));
        let p = img.get_pixel(2, 2);
        assert_eq!(p.0[1], 255);
    }

    #[test]
    fn test_payload_round_trip() {
        let mut src = RgbaImage::new(3, 2);
        src.put_pixel(1, 1, Rgba([10, 20, 30, 255]));
        let encoded = encode_payload(&src).unwrap();
        let decoded = decode_payload(&encoded).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(*decoded.get_pixel(1, 1), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_raster_shape_pasted_with_transform() {
        let mut src = RgbaImage::new(2, 2);
        for p in src.pixels_mut() {
            *p = Rgba([0, 0, 255, 255]);
        }
        let payload = encode_payload(&src).unwrap();
        let mut canvas = Canvas::new(16.0, 16.0);
        canvas.active_layer_mut().add_shape(Shape::new(
            Point::new(4.0, 4.0),
            ShapeKind::Raster {
                width: 8.0,
                height: 8.0,
                source_width: 2,
                source_height: 2,
                format: sceneink_core::shapes::RasterFormat::Png,
                data_base64: payload,
            },
        ));
        let img = flatten(&canvas);
        assert_eq!(*img.get_pixel(8, 8), Rgba([0, 0, 255, 255]));
        assert_eq!(*img.get_pixel(1, 1), Rgba([255, 255, 255, 255]));
    }
}
