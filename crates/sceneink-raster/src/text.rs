//! Text rasterization through system fonts.
//!
//! Text shapes are rendered to a local RGBA buffer and pasted through the
//! shape's affine by the compositor. A missing font is never fatal: the shape
//! is skipped with a warning and the rest of the composite proceeds.

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use sceneink_core::shapes::{Shape, ShapeKind};

/// Render a text shape into a local buffer (one buffer pixel per canvas
/// unit, origin at the shape's local origin). Returns None for empty content
/// or when no usable font exists.
pub fn render_text_shape(shape: &Shape) -> Option<RgbaImage> {
    let ShapeKind::Text {
        content,
        font_family,
        font_size,
        weight,
        italic,
    } = &shape.kind
    else {
        return None;
    };
    if content.trim().is_empty() {
        return None;
    }

    let font = match load_system_font(font_family, weight.css_weight(), *italic)
        .or_else(|| load_system_font("sans-serif", weight.css_weight(), *italic))
    {
        Some(font) => font,
        None => {
            log::warn!("no usable font for '{font_family}'; skipping text shape");
            return None;
        }
    };

    let color = shape
        .style
        .fill_color
        .unwrap_or(shape.style.stroke_color);
    let scaled = font.as_scaled(PxScale::from(*font_size as f32));
    let line_height = (scaled.height() + scaled.line_gap()).max(1.0);
    let ascent = scaled.ascent();

    let lines: Vec<&str> = content.split('\n').collect();
    let mut width = 1.0f32;
    for line in &lines {
        let mut advance = 0.0f32;
        for ch in line.chars() {
            advance += scaled.h_advance(font.glyph_id(ch));
        }
        width = width.max(advance);
    }
    let height = (lines.len() as f32 * line_height).max(1.0);

    let mut buf = RgbaImage::new(width.ceil() as u32 + 2, height.ceil() as u32 + 2);
    for (line_idx, line) in lines.iter().enumerate() {
        let baseline = ascent + line_idx as f32 * line_height;
        let mut caret = 0.0f32;
        for ch in line.chars() {
            let glyph_id = font.glyph_id(ch);
            let glyph = glyph_id.with_scale_and_position(*font_size as f32, point(caret, baseline));
            caret += scaled.h_advance(glyph_id);
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let glyph_bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let x = glyph_bounds.min.x + px as f32;
                let y = glyph_bounds.min.y + py as f32;
                if x < 0.0 || y < 0.0 || x >= buf.width() as f32 || y >= buf.height() as f32 {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * color.a as f32) as u8;
                let pixel = buf.get_pixel_mut(x as u32, y as u32);
                if alpha > pixel.0[3] {
                    *pixel = Rgba([color.r, color.g, color.b, alpha]);
                }
            });
        }
    }
    Some(buf)
}

/// Load a font by family name, CSS weight, and style from the system.
/// Returns None if the font cannot be found or decoded.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let family_name = match family {
        "sans-serif" => FamilyName::SansSerif,
        "serif" => FamilyName::Serif,
        "monospace" => FamilyName::Monospace,
        other => FamilyName::Title(other.to_string()),
    };

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);
    if italic {
        props.style = Style::Italic;
    }

    let handle = SystemSource::new()
        .select_best_match(&[family_name], &props)
        .ok()?;
    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use sceneink_core::shapes::FontWeight;

    fn text_shape(content: &str) -> Shape {
        Shape::new(
            Point::new(10.0, 10.0),
            ShapeKind::Text {
                content: content.to_string(),
                font_family: "sans-serif".to_string(),
                font_size: 16.0,
                weight: FontWeight::Regular,
                italic: false,
            },
        )
    }

    #[test]
    fn test_empty_text_renders_nothing() {
        assert!(render_text_shape(&text_shape("")).is_none());
        assert!(render_text_shape(&text_shape("   ")).is_none());
    }

    #[test]
    fn test_text_render_is_font_dependent() {
        // Headless CI may have no fonts at all; either outcome is valid, but
        // a successful render must contain inked pixels.
        if let Some(buf) = render_text_shape(&text_shape("CUT TO:")) {
            assert!(buf.pixels().any(|p| p.0[3] > 0));
        }
    }
}
