//! Persisted edit records.
//!
//! The record is the sole artifact the host stores per image: every
//! non-background layer with its shapes rewritten into image-space units, so
//! a record written at one canvas resolution reopens identically at any
//! other.

use crate::canvas::Canvas;
use crate::layer::{BlendMode, Layer, LayerFilter};
use crate::shapes::Shape;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors producing or consuming records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One persisted layer: metadata plus shapes in image-space units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerRecord {
    pub name: String,
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    pub opacity: u8,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub filters: Vec<LayerFilter>,
    pub shapes: Vec<Shape>,
}

/// The full per-image edit record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditLayerRecord {
    pub layers: Vec<LayerRecord>,
}

impl EditLayerRecord {
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a record, tolerating individual corrupt shapes: an unrecognized
    /// kind or bad fields skips that shape with a warning and the rest of the
    /// layer still loads.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        #[derive(Deserialize)]
        struct RawLayer {
            name: String,
            visible: bool,
            #[serde(default)]
            locked: bool,
            opacity: u8,
            #[serde(default)]
            blend_mode: BlendMode,
            #[serde(default)]
            filters: Vec<LayerFilter>,
            shapes: Vec<serde_json::Value>,
        }
        #[derive(Deserialize)]
        struct Raw {
            layers: Vec<RawLayer>,
        }

        let raw: Raw = serde_json::from_str(json)?;
        let layers = raw
            .layers
            .into_iter()
            .map(|layer| {
                let shapes = layer
                    .shapes
                    .into_iter()
                    .filter_map(|value| match serde_json::from_value::<Shape>(value) {
                        Ok(shape) => Some(shape),
                        Err(err) => {
                            log::warn!(
                                "skipping unreadable shape in layer '{}': {err}",
                                layer.name
                            );
                            None
                        }
                    })
                    .collect();
                LayerRecord {
                    name: layer.name,
                    visible: layer.visible,
                    locked: layer.locked,
                    opacity: layer.opacity,
                    blend_mode: layer.blend_mode,
                    filters: layer.filters,
                    shapes,
                }
            })
            .collect();
        Ok(Self { layers })
    }
}

/// Export the canvas's non-background layers as an image-space record.
pub fn export(canvas: &Canvas) -> EditLayerRecord {
    let layers = canvas
        .layers
        .iter()
        .skip(1)
        .map(|layer| {
            let shapes = layer
                .shapes
                .iter()
                .map(|shape| {
                    let mut shape = shape.clone();
                    canvas.mapping.shape_to_image(&mut shape);
                    shape
                })
                .collect();
            LayerRecord {
                name: layer.name.clone(),
                visible: layer.visible,
                locked: layer.locked,
                opacity: layer.opacity,
                blend_mode: layer.blend_mode,
                filters: layer.filters.clone(),
                shapes,
            }
        })
        .collect();
    EditLayerRecord { layers }
}

/// Rebuild the canvas's drawing layers from a record, mapping shapes back
/// into canvas space. The background layer is left untouched.
pub fn import(canvas: &mut Canvas, record: &EditLayerRecord) {
    canvas.layers.truncate(1);
    for layer_record in &record.layers {
        let mut layer = Layer::new(layer_record.name.clone());
        layer.visible = layer_record.visible;
        layer.locked = layer_record.locked;
        layer.opacity = layer_record.opacity;
        layer.blend_mode = layer_record.blend_mode;
        layer.filters = layer_record.filters.clone();
        for shape in &layer_record.shapes {
            let mut shape = shape.clone();
            canvas.mapping.shape_to_canvas(&mut shape);
            layer.shapes.push(shape);
        }
        canvas.layers.push(layer);
    }
    if canvas.layers.len() == 1 {
        canvas.layers.push(Layer::new("Layer 1"));
    }
    canvas.current_layer = canvas.layers.len() - 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeKind;
    use kurbo::Point;

    fn annotated_canvas() -> Canvas {
        let mut canvas = Canvas::new(640.0, 360.0);
        canvas.set_background_image("shot.png", 1920.0, 1080.0);
        canvas.active_layer_mut().add_shape(Shape::new(
            Point::new(100.0, 100.0),
            ShapeKind::Rectangle {
                width: 100.0,
                height: 50.0,
            },
        ));
        canvas
    }

    #[test]
    fn test_export_is_image_space() {
        let canvas = annotated_canvas();
        let record = export(&canvas);
        assert_eq!(record.layers.len(), 1);
        let bounds = record.layers[0].shapes[0].bounds();
        assert!((bounds.x0 - 300.0).abs() < 1e-9);
        assert!((bounds.y0 - 300.0).abs() < 1e-9);
        assert!((bounds.x1 - 600.0).abs() < 1e-9);
        assert!((bounds.y1 - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_same_canvas() {
        let canvas = annotated_canvas();
        let record = export(&canvas);

        let mut fresh = Canvas::new(640.0, 360.0);
        fresh.set_background_image("shot.png", 1920.0, 1080.0);
        import(&mut fresh, &record);

        let a = canvas.layers[1].shapes[0].bounds();
        let b = fresh.layers[1].shapes[0].bounds();
        assert!((a.x0 - b.x0).abs() < 1e-6);
        assert!((a.y0 - b.y0).abs() < 1e-6);
        assert!((a.x1 - b.x1).abs() < 1e-6);
        assert!((a.y1 - b.y1).abs() < 1e-6);
    }

    #[test]
    fn test_reopen_at_different_resolution() {
        let canvas = annotated_canvas();
        let record = export(&canvas);

        let mut fresh = Canvas::new(960.0, 540.0);
        fresh.set_background_image("shot.png", 1920.0, 1080.0);
        import(&mut fresh, &record);

        let bounds = fresh.layers[1].shapes[0].bounds();
        assert!((bounds.x0 - 150.0).abs() < 1e-6);
        assert!((bounds.y0 - 150.0).abs() < 1e-6);
        assert!((bounds.x1 - 300.0).abs() < 1e-6);
        assert!((bounds.y1 - 225.0).abs() < 1e-6);
    }

    #[test]
    fn test_corrupt_shape_is_skipped() {
        let canvas = annotated_canvas();
        let mut value: serde_json::Value =
            serde_json::from_str(&export(&canvas).to_json().unwrap()).unwrap();
        // Append a shape with an unknown kind next to the good one
        value["layers"][0]["shapes"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({ "kind": "Hologram", "shimmer": 11 }));

        let record = EditLayerRecord::from_json(&value.to_string()).unwrap();
        assert_eq!(record.layers[0].shapes.len(), 1);
    }

    #[test]
    fn test_import_keeps_background_layer() {
        let mut canvas = annotated_canvas();
        let record = export(&canvas);
        import(&mut canvas, &record);
        assert_eq!(canvas.layers[0].name, "Background");
        assert!(canvas.current_layer >= 1);
    }
}
