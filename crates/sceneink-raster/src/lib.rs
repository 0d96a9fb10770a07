//! SceneInk Raster
//!
//! CPU pixel work for the annotation engine: flattening the layer stack to a
//! composite bitmap, baking freehand strokes to raster payloads, and the
//! paint-bucket flood fill.

pub mod bake;
pub mod composite;
pub mod flood;
pub mod text;

pub use bake::bake_stroke;
pub use composite::{decode_payload, encode_payload, flatten};
pub use flood::{paint_bucket, FillOutcome, FILL_TOLERANCE};

use thiserror::Error;

/// Raster pipeline errors.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("payload encode failed: {0}")]
    Encode(String),
    #[error("payload decode failed: {0}")]
    Decode(String),
}

/// Flatten all visible layers into one bitmap for the host's thumbnail
/// display.
pub fn to_raster_image(canvas: &sceneink_core::canvas::Canvas) -> image::RgbaImage {
    composite::flatten(canvas)
}
