//! SceneInk Core Library
//!
//! Platform-agnostic scene graph and editing logic for the SceneInk
//! annotation engine: layered shapes over a reference image, with undoable
//! edits persisted in resolution-independent image-space records.

pub mod canvas;
pub mod editor;
pub mod history;
pub mod layer;
pub mod mapping;
pub mod record;
pub mod selection;
pub mod shapes;
pub mod tools;

pub use canvas::{Background, Canvas, PixelData};
pub use editor::{ChangeEvent, Editor};
pub use history::{History, MAX_HISTORY};
pub use layer::{BlendMode, Layer, LayerFilter, LayerId};
pub use mapping::CoordinateMapping;
pub use record::EditLayerRecord;
pub use tools::{Gesture, GestureState, SelectMode, ToolConfig, ToolKind, MIN_GESTURE_SIZE};
