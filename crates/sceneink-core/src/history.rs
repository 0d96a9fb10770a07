//! Snapshot-based undo/redo over the layer stack.

use crate::canvas::Canvas;
use crate::layer::Layer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of history states to keep.
pub const MAX_HISTORY: usize = 50;

/// Errors restoring a snapshot.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One immutable state of the canvas. The background bitmap is deliberately
/// absent: it lives on the canvas as an out-of-band field and survives every
/// restore untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryState {
    width: f64,
    height: f64,
    current_layer: usize,
    /// Layer stack, serialized so the snapshot is immune to later mutation.
    layers: String,
}

impl HistoryState {
    fn capture(canvas: &Canvas) -> Result<Self, HistoryError> {
        Ok(Self {
            width: canvas.width,
            height: canvas.height,
            current_layer: canvas.current_layer,
            layers: serde_json::to_string(&canvas.layers)?,
        })
    }

    fn restore(&self, canvas: &mut Canvas) -> Result<(), HistoryError> {
        let layers: Vec<Layer> = serde_json::from_str(&self.layers)?;
        canvas.width = self.width;
        canvas.height = self.height;
        canvas.layers = layers;
        canvas.current_layer = self.current_layer.min(canvas.layers.len() - 1).max(1);
        // Background reference and bitmap are untouched; only the mapping
        // needs recomputing for the restored dimensions.
        canvas.refresh_mapping();
        Ok(())
    }
}

/// Array of full-state snapshots with a current index.
#[derive(Debug, Clone, Default)]
pub struct History {
    states: Vec<HistoryState>,
    index: usize,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the canvas state after a mutation. Truncates any redo branch
    /// and evicts the oldest entry beyond the bound.
    pub fn record(&mut self, canvas: &Canvas) -> Result<(), HistoryError> {
        let state = HistoryState::capture(canvas)?;
        if !self.states.is_empty() {
            self.states.truncate(self.index + 1);
        }
        self.states.push(state);
        if self.states.len() > MAX_HISTORY {
            self.states.remove(0);
        }
        self.index = self.states.len() - 1;
        Ok(())
    }

    /// Step back one state. A no-op at the boundary; returns whether a
    /// restore happened.
    pub fn undo(&mut self, canvas: &mut Canvas) -> Result<bool, HistoryError> {
        if self.index == 0 || self.states.is_empty() {
            return Ok(false);
        }
        self.index -= 1;
        self.states[self.index].restore(canvas)?;
        Ok(true)
    }

    /// Step forward one state. A no-op at the boundary; returns whether a
    /// restore happened.
    pub fn redo(&mut self, canvas: &mut Canvas) -> Result<bool, HistoryError> {
        if self.states.is_empty() || self.index + 1 >= self.states.len() {
            return Ok(false);
        }
        self.index += 1;
        self.states[self.index].restore(canvas)?;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.states.is_empty() && self.index + 1 < self.states.len()
    }

    /// Number of retained states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
