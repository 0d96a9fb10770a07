//! Tool configuration and the pointer-gesture state machine.
//!
//! Tool parameters travel as an immutable [`ToolConfig`] value passed into
//! each gesture handler, so the state machine can be driven and audited
//! without a live rendering surface.

use crate::shapes::arrow::{self, ArrowArchetype};
use crate::shapes::math::{polyline_bounds, rdp_simplify};
use crate::shapes::{FontWeight, Shape, ShapeId, ShapeKind, ShapeStyle};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Minimum drag extent (in display units) below which a gesture produces no
/// shape.
pub const MIN_GESTURE_SIZE: f64 = 5.0;

/// Tolerance for brush smoothing (RDP).
const SMOOTHING_TOLERANCE: f64 = 1.5;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToolKind {
    #[default]
    Select,
    Brush,
    Eraser,
    Rectangle,
    Ellipse,
    Polygon,
    Line,
    Arrow,
    Text,
    PaintBucket,
}

/// Multi-select gesture style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectMode {
    #[default]
    Rectangle,
    Lasso,
}

/// Immutable tool parameters for one gesture.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub tool: ToolKind,
    pub style: ShapeStyle,
    /// Simplify brush strokes after the gesture.
    pub smoothing: bool,
    /// Sides for the polygon tool.
    pub polygon_sides: u32,
    /// Arrow archetype for the arrow tool.
    pub archetype: ArrowArchetype,
    pub select_mode: SelectMode,
    /// Opacity for paint-bucket raster fills (0.0–1.0).
    pub fill_opacity: f64,
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: FontWeight,
    pub italic: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tool: ToolKind::default(),
            style: ShapeStyle::default(),
            smoothing: true,
            polygon_sides: 5,
            archetype: ArrowArchetype::default(),
            select_mode: SelectMode::default(),
            fill_opacity: 1.0,
            font_family: "sans-serif".to_string(),
            font_size: 20.0,
            font_weight: FontWeight::default(),
            italic: false,
        }
    }
}

impl ToolConfig {
    /// A config for the given tool with everything else at defaults.
    pub fn for_tool(tool: ToolKind) -> Self {
        Self {
            tool,
            ..Self::default()
        }
    }
}

/// The region produced by a completed multi-select gesture.
#[derive(Debug, Clone)]
pub enum SelectRegion {
    Rect(Rect),
    Lasso(Vec<Point>),
}

/// Input state machine over pointer gestures.
#[derive(Debug, Clone, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Drawing {
        start: Point,
        current: Point,
        /// Accumulated path points (brush only).
        points: Vec<Point>,
    },
    Selecting {
        mode: SelectMode,
        start: Point,
        path: Vec<Point>,
    },
    EditingText {
        shape: ShapeId,
    },
}

/// Tracks the in-flight gesture. Mutations to the scene graph only happen
/// when a gesture completes; an aborted or degenerate gesture leaves the
/// scene graph unchanged.
#[derive(Debug, Clone, Default)]
pub struct Gesture {
    state: GestureState,
}

impl Gesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GestureState::Idle)
    }

    /// Begin a drawing gesture.
    pub fn begin_draw(&mut self, point: Point) {
        self.state = GestureState::Drawing {
            start: point,
            current: point,
            points: vec![point],
        };
    }

    /// Begin a multi-select gesture.
    pub fn begin_select(&mut self, point: Point, mode: SelectMode) {
        self.state = GestureState::Selecting {
            mode,
            start: point,
            path: vec![point],
        };
    }

    /// Enter in-place text editing for a shape.
    pub fn begin_text_edit(&mut self, shape: ShapeId) {
        self.state = GestureState::EditingText { shape };
    }

    /// The shape being text-edited, if any.
    pub fn editing_text(&self) -> Option<ShapeId> {
        match self.state {
            GestureState::EditingText { shape } => Some(shape),
            _ => None,
        }
    }

    /// Track pointer movement.
    pub fn update(&mut self, point: Point) {
        match &mut self.state {
            GestureState::Drawing {
                current, points, ..
            } => {
                *current = point;
                // Skip sub-pixel jitter
                if points
                    .last()
                    .is_none_or(|last| (point - *last).hypot() >= 0.5)
                {
                    points.push(point);
                }
            }
            GestureState::Selecting { path, .. } => {
                path.push(point);
            }
            _ => {}
        }
    }

    /// Abort the gesture, leaving the scene graph untouched.
    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }

    /// Complete a drawing gesture, producing a shape if it clears the
    /// minimum-size threshold.
    pub fn end_draw(&mut self, point: Point, config: &ToolConfig) -> Option<Shape> {
        let state = std::mem::take(&mut self.state);
        let GestureState::Drawing {
            start, mut points, ..
        } = state
        else {
            return None;
        };
        if points.last() != Some(&point) {
            points.push(point);
        }
        build_shape(start, point, &points, config)
    }

    /// Complete a multi-select gesture, yielding the selected region. Returns
    /// None for drags below the minimum threshold (treated as a click).
    pub fn end_select(&mut self, point: Point) -> Option<SelectRegion> {
        let state = std::mem::take(&mut self.state);
        let GestureState::Selecting {
            mode,
            start,
            mut path,
        } = state
        else {
            return None;
        };
        path.push(point);
        let extent = Rect::from_points(start, point);
        match mode {
            SelectMode::Rectangle => {
                if extent.width() < MIN_GESTURE_SIZE && extent.height() < MIN_GESTURE_SIZE {
                    None
                } else {
                    Some(SelectRegion::Rect(extent))
                }
            }
            SelectMode::Lasso => {
                let bounds = polyline_bounds(&path);
                if bounds.width() < MIN_GESTURE_SIZE && bounds.height() < MIN_GESTURE_SIZE {
                    None
                } else {
                    Some(SelectRegion::Lasso(path))
                }
            }
        }
    }
}

/// Build the shape for a completed drag. Returns None for tools that do not
/// create shapes on drag, and for degenerate gestures.
fn build_shape(start: Point, end: Point, points: &[Point], config: &ToolConfig) -> Option<Shape> {
    let drag = Rect::from_points(start, end);
    let style = config.style.clone();

    match config.tool {
        ToolKind::Rectangle => {
            if drag.width() < MIN_GESTURE_SIZE || drag.height() < MIN_GESTURE_SIZE {
                return None;
            }
            Some(Shape::with_style(
                drag.origin(),
                ShapeKind::Rectangle {
                    width: drag.width(),
                    height: drag.height(),
                },
                style,
            ))
        }
        ToolKind::Ellipse => {
            if drag.width() < MIN_GESTURE_SIZE || drag.height() < MIN_GESTURE_SIZE {
                return None;
            }
            Some(Shape::with_style(
                drag.center(),
                ShapeKind::Ellipse {
                    radius_x: drag.width() / 2.0,
                    radius_y: drag.height() / 2.0,
                },
                style,
            ))
        }
        ToolKind::Polygon => {
            if drag.width() < MIN_GESTURE_SIZE || drag.height() < MIN_GESTURE_SIZE {
                return None;
            }
            let sides = config.polygon_sides.max(3);
            let (rx, ry) = (drag.width() / 2.0, drag.height() / 2.0);
            let local: Vec<Point> = (0..sides)
                .map(|i| {
                    // Apex up
                    let t = i as f64 / sides as f64 * std::f64::consts::TAU
                        - std::f64::consts::FRAC_PI_2;
                    Point::new(rx * t.cos(), ry * t.sin())
                })
                .collect();
            Some(Shape::with_style(
                drag.center(),
                ShapeKind::Polygon {
                    points: local,
                    closed: true,
                },
                style,
            ))
        }
        ToolKind::Line => {
            let delta = end - start;
            if delta.hypot() < MIN_GESTURE_SIZE {
                return None;
            }
            Some(Shape::with_style(
                start,
                ShapeKind::Line {
                    start: Point::ZERO,
                    end: delta.to_point(),
                },
                style,
            ))
        }
        ToolKind::Arrow => {
            let delta = end - start;
            let length = delta.hypot();
            if length < MIN_GESTURE_SIZE {
                return None;
            }
            // Fit the archetype template to the drag vector: scale to its
            // length, rotate to its angle, anchor at its origin.
            let mut shape = Shape::with_style(
                start,
                ShapeKind::Arrow {
                    archetype: config.archetype,
                    length,
                    head_size: arrow::default_head_size(length),
                },
                style,
            );
            shape.placement.rotation = delta.y.atan2(delta.x);
            Some(shape)
        }
        ToolKind::Brush => {
            if points.len() < 2 {
                return None;
            }
            let bounds = polyline_bounds(points);
            if bounds.width() < MIN_GESTURE_SIZE && bounds.height() < MIN_GESTURE_SIZE {
                return None;
            }
            let origin = bounds.origin();
            let mut local: Vec<Point> = points
                .iter()
                .map(|p| Point::new(p.x - origin.x, p.y - origin.y))
                .collect();
            if config.smoothing {
                local = rdp_simplify(&local, SMOOTHING_TOLERANCE);
            }
            Some(Shape::with_style(
                origin,
                ShapeKind::Stroke {
                    points: local,
                    smoothing: config.smoothing,
                },
                style,
            ))
        }
        // Click-driven or destructive tools create nothing on drag
        ToolKind::Select | ToolKind::Eraser | ToolKind::Text | ToolKind::PaintBucket => None,
    }
}

/// Build the empty text node placed by a text-tool click.
pub fn place_text(point: Point, config: &ToolConfig) -> Shape {
    let mut style = config.style.clone();
    style.fill_color = Some(style.stroke_color);
    Shape::with_style(
        point,
        ShapeKind::Text {
            content: String::new(),
            font_family: config.font_family.clone(),
            font_size: config.font_size,
            weight: config.font_weight,
            italic: config.italic,
        },
        style,
    )
}
