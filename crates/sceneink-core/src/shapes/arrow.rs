//! Procedural arrow archetypes.
//!
//! Each archetype is a normalized template: shaft points in a canonical frame
//! running from (0, 0) to (1, 0), plus the shaft endpoints that carry an
//! arrowhead. A single fit routine scales the template to the drag length;
//! rotation and anchoring live in the shape's placement.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Available arrow archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArrowArchetype {
    #[default]
    Straight,
    Curved,
    SCurve,
    ZigZag,
    DoubleHeaded,
}

impl ArrowArchetype {
    /// All archetypes, in palette order.
    pub fn all() -> &'static [ArrowArchetype] {
        &[
            ArrowArchetype::Straight,
            ArrowArchetype::Curved,
            ArrowArchetype::SCurve,
            ArrowArchetype::ZigZag,
            ArrowArchetype::DoubleHeaded,
        ]
    }

    fn template(&self) -> &'static ArrowTemplate {
        match self {
            ArrowArchetype::Straight => &STRAIGHT,
            ArrowArchetype::Curved => &CURVED,
            ArrowArchetype::SCurve => &S_CURVE,
            ArrowArchetype::ZigZag => &ZIG_ZAG,
            ArrowArchetype::DoubleHeaded => &DOUBLE_HEADED,
        }
    }
}

/// A normalized arrow description in the canonical 0..1 frame.
struct ArrowTemplate {
    /// Shaft polyline, start to end.
    shaft: &'static [[f64; 2]],
    /// Heads: (index of the tip point, index of the point the head leans away from).
    heads: &'static [(usize, usize)],
}

static STRAIGHT: ArrowTemplate = ArrowTemplate {
    shaft: &[[0.0, 0.0], [1.0, 0.0]],
    heads: &[(1, 0)],
};

static CURVED: ArrowTemplate = ArrowTemplate {
    shaft: &[
        [0.0, 0.0],
        [0.15, -0.11],
        [0.35, -0.19],
        [0.5, -0.21],
        [0.65, -0.19],
        [0.85, -0.11],
        [1.0, 0.0],
    ],
    heads: &[(6, 5)],
};

static S_CURVE: ArrowTemplate = ArrowTemplate {
    shaft: &[
        [0.0, 0.0],
        [0.2, -0.14],
        [0.4, -0.16],
        [0.5, 0.0],
        [0.6, 0.16],
        [0.8, 0.14],
        [1.0, 0.0],
    ],
    heads: &[(6, 5)],
};

static ZIG_ZAG: ArrowTemplate = ArrowTemplate {
    shaft: &[
        [0.0, 0.0],
        [0.2, -0.12],
        [0.4, 0.12],
        [0.6, -0.12],
        [0.8, 0.12],
        [1.0, 0.0],
    ],
    heads: &[(5, 4)],
};

static DOUBLE_HEADED: ArrowTemplate = ArrowTemplate {
    shaft: &[[0.0, 0.0], [1.0, 0.0]],
    heads: &[(1, 0), (0, 1)],
};

/// An arrow expanded from its template into local coordinates.
///
/// Local space runs from (0, 0) toward (length, 0); placement rotation and
/// position anchor it to the drag vector.
#[derive(Debug, Clone)]
pub struct ArrowGeometry {
    /// Shaft polyline in local coordinates.
    pub shaft: Vec<Point>,
    /// Arrowhead triangles (tip, left barb, right barb) in local coordinates.
    pub heads: Vec<[Point; 3]>,
}

/// Expand an archetype template to a concrete length and head size.
pub fn expand(archetype: ArrowArchetype, length: f64, head_size: f64) -> ArrowGeometry {
    let template = archetype.template();
    let shaft: Vec<Point> = template
        .shaft
        .iter()
        .map(|[x, y]| Point::new(x * length, y * length))
        .collect();

    let heads = template
        .heads
        .iter()
        .map(|&(tip_idx, from_idx)| {
            let tip = shaft[tip_idx];
            let from = shaft[from_idx];
            let dir = normalized_dir(from, tip);
            let perp = Vec2::new(-dir.y, dir.x);
            let back = Point::new(tip.x - dir.x * head_size, tip.y - dir.y * head_size);
            [
                tip,
                Point::new(back.x + perp.x * head_size * 0.5, back.y + perp.y * head_size * 0.5),
                Point::new(back.x - perp.x * head_size * 0.5, back.y - perp.y * head_size * 0.5),
            ]
        })
        .collect();

    ArrowGeometry { shaft, heads }
}

/// Default head size for a given shaft length.
pub fn default_head_size(length: f64) -> f64 {
    (length * 0.3).clamp(6.0, 18.0)
}

fn normalized_dir(from: Point, to: Point) -> Vec2 {
    let d = Vec2::new(to.x - from.x, to.y - from.y);
    let len = d.hypot();
    if len < f64::EPSILON {
        Vec2::new(1.0, 0.0)
    } else {
        d / len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_straight() {
        let geo = expand(ArrowArchetype::Straight, 100.0, 10.0);
        assert_eq!(geo.shaft.len(), 2);
        assert_eq!(geo.heads.len(), 1);
        assert!((geo.shaft[1].x - 100.0).abs() < f64::EPSILON);
        // Tip of the head sits on the shaft end
        assert!((geo.heads[0][0].x - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_double_headed_has_two_heads() {
        let geo = expand(ArrowArchetype::DoubleHeaded, 50.0, 8.0);
        assert_eq!(geo.heads.len(), 2);
        // The reverse head points back toward the start
        assert!(geo.heads[1][0].x < geo.heads[0][0].x);
    }

    #[test]
    fn test_every_archetype_expands() {
        for &archetype in ArrowArchetype::all() {
            let geo = expand(archetype, 80.0, default_head_size(80.0));
            assert!(geo.shaft.len() >= 2);
            assert!(!geo.heads.is_empty());
            // Templates are normalized: endpoints land on (0,0) and (length,0)
            assert!(geo.shaft[0].distance(Point::ZERO) < 1e-9);
            assert!(geo.shaft.last().unwrap().distance(Point::new(80.0, 0.0)) < 1e-9);
        }
    }

    #[test]
    fn test_head_size_clamped() {
        assert!((default_head_size(10.0) - 6.0).abs() < f64::EPSILON);
        assert!((default_head_size(1000.0) - 18.0).abs() < f64::EPSILON);
    }
}
