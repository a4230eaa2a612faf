use serde::{Deserialize, Serialize};

/// Axis-aligned box in corner format (x1, y1, x2, y2).
///
/// The coordinate frame depends on where the box lives: candidates carry
/// tensor-space boxes, detections carry original-image boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Clamp every coordinate into `[0, max_x] x [0, max_y]`.
    pub fn clamp_to(&self, max_x: f32, max_y: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, max_x),
            y1: self.y1.clamp(0.0, max_y),
            x2: self.x2.clamp(0.0, max_x),
            y2: self.y2.clamp(0.0, max_y),
        }
    }
}

/// A confidence-filtered anchor, still in letterboxed tensor space.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetectionCandidate {
    pub class_id: usize,
    pub score: f32,
    pub bbox: BoundingBox,
    /// Position of the anchor in the raw output; breaks score ties.
    pub anchor_index: usize,
}

/// A retained detection in original-image pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}
