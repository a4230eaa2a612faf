//! Coordinate math shared by the preprocessing and postprocessing stages.
//!
//! Everything here is pure. Callers are responsible for rejecting
//! zero-sized images before computing a letterbox.

use crate::models::BoundingBox;

/// Parameters of an aspect-preserving resize onto a square canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    /// Uniform scale applied to both axes.
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub new_width: u32,
    pub new_height: u32,
    pub target_size: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl LetterboxTransform {
    /// Map a point from original-image space into tensor space.
    pub fn letterbox_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale + self.pad_x as f32,
            y * self.scale + self.pad_y as f32,
        )
    }

    /// Map a point from tensor space back to original-image space (unclamped).
    pub fn unletterbox_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// Compute the letterbox for an `orig_w x orig_h` image and a square target.
///
/// Resized dimensions and padding both use floor. The limiting axis is set to
/// `target_size` exactly so float error in `scale` can't cost a pixel there.
pub fn compute_letterbox(orig_w: u32, orig_h: u32, target_size: u32) -> LetterboxTransform {
    debug_assert!(orig_w > 0 && orig_h > 0 && target_size > 0);

    let target = target_size as f64;
    let scale_w = target / orig_w as f64;
    let scale_h = target / orig_h as f64;
    let scale = scale_w.min(scale_h);

    let (new_width, new_height) = if scale_w <= scale_h {
        (target_size, floor_dim(orig_h as f64 * scale, target_size))
    } else {
        (floor_dim(orig_w as f64 * scale, target_size), target_size)
    };

    LetterboxTransform {
        scale: scale as f32,
        pad_x: (target_size - new_width) / 2,
        pad_y: (target_size - new_height) / 2,
        new_width,
        new_height,
        target_size,
        original_width: orig_w,
        original_height: orig_h,
    }
}

// Never collapse an axis to zero pixels on extreme aspect ratios.
fn floor_dim(value: f64, target_size: u32) -> u32 {
    (value.floor() as u32).clamp(1, target_size)
}

/// Convert a center-size box to corner format.
pub fn center_size_to_corner(cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
    let half_w = w / 2.0;
    let half_h = h / 2.0;
    BoundingBox::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
}

/// Map a tensor-space box back to the original image, clamped to its bounds.
pub fn unletterbox(bbox: &BoundingBox, transform: &LetterboxTransform) -> BoundingBox {
    let (x1, y1) = transform.unletterbox_point(bbox.x1, bbox.y1);
    let (x2, y2) = transform.unletterbox_point(bbox.x2, bbox.y2);
    BoundingBox::new(x1, y1, x2, y2).clamp_to(
        transform.original_width as f32,
        transform.original_height as f32,
    )
}

/// Intersection over union of two corner boxes.
///
/// Zero when the boxes are disjoint or either has no area.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let area_a = a.area();
    let area_b = b.area();
    if area_a <= 0.0 || area_b <= 0.0 {
        return 0.0;
    }

    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        (intersection / union).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
