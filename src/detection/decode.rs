use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use tracing::{debug, trace};

use crate::config::OutputLayout;
use crate::detection::geometry::{LetterboxTransform, center_size_to_corner};
use crate::error::{DetectError, Result};
use crate::models::RawDetectionCandidate;

/// Turns raw model output into confidence-filtered candidates in tensor space.
#[derive(Debug, Clone)]
pub struct Decoder {
    pub num_classes: usize,
    pub layout: OutputLayout,
    pub confidence_threshold: f32,
}

impl Decoder {
    pub fn new(num_classes: usize, layout: OutputLayout, confidence_threshold: f32) -> Self {
        Self {
            num_classes,
            layout,
            confidence_threshold,
        }
    }

    /// Decode one image's raw output.
    ///
    /// Accepts `[C+4, N]` / `[N, C+4]` (per `layout`), optionally behind a
    /// batch axis of size 1. Anything else is a shape mismatch.
    pub fn decode(
        &self,
        raw: ArrayViewD<'_, f32>,
        transform: &LetterboxTransform,
    ) -> Result<Vec<RawDetectionCandidate>> {
        let features = self.feature_major_view(raw)?;
        let num_anchors = features.ncols();
        let limit = transform.target_size as f32;

        let mut candidates = Vec::new();

        for (anchor_index, column) in features.axis_iter(Axis(1)).enumerate() {
            let mut class_id = 0;
            let mut score = f32::NEG_INFINITY;
            for (class, &value) in column.iter().skip(4).enumerate() {
                // Strict comparison keeps the first maximum.
                if value > score {
                    score = value;
                    class_id = class;
                }
            }

            if score.is_nan() || score <= self.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
            if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
                trace!("Anchor {}: non-finite box, skipped", anchor_index);
                continue;
            }

            // A negative extent still describes a box; keep x1 <= x2, y1 <= y2.
            let bbox = center_size_to_corner(cx, cy, w.abs(), h.abs()).clamp_to(limit, limit);

            trace!(
                "Anchor {}: class={} score={:.3} box=({:.1}, {:.1}, {:.1}, {:.1})",
                anchor_index, class_id, score, bbox.x1, bbox.y1, bbox.x2, bbox.y2
            );

            candidates.push(RawDetectionCandidate {
                class_id,
                score,
                bbox,
                anchor_index,
            });
        }

        debug!(
            "Decoded {} of {} anchors above confidence {:.2}",
            candidates.len(),
            num_anchors,
            self.confidence_threshold
        );

        Ok(candidates)
    }

    /// Normalize the raw output to a `[C+4, N]` view without copying.
    fn feature_major_view<'a>(&self, raw: ArrayViewD<'a, f32>) -> Result<ArrayView2<'a, f32>> {
        let shape = raw.shape().to_vec();
        let features = self.num_classes + 4;
        let mismatch = || DetectError::ShapeMismatch {
            expected: match self.layout {
                OutputLayout::FeaturesFirst => format!("[1?, {}, N]", features),
                OutputLayout::AnchorsFirst => format!("[1?, N, {}]", features),
            },
            actual: shape.clone(),
        };

        let squeezed = match raw.ndim() {
            2 => raw,
            3 if raw.shape()[0] == 1 => raw.index_axis_move(Axis(0), 0),
            _ => return Err(mismatch()),
        };

        let view = squeezed.into_dimensionality::<Ix2>().map_err(|_| mismatch())?;
        let view = match self.layout {
            OutputLayout::FeaturesFirst => view,
            OutputLayout::AnchorsFirst => view.reversed_axes(),
        };

        if view.nrows() != features {
            return Err(mismatch());
        }

        Ok(view)
    }
}
