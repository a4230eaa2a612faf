use std::cmp::Ordering;
use tracing::{debug, trace};

use crate::config::NmsMode;
use crate::detection::geometry::{LetterboxTransform, iou, unletterbox};
use crate::models::{Detection, RawDetectionCandidate};

/// Greedy non-maximum suppression followed by the mapping back to the
/// original image.
#[derive(Debug, Clone)]
pub struct Suppressor {
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub mode: NmsMode,
}

impl Suppressor {
    pub fn new(iou_threshold: f32, max_detections: usize, mode: NmsMode) -> Self {
        Self {
            iou_threshold,
            max_detections,
            mode,
        }
    }

    /// Run NMS in tensor space and return detections in original-image space.
    pub fn suppress(
        &self,
        candidates: Vec<RawDetectionCandidate>,
        transform: &LetterboxTransform,
    ) -> Vec<Detection> {
        let total = candidates.len();
        let kept = self.retain(candidates);

        debug!(
            "NMS ({:?}): kept {}/{} candidates (max {})",
            self.mode,
            kept.len(),
            total,
            self.max_detections
        );

        kept.into_iter()
            .map(|candidate| Detection {
                class_id: candidate.class_id,
                confidence: candidate.score,
                bbox: unletterbox(&candidate.bbox, transform),
            })
            .collect()
    }

    /// The greedy pass alone, in tensor space, highest score first.
    pub fn retain(&self, mut candidates: Vec<RawDetectionCandidate>) -> Vec<RawDetectionCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        // Equal scores fall back to anchor order.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.anchor_index.cmp(&b.anchor_index))
        });

        let mut suppressed = vec![false; candidates.len()];
        let mut keep = Vec::new();

        for i in 0..candidates.len() {
            if suppressed[i] {
                continue;
            }
            keep.push(i);
            if keep.len() == self.max_detections {
                break;
            }

            for j in (i + 1)..candidates.len() {
                if suppressed[j] || !self.competes(&candidates[i], &candidates[j]) {
                    continue;
                }
                let overlap = iou(&candidates[i].bbox, &candidates[j].bbox);
                if overlap > self.iou_threshold {
                    suppressed[j] = true;
                    trace!(
                        "NMS: anchor {} suppressed by anchor {} (IoU={:.3})",
                        candidates[j].anchor_index, candidates[i].anchor_index, overlap
                    );
                }
            }
        }

        let mut slots: Vec<Option<RawDetectionCandidate>> =
            candidates.into_iter().map(Some).collect();
        keep.into_iter().filter_map(|i| slots[i].take()).collect()
    }

    fn competes(&self, a: &RawDetectionCandidate, b: &RawDetectionCandidate) -> bool {
        match self.mode {
            NmsMode::ClassAgnostic => true,
            NmsMode::PerClass => a.class_id == b.class_id,
        }
    }
}
