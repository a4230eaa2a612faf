#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use strokescan::{BoundingBox, RawDetectionCandidate};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Non-degenerate corner box inside a `size x size` canvas.
pub fn arb_bbox(size: f32) -> impl Strategy<Value = BoundingBox> {
    (0.0..size - 2.0, 0.0..size - 2.0, 1.0..size / 2.0, 1.0..size / 2.0).prop_map(
        move |(x1, y1, w, h): (f32, f32, f32, f32)| {
            BoundingBox::new(x1, y1, (x1 + w).min(size), (y1 + h).min(size))
        },
    )
}

/// Candidate list with anchor indices assigned in generation order.
pub fn arb_candidates(
    max_len: usize,
    num_classes: usize,
) -> impl Strategy<Value = Vec<RawDetectionCandidate>> {
    prop::collection::vec(
        (0..num_classes, 0.01f32..1.0, arb_bbox(640.0)),
        0..=max_len,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(anchor_index, (class_id, score, bbox))| RawDetectionCandidate {
                class_id,
                score,
                bbox,
                anchor_index,
            })
            .collect()
    })
}
