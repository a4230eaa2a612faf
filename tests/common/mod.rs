mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from strokescan for tests
pub use strokescan::{
    BoundingBox, ClassCatalog, Detection, DetectError, DetectorConfig, InferenceEngine, NmsMode,
    OutputLayout, Pipeline, RawDetectionCandidate,
};
