pub mod catalog;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;

pub use catalog::{ClassCatalog, ClassInfo};
pub use config::{ChannelOrder, DetectorConfig, NmsMode, OutputLayout};
pub use detection::Detector;
pub use detection::engine::InferenceEngine;
pub use detection::geometry::LetterboxTransform;
pub use error::DetectError;
pub use models::{BoundingBox, Detection, RawDetectionCandidate};
pub use pipeline::{Pipeline, PipelineOutput};

#[cfg(feature = "rten")]
pub use detection::engine::RtenEngine;
