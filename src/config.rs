use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DetectError, Result};

/// Memory layout of the raw output tensor after dropping the batch axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputLayout {
    /// `[num_classes + 4, num_anchors]`
    FeaturesFirst,
    /// `[num_anchors, num_classes + 4]`
    AnchorsFirst,
}

/// Channel order the model expects in its input planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// How overlap suppression groups candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NmsMode {
    /// Suppress across all classes jointly.
    #[default]
    ClassAgnostic,
    /// Only same-class candidates suppress each other.
    PerClass,
}

/// Tunables for one detector instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub target_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub nms_mode: NmsMode,
    /// Overrides whatever the engine declares.
    pub output_layout: Option<OutputLayout>,
    /// Overrides whatever the engine declares.
    pub channel_order: Option<ChannelOrder>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            target_size: 640,
            confidence_threshold: 0.6,
            iou_threshold: 0.5,
            max_detections: 50,
            nms_mode: NmsMode::ClassAgnostic,
            output_layout: None,
            channel_order: None,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a (possibly partial) config from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            DetectError::InvalidConfig(format!("{}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_target_size(mut self, target_size: u32) -> Self {
        self.target_size = target_size;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    pub fn with_max_detections(mut self, max_detections: usize) -> Self {
        self.max_detections = max_detections;
        self
    }

    pub fn with_nms_mode(mut self, mode: NmsMode) -> Self {
        self.nms_mode = mode;
        self
    }

    pub fn with_output_layout(mut self, layout: OutputLayout) -> Self {
        self.output_layout = Some(layout);
        self
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = Some(order);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(DetectError::InvalidConfig(
                "target_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DetectError::InvalidConfig(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DetectError::InvalidConfig(format!(
                "iou_threshold must be in [0, 1], got {}",
                self.iou_threshold
            )));
        }
        if self.max_detections == 0 {
            return Err(DetectError::InvalidConfig(
                "max_detections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
