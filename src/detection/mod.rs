pub mod decode;
pub mod engine;
pub mod geometry;
pub mod nms;
pub mod preprocessing;
pub mod render;

use image::RgbImage;
use ndarray::{Array4, ArrayViewD};

use crate::config::{ChannelOrder, DetectorConfig, OutputLayout};
use crate::error::Result;
use crate::models::Detection;
use self::decode::Decoder;
use self::geometry::LetterboxTransform;
use self::nms::Suppressor;

/// The model-independent stages around the forward pass: letterbox on the
/// way in, decode and suppression on the way out.
#[derive(Debug, Clone)]
pub struct Detector {
    pub target_size: u32,
    pub channel_order: ChannelOrder,
    pub decoder: Decoder,
    pub suppressor: Suppressor,
}

impl Detector {
    /// Build the stages for a model with `num_classes` outputs.
    ///
    /// Layout and channel order fall back to the engine's declaration, then
    /// to `FeaturesFirst` / `Rgb`.
    pub fn new(
        config: &DetectorConfig,
        num_classes: usize,
        engine_layout: Option<OutputLayout>,
        engine_order: Option<ChannelOrder>,
    ) -> Result<Self> {
        config.validate()?;

        let layout = config
            .output_layout
            .or(engine_layout)
            .unwrap_or(OutputLayout::FeaturesFirst);
        let channel_order = config
            .channel_order
            .or(engine_order)
            .unwrap_or(ChannelOrder::Rgb);

        Ok(Self {
            target_size: config.target_size,
            channel_order,
            decoder: Decoder::new(num_classes, layout, config.confidence_threshold),
            suppressor: Suppressor::new(
                config.iou_threshold,
                config.max_detections,
                config.nms_mode,
            ),
        })
    }

    pub fn preprocess(&self, img: &RgbImage) -> Result<(Array4<f32>, LetterboxTransform)> {
        preprocessing::preprocess(img, self.target_size, self.channel_order)
    }

    /// Decode, suppress and map back to the original image.
    pub fn postprocess(
        &self,
        raw: ArrayViewD<'_, f32>,
        transform: &LetterboxTransform,
    ) -> Result<Vec<Detection>> {
        let candidates = self.decoder.decode(raw, transform)?;
        Ok(self.suppressor.suppress(candidates, transform))
    }
}
