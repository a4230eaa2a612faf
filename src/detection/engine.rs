use ndarray::{ArrayD, ArrayView4};

use crate::config::{ChannelOrder, OutputLayout};
use crate::error::Result;

/// The neural network forward pass.
///
/// Implementations are long-lived handles owned by the caller and shared
/// read-only between invocations. The pipeline only ever calls `run` through
/// `&self` and never assumes state survives between calls.
pub trait InferenceEngine: Send + Sync {
    /// Run the model on a `[1, 3, S, S]` input and return its raw output.
    fn run(&self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>>;

    /// Output layout the loaded model declares, if it declares one.
    fn output_layout(&self) -> Option<OutputLayout> {
        None
    }

    /// Input channel order the loaded model expects, if it declares one.
    fn channel_order(&self) -> Option<ChannelOrder> {
        None
    }

    /// Human-readable name (used in log output).
    fn name(&self) -> &str;
}

#[cfg(feature = "rten")]
pub use self::rten_engine::RtenEngine;

#[cfg(feature = "rten")]
mod rten_engine {
    use ndarray::{ArrayD, ArrayView4, IxDyn};
    use rten::Model;
    use rten_tensor::prelude::*;
    use rten_tensor::{NdTensor, Tensor};
    use std::path::Path;
    use tracing::{debug, info};

    use super::InferenceEngine;
    use crate::config::{ChannelOrder, OutputLayout};
    use crate::error::{DetectError, Result};

    /// Inference engine backed by the `rten` runtime.
    pub struct RtenEngine {
        model: Model,
        name: String,
        layout: Option<OutputLayout>,
        channel_order: Option<ChannelOrder>,
    }

    impl RtenEngine {
        /// Load a model from disk. Load once and reuse for every image.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            if !path.exists() {
                return Err(DetectError::Inference(format!(
                    "model not found: {}",
                    path.display()
                )));
            }

            let model = Model::load_file(path).map_err(|e| {
                DetectError::Inference(format!("failed to load {}: {}", path.display(), e))
            })?;

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "model".to_string());

            info!("Loaded model {}", name);

            Ok(Self {
                model,
                name,
                layout: None,
                channel_order: None,
            })
        }

        /// Declare the output layout of the loaded model.
        pub fn with_output_layout(mut self, layout: OutputLayout) -> Self {
            self.layout = Some(layout);
            self
        }

        /// Declare the input channel order of the loaded model.
        pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
            self.channel_order = Some(order);
            self
        }
    }

    impl InferenceEngine for RtenEngine {
        fn run(&self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>> {
            let (n, c, h, w) = input.dim();
            let data: Vec<f32> = input.iter().copied().collect();
            let tensor = NdTensor::from_data([n, c, h, w], data);

            let output: Tensor<f32> = self
                .model
                .run_one(tensor.view().into(), None)
                .map_err(|e| DetectError::Inference(e.to_string()))?
                .try_into()
                .map_err(|e| DetectError::Inference(format!("unexpected output type: {:?}", e)))?;

            let shape = output.shape().to_vec();
            debug!("{} produced output of shape {:?}", self.name, shape);

            ArrayD::from_shape_vec(IxDyn(&shape), output.to_vec())
                .map_err(|e| DetectError::Inference(e.to_string()))
        }

        fn output_layout(&self) -> Option<OutputLayout> {
            self.layout
        }

        fn channel_order(&self) -> Option<ChannelOrder> {
            self.channel_order
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}
