use ab_glyph::FontVec;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::ClassCatalog;
use crate::config::DetectorConfig;
use crate::detection::Detector;
use crate::detection::engine::InferenceEngine;
use crate::detection::geometry::LetterboxTransform;
use crate::detection::preprocessing;
use crate::detection::render::Renderer;
use crate::error::{DetectError, Result};
use crate::models::Detection;

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
struct DebugConfig {
    /// Root directory for debug outputs
    output_dir: PathBuf,
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub detections: Vec<Detection>,
    /// The input with boxes and labels drawn; identical to the input when
    /// `detections` is empty.
    pub annotated: RgbImage,
    pub transform: LetterboxTransform,
}

/// Preprocess -> inference -> decode -> suppress -> render, one image at a
/// time.
pub struct Pipeline {
    engine: Arc<dyn InferenceEngine>,
    detector: Detector,
    renderer: Renderer,
    debug: Option<DebugConfig>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("engine", &self.engine.name())
            .field("detector", &self.detector)
            .field("renderer", &self.renderer)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Pipeline {
    /// Create a pipeline around an already-loaded engine.
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        catalog: Arc<ClassCatalog>,
        config: &DetectorConfig,
    ) -> Result<Self> {
        let detector = Detector::new(
            config,
            catalog.len(),
            engine.output_layout(),
            engine.channel_order(),
        )?;
        let renderer = Renderer::new(catalog.clone());

        debug!(
            "Pipeline ready: engine={}, classes={}, layout={:?}, channels={:?}",
            engine.name(),
            catalog.len(),
            detector.decoder.layout,
            detector.channel_order
        );

        Ok(Self {
            engine,
            detector,
            renderer,
            debug: None,
        })
    }

    pub fn with_font(mut self, font: Option<FontVec>) -> Self {
        self.renderer = self.renderer.with_font(font);
        self
    }

    /// Outline width in pixels; at least 1.
    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.renderer = self.renderer.with_thickness(thickness);
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(DetectError::InvalidConfig(format!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });

        Ok(self)
    }

    /// Run the pipeline on a single image.
    pub fn run(&self, img: &RgbImage) -> Result<PipelineOutput> {
        self.run_labeled("image", img)
    }

    /// Run the pipeline on a single image; `label` names its debug folder.
    pub fn run_labeled(&self, label: &str, img: &RgbImage) -> Result<PipelineOutput> {
        let start = Instant::now();
        let (canvas, transform) = preprocessing::letterbox_image(img, self.detector.target_size)?;
        self.save_debug(label, "00_input", img)?;
        self.save_debug(label, "01_letterbox", &canvas)?;

        let tensor = preprocessing::canvas_to_tensor(&canvas, self.detector.channel_order);
        drop(canvas);

        let inference_start = Instant::now();
        let raw = self.engine.run(tensor.view())?;
        drop(tensor);
        debug!(
            "Inference on {} took {:.2}ms, output shape {:?}",
            self.engine.name(),
            inference_start.elapsed().as_secs_f64() * 1000.0,
            raw.shape()
        );

        let detections = self.detector.postprocess(raw.view(), &transform)?;
        drop(raw);

        let annotated = self.renderer.render(img, &detections);
        self.save_debug(label, "02_annotated", &annotated)?;

        info!(
            "[{}] {} detections in {:.3}s",
            label,
            detections.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(PipelineOutput {
            detections,
            annotated,
            transform,
        })
    }

    /// Run every image strictly in sequence. A failure only affects its own
    /// slot in the returned list.
    pub fn run_batch(&self, images: &[RgbImage]) -> Vec<Result<PipelineOutput>> {
        images
            .iter()
            .enumerate()
            .map(|(idx, img)| {
                let label = format!("{:02}", idx + 1);
                let result = self.run_labeled(&label, img);
                if let Err(e) = &result {
                    warn!("[{}] skipped: {}", label, e);
                }
                result
            })
            .collect()
    }

    fn save_debug(&self, label: &str, stage: &str, img: &RgbImage) -> Result<()> {
        if let Some(debug_config) = &self.debug {
            let dir = debug_config.output_dir.join(sanitize_label(label));
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(format!("{}.png", stage));
            img.save(&path)?;
            debug!("Debug: saved {}", display_relative(&path, &debug_config.output_dir));
        }

        Ok(())
    }
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_")
    } else {
        cleaned
    }
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
