#![allow(dead_code)]

use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::{Array2, ArrayD, ArrayView4, Axis};
use std::sync::{Arc, Mutex};
use strokescan::catalog::BUNDLED_CATALOG_JSON;
use strokescan::error::Result;
use strokescan::{ClassCatalog, DetectError, InferenceEngine, OutputLayout};

/// One anchor of a synthetic model output: center-size box plus the class
/// that should win with `score`.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub class_id: usize,
    pub score: f32,
}

pub fn anchor(cx: f32, cy: f32, w: f32, h: f32, class_id: usize, score: f32) -> Anchor {
    Anchor {
        cx,
        cy,
        w,
        h,
        class_id,
        score,
    }
}

/// Build a `[1, C+4, N]` output as a features-first model would emit it.
pub fn raw_output(num_classes: usize, anchors: &[Anchor]) -> ArrayD<f32> {
    let mut raw = Array2::<f32>::zeros((num_classes + 4, anchors.len()));
    for (i, a) in anchors.iter().enumerate() {
        raw[[0, i]] = a.cx;
        raw[[1, i]] = a.cy;
        raw[[2, i]] = a.w;
        raw[[3, i]] = a.h;
        raw[[4 + a.class_id, i]] = a.score;
    }
    raw.insert_axis(Axis(0)).into_dyn()
}

/// Same data as `raw_output`, laid out `[1, N, C+4]`.
pub fn raw_output_anchors_first(num_classes: usize, anchors: &[Anchor]) -> ArrayD<f32> {
    let features_first = raw_output(num_classes, anchors);
    let mut view = features_first.view();
    view.swap_axes(1, 2);
    view.as_standard_layout().into_owned()
}

/// Engine that replays a fixed raw output and records the input shapes it saw.
pub struct ScriptedEngine {
    output: ArrayD<f32>,
    layout: Option<OutputLayout>,
    pub seen_shapes: Mutex<Vec<Vec<usize>>>,
}

impl ScriptedEngine {
    pub fn new(output: ArrayD<f32>) -> Self {
        Self {
            output,
            layout: None,
            seen_shapes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = Some(layout);
        self
    }
}

impl InferenceEngine for ScriptedEngine {
    fn run(&self, input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>> {
        self.seen_shapes.lock().unwrap().push(input.shape().to_vec());
        Ok(self.output.clone())
    }

    fn output_layout(&self) -> Option<OutputLayout> {
        self.layout
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Engine that always fails.
pub struct FailingEngine;

impl InferenceEngine for FailingEngine {
    fn run(&self, _input: ArrayView4<'_, f32>) -> Result<ArrayD<f32>> {
        Err(DetectError::Inference("device lost".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

pub fn ct_catalog() -> Arc<ClassCatalog> {
    Arc::new(ClassCatalog::from_json_str(BUNDLED_CATALOG_JSON).expect("bundled catalog"))
}

/// Creates a gradient test image of the given size.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128u8,
        ])
    })
}
