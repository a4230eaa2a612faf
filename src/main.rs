use anyhow::Context;
use clap::{Parser, ValueEnum};
use image::ImageReader;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use strokescan::catalog::BUNDLED_CATALOG_JSON;
use strokescan::detection::render::{load_font, load_system_font};
use strokescan::{
    ChannelOrder, ClassCatalog, Detection, DetectorConfig, NmsMode, OutputLayout, Pipeline,
    RtenEngine,
};

/// Upper bound on images per run, sized for small machines.
const MAX_FILES_PER_RUN: usize = 5;
const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    FeaturesFirst,
    AnchorsFirst,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelArg {
    Rgb,
    Bgr,
}

#[derive(Parser)]
#[command(name = "strokescan")]
#[command(about = "Detect and annotate findings in CT slice images")]
struct Cli {
    /// Input image files
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// Path to the detection model
    #[arg(short, long, value_name = "FILE")]
    model: PathBuf,

    /// Class catalog (JSON array of {name, color}); defaults to the bundled CT classes
    #[arg(long, value_name = "FILE")]
    classes: Option<PathBuf>,

    /// Detector config (JSON); flags below override its fields
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for annotated images
    #[arg(short, long, value_name = "DIR", default_value = "results")]
    out_dir: PathBuf,

    /// Minimum class score (exclusive)
    #[arg(long)]
    confidence: Option<f32>,

    /// IoU above which overlapping boxes are suppressed
    #[arg(long)]
    iou: Option<f32>,

    /// Maximum detections kept per image
    #[arg(long)]
    max_detections: Option<usize>,

    /// Only suppress overlaps within the same class
    #[arg(long)]
    per_class_nms: bool,

    /// Layout of the model's raw output
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,

    /// Channel order the model expects
    #[arg(long, value_enum)]
    channels: Option<ChannelArg>,

    /// Box outline width in pixels
    #[arg(long, default_value_t = 2)]
    thickness: u32,

    /// TTF/OTF font for labels (defaults to a system font)
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// Save intermediate images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct ImageReport {
    filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    detections_count: usize,
    detections: Vec<Detection>,
    processing_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    if args.images.len() > MAX_FILES_PER_RUN {
        anyhow::bail!(
            "At most {} images per run, got {}",
            MAX_FILES_PER_RUN,
            args.images.len()
        );
    }

    let config = build_config(&args)?;

    let catalog = match &args.classes {
        Some(path) => ClassCatalog::from_path(path)
            .with_context(|| format!("Failed to load class catalog {}", path.display()))?,
        None => ClassCatalog::from_json_str(BUNDLED_CATALOG_JSON)?,
    };

    let engine = RtenEngine::load(&args.model)?;

    let font = match &args.font {
        Some(path) => Some(load_font(path)?),
        None => load_system_font(),
    };

    let mut pipeline = Pipeline::new(Arc::new(engine), Arc::new(catalog), &config)?
        .with_font(font)
        .with_thickness(args.thickness);
    if let Some(debug_dir) = args.debug_out.clone() {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let run_start = Instant::now();
    let mut reports = Vec::with_capacity(args.images.len());

    // Sequential on purpose: one image in memory at a time.
    for path in &args.images {
        let img_start = Instant::now();
        let filename = file_name(path);

        let report = match process_file(&pipeline, path, &filename, &args.out_dir) {
            Ok((output, detections)) => ImageReport {
                filename,
                output: Some(output),
                detections_count: detections.len(),
                detections,
                processing_ms: img_start.elapsed().as_secs_f64() * 1000.0,
                error: None,
            },
            Err(e) => {
                error!("[{}] {:#}", filename, e);
                ImageReport {
                    filename,
                    output: None,
                    detections_count: 0,
                    detections: Vec::new(),
                    processing_ms: img_start.elapsed().as_secs_f64() * 1000.0,
                    error: Some(format!("{:#}", e)),
                }
            }
        };

        info!(
            "[{}] {} detections | {:.3}s",
            report.filename,
            report.detections_count,
            report.processing_ms / 1000.0
        );
        reports.push(report);
    }

    info!(
        "Processed {} image(s) in {:.2}s",
        reports.len(),
        run_start.elapsed().as_secs_f64()
    );

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &Cli) -> anyhow::Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_path(path)?,
        None => DetectorConfig::default(),
    };

    if let Some(confidence) = args.confidence {
        config = config.with_confidence_threshold(confidence);
    }
    if let Some(iou) = args.iou {
        config = config.with_iou_threshold(iou);
    }
    if let Some(max) = args.max_detections {
        config = config.with_max_detections(max);
    }
    if args.per_class_nms {
        config = config.with_nms_mode(NmsMode::PerClass);
    }
    if let Some(layout) = args.layout {
        config = config.with_output_layout(match layout {
            LayoutArg::FeaturesFirst => OutputLayout::FeaturesFirst,
            LayoutArg::AnchorsFirst => OutputLayout::AnchorsFirst,
        });
    }
    if let Some(channels) = args.channels {
        config = config.with_channel_order(match channels {
            ChannelArg::Rgb => ChannelOrder::Rgb,
            ChannelArg::Bgr => ChannelOrder::Bgr,
        });
    }

    config.validate()?;
    Ok(config)
}

fn process_file(
    pipeline: &Pipeline,
    path: &Path,
    filename: &str,
    out_dir: &Path,
) -> anyhow::Result<(PathBuf, Vec<Detection>)> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Cannot read {}", path.display()))?
        .len();
    if size > MAX_FILE_SIZE {
        anyhow::bail!(
            "File too large ({:.1}MB), maximum is {}MB",
            size as f64 / 1024.0 / 1024.0,
            MAX_FILE_SIZE / 1024 / 1024
        );
    }

    // Alpha is dropped here; the pipeline only sees RGB.
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?
        .to_rgb8();

    let result = pipeline.run_labeled(filename, &img)?;
    drop(img);

    let output_path = out_dir.join(format!("pred_{}", filename));
    result
        .annotated
        .save(&output_path)
        .with_context(|| format!("Failed to save {}", output_path.display()))?;

    Ok((output_path, result.detections))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
