mod common;

use common::*;
use std::sync::Arc;

#[test]
fn hd_frame_detection_maps_back_to_original_space() -> anyhow::Result<()> {
    let engine = Arc::new(ScriptedEngine::new(raw_output(
        3,
        &[anchor(320.0, 320.0, 100.0, 100.0, 1, 0.92)],
    )));
    let pipeline = Pipeline::new(engine.clone(), ct_catalog(), &DetectorConfig::default())?;

    let img = gradient_image(1920, 1080);
    let output = pipeline.run(&img)?;

    assert_eq!(output.transform.pad_x, 0);
    assert_eq!(output.transform.pad_y, 140);
    assert_eq!(output.detections.len(), 1);

    let d = &output.detections[0];
    assert_eq!(d.class_id, 1);
    assert!((d.bbox.x1 - 810.0).abs() < 1.0);
    assert!((d.bbox.y1 - 390.0).abs() < 1.0);
    assert!((d.bbox.x2 - 1110.0).abs() < 1.0);
    assert!((d.bbox.y2 - 690.0).abs() < 1.0);

    assert_eq!(output.annotated.dimensions(), (1920, 1080));
    assert_ne!(output.annotated, img);

    let shapes = engine.seen_shapes.lock().unwrap();
    assert_eq!(shapes.as_slice(), &[vec![1, 3, 640, 640]]);
    Ok(())
}

#[test]
fn overlapping_classes_are_suppressed_jointly_by_default() -> anyhow::Result<()> {
    // Corner boxes (10,10,110,110) and (15,15,115,115) expressed center-size.
    let anchors = [
        anchor(60.0, 60.0, 100.0, 100.0, 0, 0.9),
        anchor(65.0, 65.0, 100.0, 100.0, 1, 0.8),
    ];
    let engine = Arc::new(ScriptedEngine::new(raw_output(3, &anchors)));

    let pipeline = Pipeline::new(engine.clone(), ct_catalog(), &DetectorConfig::default())?;
    let output = pipeline.run(&gradient_image(640, 640))?;
    assert_eq!(output.detections.len(), 1);
    assert_eq!(output.detections[0].class_id, 0);
    assert!((output.detections[0].confidence - 0.9).abs() < 1e-6);

    let per_class = DetectorConfig::new().with_nms_mode(NmsMode::PerClass);
    let pipeline = Pipeline::new(engine, ct_catalog(), &per_class)?;
    let output = pipeline.run(&gradient_image(640, 640))?;
    let classes: Vec<usize> = output.detections.iter().map(|d| d.class_id).collect();
    assert_eq!(classes, vec![0, 1]);
    Ok(())
}

#[test]
fn nothing_above_threshold_returns_original_image() -> anyhow::Result<()> {
    let anchors = [
        anchor(100.0, 100.0, 50.0, 50.0, 0, 0.59),
        anchor(300.0, 300.0, 80.0, 40.0, 2, 0.6),
    ];
    let engine = Arc::new(ScriptedEngine::new(raw_output(3, &anchors)));
    let pipeline = Pipeline::new(engine, ct_catalog(), &DetectorConfig::default())?;

    let img = gradient_image(800, 600);
    let output = pipeline.run(&img)?;
    assert!(output.detections.is_empty());
    assert_eq!(output.annotated, img);
    Ok(())
}

#[test]
fn anchors_first_output_uses_declared_layout() -> anyhow::Result<()> {
    let anchors = [anchor(320.0, 320.0, 64.0, 64.0, 2, 0.85)];
    let engine = ScriptedEngine::new(raw_output_anchors_first(3, &anchors))
        .with_layout(OutputLayout::AnchorsFirst);
    let pipeline = Pipeline::new(Arc::new(engine), ct_catalog(), &DetectorConfig::default())?;

    let output = pipeline.run(&gradient_image(640, 640))?;
    assert_eq!(output.detections.len(), 1);
    assert_eq!(output.detections[0].class_id, 2);
    Ok(())
}

#[test]
fn layout_disagreement_is_a_shape_mismatch() -> anyhow::Result<()> {
    // Engine emits anchors-first but nobody says so.
    let anchors = [anchor(320.0, 320.0, 64.0, 64.0, 2, 0.85); 10];
    let engine = ScriptedEngine::new(raw_output_anchors_first(3, &anchors));
    let pipeline = Pipeline::new(Arc::new(engine), ct_catalog(), &DetectorConfig::default())?;

    match pipeline.run(&gradient_image(640, 480)) {
        Err(DetectError::ShapeMismatch { actual, .. }) => assert_eq!(actual, vec![1, 10, 7]),
        other => panic!("expected ShapeMismatch, got {:?}", other.map(|o| o.detections)),
    }
    Ok(())
}

#[test]
fn max_detections_truncates_by_score() -> anyhow::Result<()> {
    let anchors: Vec<Anchor> = (0..8)
        .map(|i| anchor(40.0 + i as f32 * 70.0, 100.0, 40.0, 40.0, 0, 0.7 + i as f32 * 0.03))
        .collect();
    let engine = Arc::new(ScriptedEngine::new(raw_output(3, &anchors)));
    let config = DetectorConfig::new().with_max_detections(3);
    let pipeline = Pipeline::new(engine, ct_catalog(), &config)?;

    let output = pipeline.run(&gradient_image(640, 640))?;
    let scores: Vec<f32> = output.detections.iter().map(|d| d.confidence).collect();
    assert_eq!(scores.len(), 3);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!((scores[0] - (0.7 + 7.0 * 0.03)).abs() < 1e-5);
    Ok(())
}

#[test]
fn batch_failures_are_isolated() -> anyhow::Result<()> {
    let engine = Arc::new(ScriptedEngine::new(raw_output(
        3,
        &[anchor(320.0, 320.0, 100.0, 100.0, 0, 0.95)],
    )));
    let pipeline = Pipeline::new(engine.clone(), ct_catalog(), &DetectorConfig::default())?;

    let images = vec![
        gradient_image(320, 240),
        image::RgbImage::new(0, 0),
        gradient_image(100, 400),
    ];
    let results = pipeline.run_batch(&images);

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(DetectError::Decode { width: 0, height: 0 })));
    assert!(results[2].is_ok());

    // The zero-sized image never reached the engine.
    assert_eq!(engine.seen_shapes.lock().unwrap().len(), 2);
    Ok(())
}

#[test]
fn engine_failure_surfaces_as_inference_error() -> anyhow::Result<()> {
    let pipeline = Pipeline::new(Arc::new(FailingEngine), ct_catalog(), &DetectorConfig::default())?;
    assert!(matches!(
        pipeline.run(&gradient_image(64, 64)),
        Err(DetectError::Inference(_))
    ));
    Ok(())
}

#[test]
fn debug_mode_dumps_each_stage() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug_dir = dir.path().join("debug");

    let engine = Arc::new(ScriptedEngine::new(raw_output(
        3,
        &[anchor(320.0, 320.0, 100.0, 100.0, 0, 0.95)],
    )));
    let pipeline = Pipeline::new(engine, ct_catalog(), &DetectorConfig::default())?
        .with_debug(debug_dir.clone())?;

    pipeline.run_labeled("scan.png", &gradient_image(200, 100))?;

    for stage in ["00_input.png", "01_letterbox.png", "02_annotated.png"] {
        assert!(debug_dir.join("scan.png").join(stage).exists(), "missing {}", stage);
    }

    let letterbox = image::open(debug_dir.join("scan.png").join("01_letterbox.png"))?;
    assert_eq!((letterbox.width(), letterbox.height()), (640, 640));
    Ok(())
}

#[test]
fn debug_dir_must_be_empty() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("leftover.txt"), "x")?;

    let engine = Arc::new(FailingEngine);
    let pipeline = Pipeline::new(engine, ct_catalog(), &DetectorConfig::default())?;
    assert!(pipeline.with_debug(dir.path().to_path_buf()).is_err());
    Ok(())
}

#[test]
fn detector_stages_compose_without_engine() -> anyhow::Result<()> {
    let detector = strokescan::Detector::new(&DetectorConfig::default(), 3, None, None)?;
    let (tensor, transform) = detector.preprocess(&gradient_image(1280, 720))?;
    assert_eq!(tensor.shape(), &[1, 3, 640, 640]);

    let raw = raw_output(3, &[anchor(320.0, 320.0, 64.0, 64.0, 2, 0.99)]);
    let detections = detector.postprocess(raw.view(), &transform)?;
    assert_eq!(detections.len(), 1);
    let b = detections[0].bbox;
    assert!(b.x1 <= b.x2 && b.y1 <= b.y2);
    assert!(b.x2 <= 1280.0 && b.y2 <= 720.0);
    Ok(())
}

#[test]
fn malformed_anchor_boxes_keep_detection_corners_ordered() -> anyhow::Result<()> {
    let anchors = [
        anchor(320.0, 320.0, -100.0, -60.0, 0, 0.9),
        anchor(f32::NAN, 100.0, 40.0, 40.0, 1, 0.95),
        anchor(100.0, 100.0, 40.0, f32::NAN, 2, 0.85),
    ];
    let engine = Arc::new(ScriptedEngine::new(raw_output(3, &anchors)));
    let pipeline = Pipeline::new(engine, ct_catalog(), &DetectorConfig::default())?;

    let output = pipeline.run(&gradient_image(640, 640))?;
    assert_eq!(output.detections.len(), 1);

    let b = output.detections[0].bbox;
    assert!(b.x1 <= b.x2 && b.y1 <= b.y2, "inverted box {:?}", b);
    assert!([b.x1, b.y1, b.x2, b.y2].iter().all(|v| v.is_finite()));
    assert!((b.x1 - 270.0).abs() < 1e-3 && (b.y2 - 350.0).abs() < 1e-3);
    Ok(())
}

#[test]
fn outline_thickness_is_configurable() -> anyhow::Result<()> {
    let engine = Arc::new(ScriptedEngine::new(raw_output(
        3,
        &[anchor(320.0, 320.0, 100.0, 100.0, 0, 0.95)],
    )));
    let img = gradient_image(640, 640);

    let thin = Pipeline::new(engine.clone(), ct_catalog(), &DetectorConfig::default())?;
    let thick = Pipeline::new(engine, ct_catalog(), &DetectorConfig::default())?.with_thickness(4);

    // Box spans (270,270)-(370,370); the fourth ring sits at 367.
    let red = image::Rgb([255, 0, 0]);
    assert_ne!(*thin.run(&img)?.annotated.get_pixel(367, 367), red);
    assert_eq!(*thick.run(&img)?.annotated.get_pixel(367, 367), red);
    Ok(())
}
