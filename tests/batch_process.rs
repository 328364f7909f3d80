//! Batch processing against real files on disk.

use image::{Rgb, RgbImage};
use roadsight::{process_media, Detections, DisplayMode, Mask, PipelineConfig, StubDetector};

fn write_input_png(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("road.png");
    RgbImage::from_pixel(64, 48, Rgb([40, 80, 120]))
        .save(&path)
        .unwrap();
    path
}

#[test]
fn unsupported_output_extension_is_rewritten_to_jpg() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input_png(dir.path());
    let requested = dir.path().join("out.bmp");

    let mut detector = StubDetector::new();
    let cfg = PipelineConfig::default();
    let written = process_media(&input, &requested, &mut detector, &cfg).unwrap();

    assert_eq!(written, dir.path().join("out.jpg"));
    assert!(written.exists());
    assert!(!requested.exists());
}

#[test]
fn none_mode_writes_input_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input_png(dir.path());
    let output = dir.path().join("out.png");

    let mut detector = StubDetector::new();
    let cfg = PipelineConfig {
        display_mode: DisplayMode::None,
        ..PipelineConfig::default()
    };
    let written = process_media(&input, &output, &mut detector, &cfg).unwrap();

    // PNG round-trip is lossless, so pass-through means identical pixels.
    let out = image::open(&written).unwrap().to_rgb8();
    let original = image::open(&input).unwrap().to_rgb8();
    assert_eq!(out, original);
}

#[test]
fn highlight_mode_tints_masked_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input_png(dir.path());
    let output = dir.path().join("out.png");

    let mut detector = StubDetector::scripted(vec![Ok(Detections {
        boxes: Vec::new(),
        mask: Some(Mask::filled(16, 16, 1.0).unwrap()),
    })]);
    let cfg = PipelineConfig {
        display_mode: DisplayMode::Highlight,
        ..PipelineConfig::default()
    };
    let written = process_media(&input, &output, &mut detector, &cfg).unwrap();

    let out = image::open(&written).unwrap().to_rgb8();
    // Highlight fill: alpha 0.3 toward blue tint (0, 0, 255) over (40, 80, 120),
    // so (28, 56, ~160) modulo rounding.
    let px = out.get_pixel(32, 24);
    assert_eq!(px.0[0], 28);
    assert_eq!(px.0[1], 56);
    assert!((px.0[2] as i32 - 160).abs() <= 1);
}

#[test]
fn missing_input_is_fatal_with_cause() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.png");
    let output = dir.path().join("out.png");

    let mut detector = StubDetector::new();
    let cfg = PipelineConfig::default();
    let err = process_media(&missing, &output, &mut detector, &cfg).unwrap_err();
    assert!(format!("{:#}", err).contains("nope.png"));
}
