//! End-to-end live-loop behavior: a detection on frame 1 only, with the
//! detector invoked every frame, must fade out at `initial * decay^k`.

use std::sync::atomic::AtomicBool;

use roadsight::{
    run_live, CollectSink, DetectionCache, Detections, DisplayMode, Mask, PipelineConfig,
    StubDetector, SyntheticSource,
};

fn mask_only(probability: f32) -> Detections {
    Detections {
        boxes: Vec::new(),
        mask: Some(Mask::filled(16, 16, probability).unwrap()),
    }
}

/// 10 synthetic frames, full mask detected on frame 1, nothing afterwards,
/// decay 0.9. Frame 5 renders at 255 * 0.9^4 (~167), still above the 128
/// render threshold; by frame 8 the mask has dropped below it.
#[test]
fn ten_frame_clip_fades_per_decay_schedule() {
    let mut script: Vec<anyhow::Result<Detections>> = vec![Ok(mask_only(1.0))];
    for _ in 1..10 {
        script.push(Ok(Detections::default()));
    }
    let mut detector = StubDetector::scripted(script);
    let mut source = SyntheticSource::clip(160, 120, 10);
    let mut sink = CollectSink::new();
    let cancel = AtomicBool::new(false);
    let cfg = PipelineConfig {
        frame_interval: 1,
        mask_decay: 0.9,
        overlay_alpha: 1.0,
        target_fps: 1000,
        ..PipelineConfig::default()
    };

    let stats = run_live(&mut source, &mut detector, &mut sink, &cfg, &cancel).unwrap();
    assert_eq!(stats.frames_rendered, 10);
    assert_eq!(stats.inference_calls, 10);

    // With alpha 1.0, above-threshold pixels are replaced by the tint.
    // Sample away from borders (contour strokes) and the HUD corner.
    let probe = |frame: &image::RgbImage| *frame.get_pixel(80, 90);
    let tint = roadsight::overlay::TINT_COLOR;

    // 255 * 0.9^(k) stays above 128 through frame 7 (k = 6), drops below at
    // frame 8 (k = 7: 255 * 0.9^7 ~ 122).
    for (i, frame) in sink.frames.iter().enumerate() {
        let expected_intensity = 255.0 * 0.9f32.powi(i as i32);
        let tinted = probe(frame) == tint;
        assert_eq!(
            tinted,
            expected_intensity > 128.0,
            "frame {} intensity {:.1}",
            i + 1,
            expected_intensity
        );
    }
}

/// The cache itself follows the decay law exactly; frame 5 of the scenario
/// above corresponds to four ticks after the update.
#[test]
fn cache_intensity_after_four_ticks_matches_decay_law() {
    let mut cache = DetectionCache::new(0.9);
    cache.update(&mask_only(1.0), 32, 32);
    for _ in 0..4 {
        cache.tick();
    }
    let intensity = cache.current().unwrap().intensity(16, 16);
    assert!((intensity - 255.0 * 0.9f32.powi(4)).abs() < 1e-2);
    assert!((intensity - 167.0).abs() < 1.0);
}

/// A stale mask keeps decaying when later detector runs return no mask.
#[test]
fn interval_detection_keeps_decaying_between_runs() {
    let mut script: Vec<anyhow::Result<Detections>> = vec![Ok(mask_only(1.0))];
    script.push(Ok(Detections::default()));
    let mut detector = StubDetector::scripted(script);
    let mut source = SyntheticSource::clip(160, 120, 6);
    let mut sink = CollectSink::new();
    let cancel = AtomicBool::new(false);
    let cfg = PipelineConfig {
        frame_interval: 3,
        mask_decay: 0.94,
        overlay_alpha: 1.0,
        target_fps: 1000,
        display_mode: DisplayMode::Draw,
        ..PipelineConfig::default()
    };

    let stats = run_live(&mut source, &mut detector, &mut sink, &cfg, &cancel).unwrap();
    // Detector ran on frames 3 and 6 only.
    assert_eq!(stats.inference_calls, 2);

    let tint = roadsight::overlay::TINT_COLOR;
    // Frames 1-2 precede any detection.
    assert_ne!(*sink.frames[0].get_pixel(80, 90), tint);
    assert_ne!(*sink.frames[1].get_pixel(80, 90), tint);
    // Frame 3 renders the fresh mask at full intensity; frames 4-6 decay but
    // stay above threshold (255 * 0.94^3 ~ 212).
    for frame in &sink.frames[2..] {
        assert_eq!(*frame.get_pixel(80, 90), tint);
    }
}
