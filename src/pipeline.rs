//! Pipeline drivers.
//!
//! Two entry points share the same components:
//!
//! - `run_live`: single-threaded capture-process-render loop with the
//!   detection cache, mask decay, pacing and a polled cancellation flag;
//! - `process_media`: batch image/video processing, detector on every frame,
//!   no caching or pacing.
//!
//! All per-iteration mutable state lives in `DetectionLoopState`; nothing is
//! shared across threads.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::cache::{CachedMask, DetectionCache};
use crate::config::PipelineConfig;
use crate::detect::Detector;
use crate::ingest::{FileSource, FrameSource};
use crate::output::{sink_for_output, FrameSink};
use crate::overlay::{OverlayRenderer, Telemetry};
use crate::pacing::{FpsCounter, PacingController};

const HEALTH_LOG_INTERVAL: u64 = 300;

/// Mutable state threaded through live-loop iterations.
pub struct DetectionLoopState {
    pub frame_count: u64,
    pub cache: DetectionCache,
    pub fps: FpsCounter,
}

impl DetectionLoopState {
    pub fn new(mask_decay: f32) -> Self {
        Self {
            frame_count: 0,
            cache: DetectionCache::new(mask_decay),
            fps: FpsCounter::new(),
        }
    }
}

/// Counters reported when a live run ends.
#[derive(Clone, Copy, Debug, Default)]
pub struct LiveStats {
    pub frames_rendered: u64,
    pub frames_skipped: u64,
    pub inference_calls: u64,
}

/// Run the live capture-process-render loop until the source ends or the
/// cancellation flag is raised.
///
/// The detector runs every `frame_interval` frames; between runs the cached
/// mask decays one step per rendered frame, so a mask refreshed at frame `n`
/// renders at `initial * decay^k` on frame `n + k`. Frame-read failures skip
/// the iteration; detector failures clear the cached mask and the loop
/// continues.
pub fn run_live(
    source: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    sink: &mut dyn FrameSink,
    cfg: &PipelineConfig,
    cancel: &AtomicBool,
) -> Result<LiveStats> {
    let renderer = OverlayRenderer::live(cfg.overlay_alpha);
    let pacer = PacingController::new(cfg.target_fps);
    let mut state = DetectionLoopState::new(cfg.mask_decay);
    let mut stats = LiveStats::default();

    log::info!(
        "live loop: detector={} interval={} conf={:.2} target_fps={}",
        detector.name(),
        cfg.frame_interval,
        cfg.confidence,
        cfg.target_fps
    );

    while !cancel.load(Ordering::Relaxed) {
        let iteration_start = Instant::now();

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                log::warn!("frame read failed, skipping iteration: {}", e);
                stats.frames_skipped += 1;
                continue;
            }
        };
        if frame.width() == 0 || frame.height() == 0 {
            stats.frames_skipped += 1;
            continue;
        }

        state.frame_count += 1;

        let mut fresh_mask = false;
        if state.frame_count % cfg.frame_interval as u64 == 0 {
            stats.inference_calls += 1;
            match detector.infer(&frame, cfg.confidence, cfg.input_size) {
                Ok(detections) => {
                    if detections.mask.is_some() {
                        log::info!("road boundary detected");
                    }
                    fresh_mask =
                        state
                            .cache
                            .update(&detections, frame.width(), frame.height());
                }
                Err(e) => {
                    log::warn!("mask processing error: {}", e);
                    state.cache.clear_mask();
                }
            }
        }
        if !fresh_mask {
            state.cache.tick();
        }

        let telemetry = Telemetry {
            fps: state.fps.tick(Instant::now()),
            staleness: state.cache.staleness(),
        };
        if state.frame_count % HEALTH_LOG_INTERVAL == 0 {
            log::info!(
                "health: frame={} fps={:.1} source_healthy={}",
                state.frame_count,
                telemetry.fps,
                source.is_healthy()
            );
        }
        let rendered = renderer.render(
            &frame,
            state.cache.current(),
            state.cache.boxes(),
            Some(&telemetry),
        );
        sink.write_frame(&rendered)?;
        stats.frames_rendered += 1;

        pacer.pace(iteration_start);
    }

    sink.finish()?;
    log::info!(
        "live loop finished: rendered={} skipped={} inferences={}",
        stats.frames_rendered,
        stats.frames_skipped,
        stats.inference_calls
    );
    Ok(stats)
}

/// Process a media file and write the overlaid result.
///
/// Videos run the detector on every frame; still images run it once. The
/// returned path is what was actually written (image extensions are
/// normalized to `.jpg`/`.jpeg`/`.png` beforehand).
pub fn process_media(
    input: &Path,
    output: &Path,
    detector: &mut dyn Detector,
    cfg: &PipelineConfig,
) -> Result<PathBuf> {
    let mut source =
        FileSource::open(input).with_context(|| format!("opening input {}", input.display()))?;

    let first = source
        .next_frame()?
        .with_context(|| format!("input {} contains no frames", input.display()))?;
    let (width, height) = first.dimensions();

    // Image outputs normalize their own extension inside the sink.
    let mut sink = sink_for_output(output, width, height, source.frame_rate())?;

    let frames = process_frames(first, &mut source, sink.as_mut(), detector, cfg)?;
    sink.finish()?;

    let written = sink
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output.to_path_buf());
    log::info!(
        "processed {} ({} frames) -> {}",
        input.display(),
        frames,
        written.display()
    );
    Ok(written)
}

fn process_frames(
    first: RgbImage,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    detector: &mut dyn Detector,
    cfg: &PipelineConfig,
) -> Result<u64> {
    let renderer = OverlayRenderer::for_mode(cfg.display_mode);
    let mut frames = 0u64;
    let mut frame = Some(first);

    while let Some(current) = frame {
        let rendered = match &renderer {
            Some(renderer) => match detector.infer(&current, cfg.confidence, cfg.input_size) {
                Ok(detections) => {
                    // No temporal cache in batch mode; every frame renders
                    // its own mask at full intensity.
                    let mask = detections
                        .mask
                        .as_ref()
                        .map(|m| CachedMask::from_mask(m, current.width(), current.height()));
                    renderer.render(&current, mask.as_ref(), &detections.boxes, None)
                }
                Err(e) => {
                    log::warn!("mask processing error, writing frame unchanged: {}", e);
                    current.clone()
                }
            },
            None => current.clone(),
        };
        sink.write_frame(&rendered)?;
        frames += 1;
        frame = source.next_frame()?;
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detections, StubDetector};
    use crate::ingest::SyntheticSource;
    use crate::mask::Mask;
    use crate::output::CollectSink;
    use crate::overlay::DisplayMode;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            frame_interval: 1,
            target_fps: 1000,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn live_loop_ends_with_source() {
        let mut source = SyntheticSource::clip(64, 48, 6);
        let mut detector = StubDetector::new();
        let mut sink = CollectSink::new();
        let cancel = AtomicBool::new(false);

        let stats =
            run_live(&mut source, &mut detector, &mut sink, &fast_config(), &cancel).unwrap();
        assert_eq!(stats.frames_rendered, 6);
        assert_eq!(stats.inference_calls, 6);
        assert_eq!(sink.frames.len(), 6);
    }

    #[test]
    fn cancellation_stops_immediately() {
        let mut source = SyntheticSource::new(64, 48);
        let mut detector = StubDetector::new();
        let mut sink = CollectSink::new();
        let cancel = AtomicBool::new(true);

        let stats =
            run_live(&mut source, &mut detector, &mut sink, &fast_config(), &cancel).unwrap();
        assert_eq!(stats.frames_rendered, 0);
    }

    #[test]
    fn frame_interval_bounds_inference_rate() {
        let mut source = SyntheticSource::clip(64, 48, 10);
        let mut detector = StubDetector::new();
        let mut sink = CollectSink::new();
        let cancel = AtomicBool::new(false);
        let cfg = PipelineConfig {
            frame_interval: 4,
            target_fps: 1000,
            ..PipelineConfig::default()
        };

        let stats = run_live(&mut source, &mut detector, &mut sink, &cfg, &cancel).unwrap();
        // Frames 4 and 8 out of 10.
        assert_eq!(stats.inference_calls, 2);
    }

    #[test]
    fn detector_error_clears_mask_and_continues() {
        let mut detector = StubDetector::scripted(vec![
            Ok(Detections {
                boxes: Vec::new(),
                mask: Some(Mask::filled(8, 8, 1.0).unwrap()),
            }),
            Err(anyhow::anyhow!("malformed mask tensor")),
        ]);
        let mut source = SyntheticSource::clip(64, 48, 4);
        let mut sink = CollectSink::new();
        let cancel = AtomicBool::new(false);
        let cfg = PipelineConfig {
            overlay_alpha: 1.0,
            ..fast_config()
        };

        let stats = run_live(&mut source, &mut detector, &mut sink, &cfg, &cancel).unwrap();
        assert_eq!(stats.frames_rendered, 4);
        // Frame 1 carries the tinted mask; frame 2 hit the error, so the
        // cached mask is gone and later frames are untinted.
        let tinted = sink.frames[0].get_pixel(32, 24);
        assert_eq!(*tinted, crate::overlay::TINT_COLOR);
        let cleared = sink.frames[2].get_pixel(32, 24);
        assert_ne!(*cleared, crate::overlay::TINT_COLOR);
    }

    #[test]
    fn batch_none_mode_passes_frames_through() {
        let mut detector = StubDetector::new();
        let mut source = SyntheticSource::clip(64, 48, 3);
        let first = source.next_frame().unwrap().unwrap();
        let expected = first.clone();
        let mut sink = CollectSink::new();
        let cfg = PipelineConfig {
            display_mode: DisplayMode::None,
            ..PipelineConfig::default()
        };

        let frames =
            process_frames(first, &mut source, &mut sink, &mut detector, &cfg).unwrap();
        assert_eq!(frames, 3);
        assert_eq!(sink.frames[0], expected);
        assert_eq!(detector.calls(), 0);
    }
}
