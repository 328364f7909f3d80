//! roadsightd - live road-boundary overlay daemon.
//!
//! Captures frames from the configured camera, runs the detector every Nth
//! frame, composites the decaying mask overlay, and optionally records
//! overlaid frames to a directory. Display windowing is left to whatever
//! consumes the recordings; the loop itself is headless.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use roadsight::{
    run_live, CameraConfig, CameraSource, Detector, FrameDirSink, FrameSink, NullSink,
    PipelineConfig, StubDetector,
};

#[derive(Parser, Debug)]
#[command(name = "roadsightd", about = "Live road-boundary overlay daemon")]
struct Args {
    /// Camera device: stub://…, /dev/videoN, or a bare index.
    #[arg(long, env = "ROADSIGHT_DEVICE")]
    device: Option<String>,

    /// Trained model artifact (ONNX export).
    #[arg(long, env = "ROADSIGHT_MODEL")]
    model: Option<PathBuf>,

    /// Run the detector every Nth frame.
    #[arg(long)]
    frame_interval: Option<u32>,

    /// Confidence threshold.
    #[arg(long)]
    confidence: Option<f32>,

    /// Display rate ceiling.
    #[arg(long)]
    target_fps: Option<u32>,

    /// Record every Nth overlaid frame as JPEG into this directory.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Recording decimation (used with --record).
    #[arg(long, default_value_t = 30)]
    record_every: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = PipelineConfig::load()?;
    if let Some(device) = args.device {
        cfg.device = device;
    }
    if let Some(model) = args.model {
        cfg.model_path = model;
    }
    if let Some(interval) = args.frame_interval {
        cfg.frame_interval = interval;
    }
    if let Some(confidence) = args.confidence {
        cfg.confidence = confidence;
    }
    if let Some(fps) = args.target_fps {
        cfg.target_fps = fps;
    }
    cfg.validate()?;

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    })?;

    // Device-unavailable is fatal here; the process exits nonzero.
    let mut source = CameraSource::open(CameraConfig {
        device: cfg.device.clone(),
        target_fps: cfg.target_fps,
        ..CameraConfig::default()
    })?;

    let mut detector = build_detector(&cfg)?;
    detector.warm_up()?;

    let mut sink: Box<dyn FrameSink> = match &args.record {
        Some(dir) => Box::new(FrameDirSink::new(dir, args.record_every)?),
        None => Box::new(NullSink),
    };

    let stats = run_live(
        &mut source,
        detector.as_mut(),
        sink.as_mut(),
        &cfg,
        &cancel,
    )?;
    log::info!(
        "shutting down: {} frames rendered, {} inference calls",
        stats.frames_rendered,
        stats.inference_calls
    );
    Ok(())
}

fn build_detector(cfg: &PipelineConfig) -> Result<Box<dyn Detector>> {
    #[cfg(feature = "backend-tract")]
    {
        if cfg.model_path.exists() {
            let detector = roadsight::TractDetector::new(&cfg.model_path, cfg.input_size)?;
            return Ok(Box::new(detector));
        }
        log::warn!(
            "model {} not found, falling back to stub detector",
            cfg.model_path.display()
        );
    }
    #[cfg(not(feature = "backend-tract"))]
    log::info!(
        "built without backend-tract, using stub detector (model {} ignored)",
        cfg.model_path.display()
    );
    Ok(Box::new(StubDetector::new()))
}
