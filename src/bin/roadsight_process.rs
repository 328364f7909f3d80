//! roadsight_process - batch image/video overlay.
//!
//! Runs the detector over a media file and writes the decorated result.
//! Video extensions (.mp4/.avi/.mov/.mkv) stream frame by frame; anything
//! else is treated as a still image. Image output extensions are normalized
//! to .jpg/.jpeg/.png before writing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use roadsight::{process_media, Detector, DisplayMode, PipelineConfig, StubDetector};

#[derive(Parser, Debug)]
#[command(name = "roadsight_process", about = "Batch road-boundary overlay")]
struct Args {
    /// Input image or video.
    input: PathBuf,

    /// Output path; defaults to <stem>_overlay.<ext> next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overlay decoration mode.
    #[arg(long, value_enum)]
    mode: Option<DisplayMode>,

    /// Confidence threshold.
    #[arg(long)]
    confidence: Option<f32>,

    /// Trained model artifact (ONNX export).
    #[arg(long, env = "ROADSIGHT_MODEL")]
    model: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = PipelineConfig::load()?;
    if let Some(mode) = args.mode {
        cfg.display_mode = mode;
    }
    if let Some(confidence) = args.confidence {
        cfg.confidence = confidence;
    }
    if let Some(model) = args.model {
        cfg.model_path = model;
    }
    cfg.validate()?;

    let output = args.output.unwrap_or_else(|| default_output(&args.input));
    let mut detector = build_detector(&cfg)?;

    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?);
    progress.set_message(format!("processing {}", args.input.display()));
    progress.enable_steady_tick(Duration::from_millis(120));

    let written = process_media(&args.input, &output, detector.as_mut(), &cfg)?;

    progress.finish_and_clear();
    println!("{}", written.display());
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jpg");
    input.with_file_name(format!("{stem}_overlay.{ext}"))
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
