//! roadsight — road-boundary overlay pipeline.
//!
//! The trained segmentation/detection model is an external collaborator
//! reached through the narrow [`detect::Detector`] seam; everything else is
//! the plumbing around it:
//!
//! - `ingest`: frame sources (camera, media files, synthetic)
//! - `detect`: detector adapter, result types, stub and ONNX backends
//! - `mask`: probability masks, thresholding, external contours
//! - `cache`: bounded-staleness detection cache with temporal mask decay
//! - `overlay`: alpha-tinted fill, contour strokes, boxes, telemetry HUD
//! - `pacing`: frame-rate limiter and FPS counter
//! - `output`: image/video/recording sinks
//! - `pipeline`: the live loop and the batch processor
//! - `config`: tunables with file/env overrides
//!
//! The live loop keeps its overlay smooth despite running the expensive
//! model only every Nth frame: the last mask is cached and attenuated a
//! little on every rendered frame, so stale detections fade out instead of
//! flickering off. The whole pipeline is single-threaded; the only
//! suspension point is the pacing sleep and cancellation is a polled flag.

pub mod cache;
pub mod config;
pub mod detect;
pub mod ingest;
pub mod mask;
pub mod output;
pub mod overlay;
pub mod pacing;
pub mod pipeline;

pub use cache::{CachedMask, DetectionCache};
pub use config::PipelineConfig;
pub use detect::{BoxDetection, Detections, Detector, StubDetector};
#[cfg(feature = "backend-tract")]
pub use detect::TractDetector;
pub use ingest::{CameraConfig, CameraSource, FileSource, FrameSource, SyntheticSource};
pub use mask::Mask;
pub use output::{CollectSink, FrameDirSink, FrameSink, ImageSink, NullSink};
pub use overlay::{DisplayMode, OverlayRenderer, Telemetry};
pub use pacing::{FpsCounter, PacingController};
pub use pipeline::{process_media, run_live, DetectionLoopState, LiveStats};
