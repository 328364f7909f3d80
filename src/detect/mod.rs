//! Detector adapter.
//!
//! The trained model is an external collaborator. This module defines the
//! narrow seam the pipeline talks through (`Detector`), the result types it
//! gets back, and the available backends: a deterministic stub (always
//! built) and a tract-onnx backend behind `backend-tract`.

pub mod backends;
mod detector;
mod result;

pub use backends::StubDetector;
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use detector::Detector;
pub use result::{BoxDetection, Detections};
