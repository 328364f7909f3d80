use anyhow::Result;
use image::RgbImage;

use super::Detections;

/// Narrow seam in front of the opaque model.
///
/// Implementations own model loading and whatever preprocessing the model
/// needs (the frame is resized to `input_size` internally); the pipeline only
/// sees boxes in frame space and an optional probability mask. Box/mask
/// decoding beyond confidence filtering belongs to the model library, not
/// here.
///
/// Implementations must treat the frame as read-only and must not retain it
/// across calls. Errors (malformed tensors, shape mismatches) are returned,
/// not panicked; the caller degrades to "no mask this cycle".
pub trait Detector: Send {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Run the model on a frame.
    fn infer(&mut self, frame: &RgbImage, confidence: f32, input_size: u32) -> Result<Detections>;

    /// Optional warm-up hook (first inference is often the slow one).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
