use crate::mask::Mask;

/// Result of running the model on one frame.
#[derive(Clone, Debug, Default)]
pub struct Detections {
    /// Bounding boxes in frame pixel space.
    pub boxes: Vec<BoxDetection>,
    /// Optional road-boundary probability mask, model resolution.
    pub mask: Option<Mask>,
}

impl Detections {
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.mask.is_none()
    }
}

/// One detected object.
#[derive(Clone, Debug)]
pub struct BoxDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub label: String,
    pub confidence: f32,
}

impl BoxDetection {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}
