use std::collections::VecDeque;

use anyhow::Result;
use image::RgbImage;

use crate::detect::{BoxDetection, Detections, Detector};
use crate::mask::Mask;

/// Stub resolution for generated masks. Deliberately smaller than typical
/// frames so the resize path is exercised.
const STUB_MASK_SIZE: u32 = 160;

/// Deterministic stand-in for the trained model.
///
/// In default mode every call returns the same centered rectangular boundary
/// mask plus one labelled box, scaled to the frame. In scripted mode each
/// call pops the next prepared result (or error), which is how the tests
/// drive exact cache/decay scenarios.
pub struct StubDetector {
    script: Option<VecDeque<Result<Detections>>>,
    calls: u64,
}

impl StubDetector {
    pub fn new() -> Self {
        Self {
            script: None,
            calls: 0,
        }
    }

    /// Replay the given results one per call; once exhausted, further calls
    /// return empty detections.
    pub fn scripted(results: Vec<Result<Detections>>) -> Self {
        Self {
            script: Some(results.into()),
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn synthetic_detections(&self, frame: &RgbImage, confidence: f32) -> Result<Detections> {
        // Solid rectangle over the middle half of the grid.
        let side = STUB_MASK_SIZE as usize;
        let mut probs = vec![0.0f32; side * side];
        for y in side / 4..side * 3 / 4 {
            for x in side / 4..side * 3 / 4 {
                probs[y * side + x] = 0.9;
            }
        }
        let mask = Mask::new(STUB_MASK_SIZE, STUB_MASK_SIZE, probs)?;

        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let boxes = if confidence <= 0.9 {
            vec![BoxDetection {
                x1: w * 0.25,
                y1: h * 0.25,
                x2: w * 0.75,
                y2: h * 0.75,
                label: "road_boundary".to_string(),
                confidence: 0.9,
            }]
        } else {
            Vec::new()
        };

        Ok(Detections {
            boxes,
            mask: Some(mask),
        })
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, frame: &RgbImage, confidence: f32, _input_size: u32) -> Result<Detections> {
        self.calls += 1;
        match &mut self.script {
            Some(script) => script.pop_front().unwrap_or_else(|| Ok(Detections::default())),
            None => self.synthetic_detections(frame, confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn default_stub_returns_mask_and_box() {
        let mut detector = StubDetector::new();
        let frame = RgbImage::new(320, 240);
        let dets = detector.infer(&frame, 0.3, 640).unwrap();
        assert!(dets.mask.is_some());
        assert_eq!(dets.boxes.len(), 1);
        assert_eq!(dets.boxes[0].label, "road_boundary");
        assert_eq!(detector.calls(), 1);
    }

    #[test]
    fn scripted_stub_replays_then_goes_quiet() {
        let mut detector = StubDetector::scripted(vec![
            Ok(Detections {
                boxes: Vec::new(),
                mask: Some(Mask::filled(4, 4, 1.0).unwrap()),
            }),
            Err(anyhow!("malformed mask tensor")),
        ]);
        let frame = RgbImage::new(32, 32);

        assert!(detector.infer(&frame, 0.3, 640).unwrap().mask.is_some());
        assert!(detector.infer(&frame, 0.3, 640).is_err());
        let quiet = detector.infer(&frame, 0.3, 640).unwrap();
        assert!(quiet.is_empty());
    }
}
