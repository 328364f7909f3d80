#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::{BoxDetection, Detections, Detector};
use crate::mask::Mask;

/// Tract-based adapter for an ONNX export of the segmentation model.
///
/// The export is consumed opaquely: it is expected to produce a post-NMS
/// detection tensor of shape `[1, n, 6]` (x1, y1, x2, y2, confidence, class,
/// in input pixel space) and, for segmentation models, a mask plane of shape
/// `[1, h, w]` or `[1, 1, h, w]` with per-pixel probabilities. This adapter
/// only filters by confidence and maps coordinates back to frame space; no
/// decode or NMS logic lives here.
pub struct TractDetector {
    model: TypedSimplePlan<TypedModel>,
    input_size: u32,
    labels: Vec<String>,
    warmed: bool,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference at a fixed
    /// square input resolution.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            labels: vec!["road_boundary".to_string()],
            warmed: false,
        })
    }

    /// Class index to label mapping (defaults to the single-class road
    /// boundary export).
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    fn label_for(&self, class: usize) -> String {
        self.labels
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class))
    }

    fn build_input(&self, frame: &RgbImage) -> Tensor {
        let side = self.input_size;
        let resized = if frame.width() == side && frame.height() == side {
            frame.clone()
        } else {
            imageops::resize(frame, side, side, FilterType::Triangle)
        };
        let side = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, side, side),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn extract_boxes(
        &self,
        tensor: &Tensor,
        confidence: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<BoxDetection>> {
        let view = tensor
            .to_array_view::<f32>()
            .context("detection tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[2] < 6 {
            return Err(anyhow!(
                "unexpected detection tensor shape {:?} (want [1, n, 6])",
                shape
            ));
        }

        let sx = frame_width as f32 / self.input_size as f32;
        let sy = frame_height as f32 / self.input_size as f32;
        let mut boxes = Vec::new();
        for row in view.index_axis(tract_ndarray::Axis(0), 0).outer_iter() {
            let conf = row[4];
            if !conf.is_finite() || conf < confidence {
                continue;
            }
            let class = row[5].max(0.0) as usize;
            boxes.push(BoxDetection {
                x1: row[0] * sx,
                y1: row[1] * sy,
                x2: row[2] * sx,
                y2: row[3] * sy,
                label: self.label_for(class),
                confidence: conf,
            });
        }
        Ok(boxes)
    }

    fn extract_mask(&self, tensor: &Tensor) -> Result<Mask> {
        let view = tensor
            .to_array_view::<f32>()
            .context("mask tensor was not f32")?;
        let shape = view.shape().to_vec();
        let (height, width) = match shape.as_slice() {
            [1, h, w] => (*h, *w),
            [1, 1, h, w] => (*h, *w),
            other => {
                return Err(anyhow!(
                    "unexpected mask tensor shape {:?} (want [1, h, w] or [1, 1, h, w])",
                    other
                ))
            }
        };
        let data: Vec<f32> = view.iter().map(|v| v.clamp(0.0, 1.0)).collect();
        Mask::new(width as u32, height as u32, data)
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &RgbImage, confidence: f32, input_size: u32) -> Result<Detections> {
        if input_size != self.input_size {
            return Err(anyhow!(
                "requested input size {} does not match loaded model size {}",
                input_size,
                self.input_size
            ));
        }

        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;

        let detection_tensor = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let boxes = self.extract_boxes(detection_tensor, confidence, frame.width(), frame.height())?;

        let mask = match outputs.get(1) {
            Some(tensor) => Some(self.extract_mask(tensor)?),
            None => None,
        };

        Ok(Detections { boxes, mask })
    }

    fn warm_up(&mut self) -> Result<()> {
        if self.warmed {
            return Ok(());
        }
        let blank = RgbImage::new(self.input_size, self.input_size);
        let input = self.build_input(&blank);
        self.model
            .run(tvec!(input.into()))
            .context("warm-up inference failed")?;
        self.warmed = true;
        Ok(())
    }
}
