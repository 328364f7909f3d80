//! Segmentation mask postprocessing.
//!
//! The detector hands back a per-pixel probability grid at model resolution.
//! Everything downstream works on frame-resolution intensity values:
//! resize, scale to 0..255, threshold, and extract the external contours of
//! the above-threshold regions.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};

/// Per-pixel probability grid produced by the detector, values in `[0, 1]`.
#[derive(Clone, Debug)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Mask {
    /// Build a mask from a row-major probability buffer.
    ///
    /// Rejects dimension/buffer mismatches and non-finite values so that a
    /// malformed model output surfaces as an error instead of propagating
    /// garbage into the cache.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("mask dimensions {}x{} overflow", width, height))?;
        if expected == 0 {
            return Err(anyhow!("mask has zero area ({}x{})", width, height));
        }
        if data.len() != expected {
            return Err(anyhow!(
                "mask buffer length {} does not match {}x{}",
                data.len(),
                width,
                height
            ));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("mask contains non-finite probabilities"));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Uniform mask covering the full grid, useful for tests and stub runs.
    pub fn filled(width: u32, height: u32, probability: f32) -> Result<Self> {
        let len = (width as usize) * (height as usize);
        Self::new(width, height, vec![probability; len])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn probabilities(&self) -> &[f32] {
        &self.data
    }

    /// Bilinear resize to frame resolution.
    pub fn resize_to(&self, width: u32, height: u32) -> Mask {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let buf: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(self.width, self.height, self.data.clone())
                .unwrap_or_else(|| ImageBuffer::new(self.width, self.height));
        let resized = imageops::resize(&buf, width, height, FilterType::Triangle);
        Mask {
            width,
            height,
            data: resized.into_raw(),
        }
    }

    /// Scale probabilities to 0..255 intensities, kept as `f32` so repeated
    /// decay does not accumulate rounding error.
    pub fn to_intensities(&self) -> Vec<f32> {
        self.data.iter().map(|p| p.clamp(0.0, 1.0) * 255.0).collect()
    }
}

/// Threshold an intensity grid into a 0/255 binary image.
pub fn threshold_intensities(
    width: u32,
    height: u32,
    intensities: &[f32],
    threshold: f32,
) -> GrayImage {
    let mut out = GrayImage::new(width, height);
    for (dst, &v) in out.iter_mut().zip(intensities.iter()) {
        *dst = if v > threshold { 255 } else { 0 };
    }
    out
}

/// External contours of the above-threshold regions of a binary mask.
///
/// Hole borders are dropped; for a mask made of solid regions this matches
/// the usual external-retrieval contour behavior.
pub fn outer_contours(binary: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .collect()
}
