use anyhow::Result;
use image::{Rgb, RgbImage};

use super::FrameSource;

/// Deterministic frame generator for tests and `stub://` runs.
///
/// Produces a shifting gradient so consecutive frames differ but any frame
/// is reproducible from its index.
#[derive(Debug)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_count: u64,
    limit: Option<u64>,
    fps: u32,
}

impl SyntheticSource {
    /// Unbounded stream (camera stand-in).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_count: 0,
            limit: None,
            fps: 30,
        }
    }

    /// Finite clip of `frames` frames (video file stand-in).
    pub fn clip(width: u32, height: u32, frames: u64) -> Self {
        Self {
            limit: Some(frames),
            ..Self::new(width, height)
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn frames_produced(&self) -> u64 {
        self.frame_count
    }

    fn generate(&self) -> RgbImage {
        let shift = (self.frame_count % 256) as u32;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x + shift) % 256) as u8,
                ((y + shift) % 256) as u8,
                ((x + y) % 256) as u8,
            ])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if let Some(limit) = self.limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        let frame = self.generate();
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn frame_rate(&self) -> u32 {
        self.fps
    }
}
