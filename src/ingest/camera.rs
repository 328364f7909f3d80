//! Live camera source.
//!
//! The device string selects the backend: `stub://…` runs the synthetic
//! generator (always available), anything else is treated as a V4L2 device
//! path or index and requires the `camera-v4l2` feature. An inaccessible
//! device is fatal at startup, not retried.

use anyhow::Result;
use image::RgbImage;

use super::synthetic::SyntheticSource;
use super::{is_stub_path, FrameSource};
#[cfg(feature = "camera-v4l2")]
use super::v4l2::V4l2Camera;

/// Configuration for a live camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// `stub://camera`, a `/dev/videoN` path, or a bare device index.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera".to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "camera-v4l2")]
    V4l2(V4l2Camera),
}

impl CameraSource {
    /// Open the configured device. Failure here is the fatal
    /// device-unavailable case; callers exit nonzero.
    pub fn open(config: CameraConfig) -> Result<Self> {
        if is_stub_path(&config.device) {
            log::info!("camera: synthetic source for {}", config.device);
            return Ok(Self {
                backend: CameraBackend::Synthetic(
                    SyntheticSource::new(config.width, config.height)
                        .with_fps(config.target_fps),
                ),
            });
        }

        #[cfg(feature = "camera-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::V4l2(V4l2Camera::open(&config)?),
            })
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(anyhow::anyhow!(
                "unable to access camera {}: device capture requires the camera-v4l2 feature",
                config.device
            ))
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.next_frame(),
        }
    }

    fn frame_rate(&self) -> u32 {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.frame_rate(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.frame_rate(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.is_healthy(),
        }
    }
}
