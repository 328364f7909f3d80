//! Frame ingestion sources.
//!
//! Sources for raw frames:
//! - Live camera devices (synthetic `stub://` always available; V4L2 behind
//!   feature `camera-v4l2`)
//! - Local media files: still images in-tree, videos behind `media-ffmpeg`
//! - Synthetic generator (tests, stub runs)
//!
//! A source yields `Ok(Some(frame))` per frame, `Ok(None)` at end of stream,
//! and `Err` for a transient read failure; the loop skips the iteration on
//! error, with no retry or backoff.

use std::path::Path;

use anyhow::Result;
use image::RgbImage;

pub mod camera;
pub mod file;
pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub(crate) mod v4l2;
#[cfg(feature = "media-ffmpeg")]
pub(crate) mod video_ffmpeg;

pub use camera::{CameraConfig, CameraSource};
pub use file::FileSource;
pub use synthetic::SyntheticSource;

/// Supported video container extensions; everything else is treated as a
/// still image.
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// Sequence of raw frames at a device- or file-limited rate.
pub trait FrameSource {
    /// Next frame, `Ok(None)` at end of stream, `Err` on a transient read
    /// failure.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Nominal frame rate of the source, for sizing output containers.
    fn frame_rate(&self) -> u32 {
        30
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// True when the path carries a supported video extension.
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub(crate) fn is_stub_path(path: &str) -> bool {
    path.starts_with("stub://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn video_extension_detection_is_case_insensitive() {
        assert!(is_video_path(&PathBuf::from("clip.mp4")));
        assert!(is_video_path(&PathBuf::from("CLIP.MKV")));
        assert!(is_video_path(&PathBuf::from("a/b/c.mov")));
        assert!(!is_video_path(&PathBuf::from("frame.jpg")));
        assert!(!is_video_path(&PathBuf::from("noext")));
    }
}
