//! Rendered-frame sinks.
//!
//! Batch outputs are either a single image (extension normalized to
//! `.jpg`/`.jpeg`/`.png` before the write) or a video file (feature
//! `media-ffmpeg`). `CollectSink` and `NullSink` exist for tests and for
//! live runs where the frames are rendered and dropped; `FrameDirSink`
//! records every Nth live frame as a numbered JPEG.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

#[cfg(feature = "media-ffmpeg")]
use crate::ingest::video_ffmpeg::VideoFileSink;
use crate::ingest::is_video_path;

/// Output extensions written as-is; anything else becomes `.jpg`.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Rewrite unsupported image output extensions to `.jpg`.
pub fn normalize_image_path(path: &Path) -> PathBuf {
    let keep = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false);
    if keep {
        path.to_path_buf()
    } else {
        path.with_extension("jpg")
    }
}

/// Destination for rendered frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close the output. Must be called once, after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Path actually written, for sinks that resolve one.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Single-image sink; repeated writes overwrite, so a multi-frame stream
/// leaves the last frame on disk.
pub struct ImageSink {
    path: PathBuf,
}

impl ImageSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: normalize_image_path(path),
        }
    }
}

impl FrameSink for ImageSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        frame
            .save(&self.path)
            .with_context(|| format!("could not write image {}", self.path.display()))?;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct CollectSink {
    pub frames: Vec<RgbImage>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for CollectSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// Discards frames. Live runs use this when no recording is requested; the
/// display window itself is outside this crate.
pub struct NullSink;

impl FrameSink for NullSink {
    fn write_frame(&mut self, _frame: &RgbImage) -> Result<()> {
        Ok(())
    }
}

/// Records every Nth frame as `frame_NNNNN.jpg` under a directory.
pub struct FrameDirSink {
    dir: PathBuf,
    every: u64,
    seen: u64,
    written: u64,
}

impl FrameDirSink {
    pub fn new(dir: &Path, every: u64) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("could not create record directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            every: every.max(1),
            seen: 0,
            written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for FrameDirSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.seen += 1;
        if (self.seen - 1) % self.every != 0 {
            return Ok(());
        }
        let path = self.dir.join(format!("frame_{:05}.jpg", self.written));
        frame
            .save(&path)
            .with_context(|| format!("could not write frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

/// Video sink wrapper (feature `media-ffmpeg`).
#[cfg(feature = "media-ffmpeg")]
pub struct VideoSink {
    inner: VideoFileSink,
}

#[cfg(feature = "media-ffmpeg")]
impl VideoSink {
    pub fn open(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        Ok(Self {
            inner: VideoFileSink::open(path, width, height, fps)?,
        })
    }
}

#[cfg(feature = "media-ffmpeg")]
impl FrameSink for VideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.inner.write_frame(frame)
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }

    fn path(&self) -> Option<&Path> {
        Some(self.inner.path())
    }
}

/// Pick the sink matching the output path: video container extensions need
/// the video sink, everything else is written as an image.
pub fn sink_for_output(
    output: &Path,
    frame_width: u32,
    frame_height: u32,
    fps: u32,
) -> Result<Box<dyn FrameSink>> {
    if is_video_path(output) {
        #[cfg(feature = "media-ffmpeg")]
        {
            return Ok(Box::new(VideoSink::open(
                output,
                frame_width,
                frame_height,
                fps,
            )?));
        }
        #[cfg(not(feature = "media-ffmpeg"))]
        {
            let _ = (frame_width, frame_height, fps);
            return Err(anyhow::anyhow!(
                "video output {} requires the media-ffmpeg feature",
                output.display()
            ));
        }
    }
    let _ = (frame_width, frame_height, fps);
    Ok(Box::new(ImageSink::new(output)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn unsupported_extension_becomes_jpg() {
        assert_eq!(
            normalize_image_path(&PathBuf::from("out.bmp")),
            PathBuf::from("out.jpg")
        );
        assert_eq!(
            normalize_image_path(&PathBuf::from("out")),
            PathBuf::from("out.jpg")
        );
    }

    #[test]
    fn supported_extensions_are_kept() {
        for ext in ["jpg", "jpeg", "png", "PNG"] {
            let path = PathBuf::from(format!("out.{ext}"));
            assert_eq!(normalize_image_path(&path), path);
        }
    }

    #[test]
    fn image_sink_writes_normalized_path() {
        let dir = tempfile::tempdir().unwrap();
        let requested = dir.path().join("overlay.bmp");
        let mut sink = ImageSink::new(&requested);
        sink.write_frame(&RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])))
            .unwrap();
        sink.finish().unwrap();

        let written = sink.path().unwrap();
        assert_eq!(written, dir.path().join("overlay.jpg"));
        assert!(written.exists());
        assert!(!requested.exists());
    }

    #[test]
    fn frame_dir_sink_decimates() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FrameDirSink::new(dir.path(), 3).unwrap();
        let frame = RgbImage::from_pixel(4, 4, Rgb([1, 1, 1]));
        for _ in 0..7 {
            sink.write_frame(&frame).unwrap();
        }
        assert_eq!(sink.frames_written(), 3);
        assert!(dir.path().join("frame_00000.jpg").exists());
        assert!(dir.path().join("frame_00002.jpg").exists());
    }
}
